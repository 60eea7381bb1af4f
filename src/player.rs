// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Player facade.
//!
//! Owns the transition graph, the segment store, the output device and the
//! scheduler, and enforces the edit gate: while edit mode is on nothing can
//! be played, and the graph can only be changed while edit mode is on.

use tracing::{debug, info};

use crate::arrangement::{Part, PartEdit, Track, TransitionGraph};
use crate::audio::{resample, OutputDevice};
use crate::error::{EditError, LoadError, PlaybackError};
use crate::segments::{Segment, SegmentStore};
use crate::sequencer::{
    ArmedTimer, PlaybackContext, PlaybackMode, QueueRow, Scheduler, SwitchOutcome, TimerToken,
};

/// Segment playback over a transition graph
pub struct Player<D: OutputDevice> {
    graph: TransitionGraph,
    segments: SegmentStore,
    device: D,
    scheduler: Scheduler,
    edit_mode: bool,
}

impl<D: OutputDevice> Player<D> {
    /// Create a player with an empty graph and no segments
    pub fn new(device: D) -> Self {
        Self::with_scheduler(device, Scheduler::new())
    }

    /// Create a player around a configured scheduler
    pub fn with_scheduler(device: D, scheduler: Scheduler) -> Self {
        Self {
            graph: TransitionGraph::new(),
            segments: SegmentStore::new(),
            device,
            scheduler,
            edit_mode: false,
        }
    }

    pub fn graph(&self) -> &TransitionGraph {
        &self.graph
    }

    pub fn segments(&self) -> &SegmentStore {
        &self.segments
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn is_edit_mode(&self) -> bool {
        self.edit_mode
    }

    pub fn mode(&self) -> PlaybackMode {
        self.scheduler.mode()
    }

    pub fn is_playing(&self) -> bool {
        self.scheduler.is_playing(&self.device)
    }

    pub fn playback_position(&self) -> f64 {
        self.scheduler.playback_position(&self.device)
    }

    pub fn selected_track(&self) -> usize {
        self.scheduler.selected_track()
    }

    pub fn armed_timer(&self) -> Option<ArmedTimer> {
        self.scheduler.armed_timer()
    }

    pub fn queue_rows(&self) -> Vec<QueueRow> {
        self.scheduler.queue_rows()
    }

    /// Stop playback and unlock the graph for editing
    pub fn enter_edit_mode(&mut self) {
        self.stop();
        if !self.edit_mode {
            self.edit_mode = true;
            info!("Edit mode on");
        }
    }

    pub fn exit_edit_mode(&mut self) {
        if self.edit_mode {
            self.edit_mode = false;
            info!("Edit mode off");
        }
    }

    pub fn set_edit_mode(&mut self, on: bool) {
        if on {
            self.enter_edit_mode();
        } else {
            self.exit_edit_mode();
        }
    }

    pub fn stop(&mut self) {
        self.scheduler.stop(&self.segments, &mut self.device);
    }

    fn check_playable(&self) -> Result<(), PlaybackError> {
        if self.edit_mode {
            return Err(PlaybackError::EditModeActive);
        }
        Ok(())
    }

    pub fn play_part(&mut self, track: usize, part: usize) -> Result<(), PlaybackError> {
        self.check_playable()?;
        let mut ctx = PlaybackContext::new(&self.graph, &self.segments, &mut self.device);
        self.scheduler.play_part(&mut ctx, track, part)
    }

    pub fn play_segment(&mut self, index: usize) -> Result<(), PlaybackError> {
        self.check_playable()?;
        let mut ctx = PlaybackContext::new(&self.graph, &self.segments, &mut self.device);
        self.scheduler.play_segment(&mut ctx, index)
    }

    pub fn change_track(&mut self, track: usize) -> Result<SwitchOutcome, PlaybackError> {
        self.check_playable()?;
        let mut ctx = PlaybackContext::new(&self.graph, &self.segments, &mut self.device);
        self.scheduler.change_track(&mut ctx, track)
    }

    /// Forward a fired timer to the scheduler
    pub fn on_timer(&mut self, token: TimerToken) -> Result<(), PlaybackError> {
        let mut ctx = PlaybackContext::new(&self.graph, &self.segments, &mut self.device);
        self.scheduler.on_timer(&mut ctx, token)
    }

    /// Start a new load: stop playback and drop every segment
    pub fn begin_session(&mut self) {
        self.stop();
        self.segments.clear();
    }

    /// Store a decoded segment, converting it to the device rate first
    ///
    /// The duration is kept as decoded so back to back segments still line up.
    pub fn add_segment(&mut self, segment: Segment) -> Result<(), LoadError> {
        let segment = match self.device.output_rate() {
            Some(rate) if rate != segment.sample_rate => {
                debug!(
                    index = segment.index,
                    from = segment.sample_rate,
                    to = rate,
                    "Converting segment to device rate"
                );
                let audio = resample(segment.audio(), rate)?;
                Segment::new(segment.index, segment.duration, segment.offset, audio)
            }
            _ => segment,
        };
        self.segments.add(segment)
    }

    /// Replace the whole graph, leaving edit mode as it was
    pub fn reload_graph(&mut self, graph: TransitionGraph) {
        let was_editing = self.edit_mode;
        self.enter_edit_mode();
        self.graph.replace(graph);
        if self.scheduler.selected_track() >= self.graph.track_count() {
            self.scheduler.select_track(0);
        }
        info!(
            "Transition graph replaced: {} tracks, {} parts",
            self.graph.track_count(),
            self.graph.part_count()
        );
        if !was_editing {
            self.exit_edit_mode();
        }
    }

    fn graph_mut(&mut self) -> Result<&mut TransitionGraph, EditError> {
        if !self.edit_mode {
            return Err(EditError::EditModeInactive);
        }
        Ok(&mut self.graph)
    }

    pub fn add_track(&mut self) -> Result<usize, EditError> {
        Ok(self.graph_mut()?.add_track())
    }

    pub fn remove_track(&mut self, track: usize) -> Result<Track, EditError> {
        self.graph_mut()?.remove_track(track)
    }

    pub fn add_part(&mut self, track: usize) -> Result<usize, EditError> {
        self.graph_mut()?.add_part(track)
    }

    pub fn remove_part(&mut self, track: usize, position: usize) -> Result<Part, EditError> {
        self.graph_mut()?.remove_part(track, position)
    }

    /// Validate an edit against the loaded segments and commit it
    pub fn edit_part(
        &mut self,
        track: usize,
        position: usize,
        edit: PartEdit,
    ) -> Result<(), EditError> {
        let segment_count = self.segments.len();
        self.graph_mut()?.edit_part(track, position, edit, segment_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrangement::presets;
    use crate::audio::{AudioBuffer, OfflineDevice};

    fn player(segment_count: usize) -> Player<OfflineDevice> {
        let mut player = Player::new(OfflineDevice::manual());
        for i in 0..segment_count {
            let mut audio = AudioBuffer::new(2, 100);
            audio.append_interleaved(&vec![0.0; 200]);
            player.add_segment(Segment::new(i, 1.0, i as f64, audio)).unwrap();
        }
        player.reload_graph(presets::forest().graph);
        player
    }

    #[test]
    fn test_edit_mode_stops_and_blocks_playback() {
        let mut player = player(62);
        player.play_part(0, 0).unwrap();
        assert!(player.is_playing());

        player.enter_edit_mode();
        assert!(!player.is_playing());
        assert_eq!(player.mode(), PlaybackMode::Stopped);
        assert_eq!(player.play_part(0, 0), Err(PlaybackError::EditModeActive));
        assert_eq!(player.play_segment(0), Err(PlaybackError::EditModeActive));
        assert_eq!(player.change_track(1), Err(PlaybackError::EditModeActive));

        player.exit_edit_mode();
        player.play_segment(3).unwrap();
        assert_eq!(player.mode(), PlaybackMode::PlayingSingleSegment);
    }

    #[test]
    fn test_mutations_need_edit_mode() {
        let mut player = player(62);
        assert_eq!(player.add_track(), Err(EditError::EditModeInactive));
        assert_eq!(player.add_part(0), Err(EditError::EditModeInactive));

        player.enter_edit_mode();
        let track = player.add_track().unwrap();
        assert_eq!(track, 2);
        assert_eq!(player.add_part(track).unwrap(), 0);
        player.remove_part(0, 5).unwrap();
        assert_eq!(player.graph().track(0).unwrap().len(), 5);
    }

    #[test]
    fn test_edit_part_checks_loaded_segments() {
        let mut player = player(10);
        player.set_edit_mode(true);
        let mut edit = PartEdit::from_part(player.graph().part(0, 0).unwrap());
        edit.first_segment = 2;
        edit.last_segment = 9;
        player.edit_part(0, 0, edit).unwrap();
        assert_eq!(player.graph().part(0, 0).unwrap().length, 8);

        edit.last_segment = 10;
        assert!(matches!(
            player.edit_part(0, 0, edit),
            Err(EditError::InvalidPartEdit(_))
        ));
    }

    #[test]
    fn test_reload_keeps_edit_state() {
        let mut player = player(62);
        player.play_part(1, 2).unwrap();
        assert_eq!(player.selected_track(), 1);

        let single = TransitionGraph::from_rows("0,0,0,2,0,0\n");
        player.reload_graph(single);
        assert!(!player.is_edit_mode());
        assert!(!player.is_playing());
        assert_eq!(player.selected_track(), 0);

        player.enter_edit_mode();
        player.reload_graph(presets::forest().graph);
        assert!(player.is_edit_mode());
    }

    #[test]
    fn test_begin_session_clears_segments() {
        let mut player = player(62);
        player.play_part(0, 0).unwrap();
        player.begin_session();
        assert!(player.segments().is_empty());
        assert_eq!(player.mode(), PlaybackMode::Stopped);
        assert_eq!(player.play_segment(0), Err(PlaybackError::UnknownSegment(0)));
    }

    #[test]
    fn test_timer_drives_playback() {
        let mut player = player(62);
        player.play_part(0, 0).unwrap();
        let timer = player.armed_timer().unwrap();
        player.device_mut().advance(timer.delay.as_secs_f64());
        player.on_timer(timer.token).unwrap();
        assert_eq!(player.scheduler().play_queue().front().unwrap().cursor(), 1);
        assert_eq!(player.queue_rows()[0].segment, 1);
    }

    #[test]
    fn test_segments_converted_to_device_rate() {
        let mut player = Player::new(OfflineDevice::manual().with_sample_rate(48000));
        for i in 0..2 {
            let mut audio = AudioBuffer::new(2, 44100);
            audio.append_interleaved(&vec![0.25; 2 * 4410]);
            player.add_segment(Segment::new(i, 0.1, i as f64 * 0.1, audio)).unwrap();
        }
        let first = player.segments().get(0).unwrap();
        assert_eq!(first.sample_rate, 48000);
        assert_eq!(first.audio().frames(), 4800);
        assert_eq!(first.duration, 0.1);

        player.reload_graph(TransitionGraph::from_rows("0,0,0,2,0,0\n"));
        player.play_part(0, 0).unwrap();
        let timer = player.armed_timer().unwrap();
        player.device_mut().advance(timer.delay.as_secs_f64());
        player.on_timer(timer.token).unwrap();

        let voices = player.device().voices();
        assert_eq!(voices.len(), 2);
        assert!((voices[0].duration - 0.1).abs() < 1e-9);
        assert!((voices[1].at - (voices[0].at + voices[0].duration)).abs() < 1e-9);
    }

    #[test]
    fn test_infinite_segment_rejected_without_panic() {
        let mut player = Player::new(OfflineDevice::manual());
        let err = player
            .add_segment(Segment::new(0, f64::INFINITY, 0.0, AudioBuffer::new(2, 100)))
            .unwrap_err();
        assert!(matches!(err, LoadError::InvalidDuration { index: 0, .. }));
        assert_eq!(player.play_segment(0), Err(PlaybackError::UnknownSegment(0)));
    }
}
