// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Control thread.
//!
//! The [`Engine`] owns the [`Player`] and is the only code that touches it.
//! It waits on three things at once: commands from [`EngineHandle`]s, decoder
//! messages from a running load, and the scheduler's armed timer. Each wake
//! is handled to completion before the next one is awaited, so the player
//! needs no locking.
//!
//! The engine future is not `Send` when the device is not; run it on a
//! current-thread runtime, inside a `LocalSet` if other local tasks need it.

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::arrangement::{self, PartEdit, TransitionGraph};
use crate::audio::OutputDevice;
use crate::error::{EditError, Error, LoadError, PlaybackError, Result};
use crate::player::Player;
use crate::segments::{DecodeWorker, DecoderMessage, SegmentSource, SessionAssembler, SessionProgress};
use crate::sequencer::{PlaybackMode, QueueRow, SwitchOutcome, TimerToken};

/// Outcome of a finished load
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadSummary {
    pub segment_count: usize,
    /// Seconds
    pub total_duration: f64,
}

/// Snapshot of the engine for display
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub mode: PlaybackMode,
    pub playing: bool,
    /// Seconds since the current run of audio started
    pub position: f64,
    pub selected_track: usize,
    pub track_labels: Vec<String>,
    pub queue: Vec<QueueRow>,
    pub segment_count: usize,
    pub edit_mode: bool,
    pub loading: bool,
}

/// Structural change to the transition graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphEdit {
    AddTrack,
    RemoveTrack(usize),
    AddPart(usize),
    RemovePart { track: usize, position: usize },
    EditPart { track: usize, position: usize, edit: PartEdit },
}

type Reply<T> = oneshot::Sender<T>;

/// Requests handled by the control thread
pub enum Command {
    Load {
        source: Box<dyn SegmentSource>,
        reply: Reply<std::result::Result<LoadSummary, LoadError>>,
    },
    PlayPart {
        track: usize,
        part: usize,
        reply: Reply<std::result::Result<(), PlaybackError>>,
    },
    PlaySegment {
        index: usize,
        reply: Reply<std::result::Result<(), PlaybackError>>,
    },
    ChangeTrack {
        track: usize,
        reply: Reply<std::result::Result<SwitchOutcome, PlaybackError>>,
    },
    Stop {
        reply: Reply<()>,
    },
    SetEditMode {
        on: bool,
        reply: Reply<()>,
    },
    Edit {
        edit: GraphEdit,
        reply: Reply<std::result::Result<(), EditError>>,
    },
    ReplaceGraph {
        graph: Box<TransitionGraph>,
        reply: Reply<()>,
    },
    Status {
        reply: Reply<StatusReport>,
    },
    Graph {
        reply: Reply<TransitionGraph>,
    },
    Shutdown,
}

struct PendingLoad {
    name: String,
    assembler: SessionAssembler,
    messages: mpsc::UnboundedReceiver<DecoderMessage>,
    reply: Reply<std::result::Result<LoadSummary, LoadError>>,
}

/// Owner of the player, driven by commands, decoder messages and timers
pub struct Engine<D: OutputDevice> {
    player: Player<D>,
    commands: mpsc::UnboundedReceiver<Command>,
    load: Option<PendingLoad>,
    chunk_frames: usize,
    deadline: Option<(TimerToken, Instant)>,
}

impl<D: OutputDevice> Engine<D> {
    /// Create an engine and the handle that controls it
    pub fn new(player: Player<D>, chunk_frames: usize) -> (Self, EngineHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Self {
            player,
            commands: rx,
            load: None,
            chunk_frames: chunk_frames.max(1),
            deadline: None,
        };
        (engine, EngineHandle { commands: tx })
    }

    /// Run until shut down or every handle is dropped, returning the player
    pub async fn run(mut self) -> Player<D> {
        info!("Engine started");
        loop {
            self.sync_timer();
            let deadline = self.deadline.map(|(_, at)| at);

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },
                message = next_decoder_message(&mut self.load) => {
                    self.on_decoder_message(message);
                }
                _ = sleep_until(deadline) => self.fire_timer(),
            }
        }

        self.player.stop();
        if let Some(load) = self.load.take() {
            let _ = load.reply.send(Err(LoadError::Decode("engine shut down".to_string())));
        }
        info!("Engine stopped");
        self.player
    }

    /// Re-arm the wall-clock deadline when the scheduler armed a new timer
    fn sync_timer(&mut self) {
        match (self.player.armed_timer(), self.deadline) {
            (Some(timer), Some((token, _))) if timer.token == token => {}
            (Some(timer), _) => {
                // A delay too large for the clock never fires
                self.deadline = Instant::now()
                    .checked_add(timer.delay)
                    .map(|at| (timer.token, at));
            }
            (None, _) => self.deadline = None,
        }
    }

    fn fire_timer(&mut self) {
        let Some((token, _)) = self.deadline.take() else {
            return;
        };
        if let Err(e) = self.player.on_timer(token) {
            warn!("Playback stopped: {}", e);
        }
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Load { source, reply } => self.start_load(source, reply),
            Command::PlayPart { track, part, reply } => {
                let _ = reply.send(self.player.play_part(track, part));
            }
            Command::PlaySegment { index, reply } => {
                let _ = reply.send(self.player.play_segment(index));
            }
            Command::ChangeTrack { track, reply } => {
                let _ = reply.send(self.player.change_track(track));
            }
            Command::Stop { reply } => {
                self.player.stop();
                let _ = reply.send(());
            }
            Command::SetEditMode { on, reply } => {
                self.player.set_edit_mode(on);
                let _ = reply.send(());
            }
            Command::Edit { edit, reply } => {
                let _ = reply.send(self.apply_edit(edit));
            }
            Command::ReplaceGraph { graph, reply } => {
                self.player.reload_graph(*graph);
                let _ = reply.send(());
            }
            Command::Status { reply } => {
                let _ = reply.send(self.status());
            }
            Command::Graph { reply } => {
                let _ = reply.send(self.player.graph().clone());
            }
            Command::Shutdown => {}
        }
    }

    fn apply_edit(&mut self, edit: GraphEdit) -> std::result::Result<(), EditError> {
        match edit {
            GraphEdit::AddTrack => self.player.add_track().map(|_| ()),
            GraphEdit::RemoveTrack(track) => self.player.remove_track(track).map(|_| ()),
            GraphEdit::AddPart(track) => self.player.add_part(track).map(|_| ()),
            GraphEdit::RemovePart { track, position } => {
                self.player.remove_part(track, position).map(|_| ())
            }
            GraphEdit::EditPart {
                track,
                position,
                edit,
            } => self.player.edit_part(track, position, edit),
        }
    }

    fn status(&self) -> StatusReport {
        StatusReport {
            mode: self.player.mode(),
            playing: self.player.is_playing(),
            position: self.player.playback_position(),
            selected_track: self.player.selected_track(),
            track_labels: arrangement::track_labels(self.player.graph().track_count()),
            queue: self.player.queue_rows(),
            segment_count: self.player.segments().len(),
            edit_mode: self.player.is_edit_mode(),
            loading: self.load.is_some(),
        }
    }

    fn start_load(
        &mut self,
        source: Box<dyn SegmentSource>,
        reply: Reply<std::result::Result<LoadSummary, LoadError>>,
    ) {
        if self.load.is_some() {
            let _ = reply.send(Err(LoadError::ConcurrentLoadRejected));
            return;
        }
        let name = source.name();
        self.player.begin_session();
        match DecodeWorker::spawn(source, self.chunk_frames) {
            Ok(messages) => {
                info!("Loading {}", name);
                self.load = Some(PendingLoad {
                    name,
                    assembler: SessionAssembler::new(),
                    messages,
                    reply,
                });
            }
            Err(e) => {
                let _ = reply.send(Err(e));
            }
        }
    }

    fn on_decoder_message(&mut self, message: Option<DecoderMessage>) {
        let Some(load) = self.load.as_mut() else {
            return;
        };
        let progress = match message {
            Some(message) => load.assembler.feed(message),
            None => Err(LoadError::Decode(
                "decoder exited before the session finished".to_string(),
            )),
        };

        match progress {
            Ok(SessionProgress::Pending) => {}
            Ok(SessionProgress::Finished) => self.finish_load(Ok(())),
            Ok(SessionProgress::Segment { segment, finished }) => {
                debug!(
                    "Segment {} loaded ({:.3}s, {} ch)",
                    segment.index, segment.duration, segment.channel_count
                );
                match self.player.add_segment(segment) {
                    Err(e) => self.finish_load(Err(e)),
                    Ok(()) if finished => self.finish_load(Ok(())),
                    Ok(()) => {}
                }
            }
            Err(e) => self.finish_load(Err(e)),
        }
    }

    fn finish_load(&mut self, result: std::result::Result<(), LoadError>) {
        let Some(load) = self.load.take() else {
            return;
        };
        let result = result.map(|()| LoadSummary {
            segment_count: self.player.segments().len(),
            total_duration: self.player.segments().total_duration(),
        });
        match &result {
            Ok(summary) => info!(
                "Loaded {}: {} segments, {:.1}s",
                load.name, summary.segment_count, summary.total_duration
            ),
            Err(e) => {
                warn!("Load of {} failed: {}", load.name, e);
                self.player.begin_session();
            }
        }
        let _ = load.reply.send(result);
    }
}

async fn next_decoder_message(load: &mut Option<PendingLoad>) -> Option<DecoderMessage> {
    match load {
        Some(load) => load.messages.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Cloneable control handle for an [`Engine`]
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl EngineHandle {
    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .map_err(|_| Error::EngineStopped)?;
        rx.await.map_err(|_| Error::EngineStopped)
    }

    /// Decode a source into a fresh session; resolves when the load is done
    pub async fn load(&self, source: Box<dyn SegmentSource>) -> Result<LoadSummary> {
        Ok(self
            .request(|reply| Command::Load { source, reply })
            .await??)
    }

    pub async fn play_part(&self, track: usize, part: usize) -> Result<()> {
        Ok(self
            .request(|reply| Command::PlayPart { track, part, reply })
            .await??)
    }

    pub async fn play_segment(&self, index: usize) -> Result<()> {
        Ok(self
            .request(|reply| Command::PlaySegment { index, reply })
            .await??)
    }

    pub async fn change_track(&self, track: usize) -> Result<SwitchOutcome> {
        Ok(self
            .request(|reply| Command::ChangeTrack { track, reply })
            .await??)
    }

    pub async fn stop(&self) -> Result<()> {
        self.request(|reply| Command::Stop { reply }).await
    }

    pub async fn set_edit_mode(&self, on: bool) -> Result<()> {
        self.request(|reply| Command::SetEditMode { on, reply })
            .await
    }

    pub async fn edit(&self, edit: GraphEdit) -> Result<()> {
        Ok(self.request(|reply| Command::Edit { edit, reply }).await??)
    }

    /// Swap in a new graph; playback stops, edit mode is left as it was
    pub async fn replace_graph(&self, graph: TransitionGraph) -> Result<()> {
        self.request(|reply| Command::ReplaceGraph {
            graph: Box::new(graph),
            reply,
        })
        .await
    }

    /// Queue a graph replacement without waiting; usable from any thread
    pub fn submit_graph(&self, graph: TransitionGraph) -> Result<()> {
        let (reply, _) = oneshot::channel();
        self.commands
            .send(Command::ReplaceGraph {
                graph: Box::new(graph),
                reply,
            })
            .map_err(|_| Error::EngineStopped)
    }

    pub async fn status(&self) -> Result<StatusReport> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Copy of the live graph, including unsaved edits
    pub async fn graph(&self) -> Result<TransitionGraph> {
        self.request(|reply| Command::Graph { reply }).await
    }

    /// Ask the engine to stop; returns immediately
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrangement::presets;
    use crate::audio::OfflineDevice;
    use crate::segments::MemorySource;
    use std::time::Duration;

    fn source(count: usize, secs: f64) -> Box<dyn SegmentSource> {
        let mut source = MemorySource::new("test");
        for _ in 0..count {
            source = source.with_silence(2, 1000, secs);
        }
        Box::new(source)
    }

    fn local_engine() -> (Engine<OfflineDevice>, EngineHandle) {
        Engine::new(Player::new(OfflineDevice::wall_clock()), 256)
    }

    #[tokio::test]
    async fn test_load_and_status() {
        let (engine, handle) = local_engine();
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async move {
                let task = tokio::task::spawn_local(engine.run());

                let summary = handle.load(source(3, 0.5)).await.unwrap();
                assert_eq!(summary.segment_count, 3);
                assert!((summary.total_duration - 1.5).abs() < 1e-9);

                let status = handle.status().await.unwrap();
                assert_eq!(status.segment_count, 3);
                assert_eq!(status.mode, PlaybackMode::Stopped);
                assert!(!status.playing);
                assert!(!status.loading);

                handle.shutdown();
                let player = task.await.unwrap();
                assert_eq!(player.segments().len(), 3);
            })
            .await;
    }

    #[tokio::test]
    async fn test_concurrent_load_rejected() {
        let (engine, handle) = local_engine();
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async move {
                let task = tokio::task::spawn_local(engine.run());

                // Both requests are queued before the engine sees either
                let first = handle.load(source(40, 0.5));
                let second = handle.load(source(1, 0.5));
                let (first, second) = tokio::join!(first, second);
                assert_eq!(first.unwrap().segment_count, 40);
                assert!(matches!(
                    second,
                    Err(Error::Load(LoadError::ConcurrentLoadRejected))
                ));

                handle.shutdown();
                task.await.unwrap();
            })
            .await;
    }

    #[tokio::test]
    async fn test_timer_advances_playback() {
        let (engine, handle) = local_engine();
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async move {
                let task = tokio::task::spawn_local(engine.run());
                handle.load(source(4, 0.05)).await.unwrap();
                handle
                    .replace_graph(TransitionGraph::from_rows("0,0,0,4,3,0\n"))
                    .await
                    .unwrap();
                handle.play_part(0, 0).await.unwrap();

                tokio::time::sleep(Duration::from_millis(120)).await;
                let status = handle.status().await.unwrap();
                assert_eq!(status.mode, PlaybackMode::PlayingTrackSequence);
                let current = status.queue.iter().find(|row| row.is_current).unwrap();
                assert!(current.segment >= 1);

                handle.stop().await.unwrap();
                let status = handle.status().await.unwrap();
                assert_eq!(status.mode, PlaybackMode::Stopped);
                assert!(status.queue.is_empty());

                handle.shutdown();
                task.await.unwrap();
            })
            .await;
    }

    #[tokio::test]
    async fn test_edit_gate_through_handle() {
        let (engine, handle) = local_engine();
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async move {
                let task = tokio::task::spawn_local(engine.run());
                handle.load(source(62, 0.01)).await.unwrap();
                handle.replace_graph(presets::forest().graph).await.unwrap();

                assert!(matches!(
                    handle.edit(GraphEdit::AddTrack).await,
                    Err(Error::Edit(EditError::EditModeInactive))
                ));
                handle.set_edit_mode(true).await.unwrap();
                handle.edit(GraphEdit::AddTrack).await.unwrap();
                assert!(matches!(
                    handle.play_part(0, 0).await,
                    Err(Error::Playback(PlaybackError::EditModeActive))
                ));

                let status = handle.status().await.unwrap();
                assert!(status.edit_mode);
                assert_eq!(status.track_labels, vec!["0", "1", "2"]);

                handle.shutdown();
                task.await.unwrap();
            })
            .await;
    }

    #[tokio::test]
    async fn test_graph_copy_includes_edits() {
        let (engine, handle) = local_engine();
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async move {
                let task = tokio::task::spawn_local(engine.run());
                handle.load(source(8, 0.01)).await.unwrap();
                handle
                    .replace_graph(TransitionGraph::from_rows("0,0,0,4,3,0\n"))
                    .await
                    .unwrap();
                handle.set_edit_mode(true).await.unwrap();
                handle.edit(GraphEdit::AddPart(0)).await.unwrap();

                let graph = handle.graph().await.unwrap();
                assert_eq!(graph.track(0).unwrap().len(), 2);
                assert_eq!(graph.part(0, 1).unwrap().length, 1);

                handle.shutdown();
                task.await.unwrap();
            })
            .await;
    }

    #[tokio::test]
    async fn test_handle_after_shutdown() {
        let (engine, handle) = local_engine();
        handle.shutdown();
        engine.run().await;
        assert!(matches!(handle.stop().await, Err(Error::EngineStopped)));
    }
}
