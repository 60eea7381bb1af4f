// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Playback scheduler.
//!
//! Strings segments together gaplessly on the device clock. The scheduler is
//! a plain state machine: it never sleeps itself, it arms at most one
//! one-shot timer and expects its owner to call [`Scheduler::on_timer`] with
//! the timer's token when the delay has passed. Tokens of timers that were
//! replaced or cancelled are ignored.

use std::time::Duration;

use tracing::{debug, info, trace, warn};

use super::queue::{self, PlayQueue, QueueRow, StreamEntry, StreamQueue, LOOKAHEAD_DEPTH};
use super::switch::{self, SwitchOutcome};
use crate::arrangement::TransitionGraph;
use crate::audio::OutputDevice;
use crate::error::PlaybackError;
use crate::segments::SegmentStore;
use crate::timing::{secs_to_duration, JitterCompensator, ANTICIPATION_MS};

/// Everything the scheduler reads or drives but does not own
pub struct PlaybackContext<'a, D: OutputDevice> {
    pub graph: &'a TransitionGraph,
    pub segments: &'a SegmentStore,
    pub device: &'a mut D,
}

impl<'a, D: OutputDevice> PlaybackContext<'a, D> {
    pub fn new(graph: &'a TransitionGraph, segments: &'a SegmentStore, device: &'a mut D) -> Self {
        Self {
            graph,
            segments,
            device,
        }
    }
}

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackMode {
    Stopped,
    /// Auditioning one segment until its auto-stop fires
    PlayingSingleSegment,
    /// Walking the transition graph
    PlayingTrackSequence,
}

impl std::fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PlaybackMode::Stopped => "stopped",
            PlaybackMode::PlayingSingleSegment => "segment",
            PlaybackMode::PlayingTrackSequence => "sequence",
        };
        f.write_str(name)
    }
}

/// What happens when the armed timer fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Advance the play cursor and queue the next segment
    Advance,
    /// End single-segment playback
    AutoStop,
}

/// Identifies one arming of the timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

/// The pending one-shot timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmedTimer {
    pub kind: TimerKind,
    /// Delay from the moment of arming
    pub delay: Duration,
    pub token: TimerToken,
}

/// Gapless segment scheduler
#[derive(Debug)]
pub struct Scheduler {
    parts: PlayQueue,
    streams: StreamQueue,
    selected_track: usize,
    /// Seconds of audio scheduled since `play_start_time`
    queue_duration: f64,
    /// Device time the current run of audio started; infinite when stopped
    play_start_time: f64,
    jitter: JitterCompensator,
    timer: Option<ArmedTimer>,
    next_token: u64,
}

impl Scheduler {
    /// Create a stopped scheduler with the default anticipation
    pub fn new() -> Self {
        Self::with_anticipation(ANTICIPATION_MS)
    }

    /// Create a stopped scheduler with a custom anticipation in milliseconds
    pub fn with_anticipation(anticipation_ms: f64) -> Self {
        Self {
            parts: PlayQueue::new(),
            streams: StreamQueue::new(),
            selected_track: 0,
            queue_duration: 0.0,
            play_start_time: f64::INFINITY,
            jitter: JitterCompensator::new(anticipation_ms),
            timer: None,
            next_token: 0,
        }
    }

    /// Current playback state
    pub fn mode(&self) -> PlaybackMode {
        if !self.parts.is_empty() {
            PlaybackMode::PlayingTrackSequence
        } else if matches!(self.timer, Some(t) if t.kind == TimerKind::AutoStop) {
            PlaybackMode::PlayingSingleSegment
        } else {
            PlaybackMode::Stopped
        }
    }

    /// The pending timer, if any
    pub fn armed_timer(&self) -> Option<ArmedTimer> {
        self.timer
    }

    /// Track that successors are resolved from
    pub fn selected_track(&self) -> usize {
        self.selected_track
    }

    /// Choose the track for future plays without touching the queue
    pub fn select_track(&mut self, track: usize) {
        self.selected_track = track;
    }

    pub fn play_queue(&self) -> &PlayQueue {
        &self.parts
    }

    pub fn stream_queue(&self) -> &StreamQueue {
        &self.streams
    }

    /// Whether scheduled audio covers the device's current time
    pub fn is_playing<D: OutputDevice>(&self, device: &D) -> bool {
        let now = device.now();
        now >= self.play_start_time && now < self.play_start_time + self.queue_duration
    }

    /// Seconds since the current run of audio started; zero when stopped
    pub fn playback_position<D: OutputDevice>(&self, device: &D) -> f64 {
        if self.play_start_time.is_finite() {
            (device.now() - self.play_start_time).max(0.0)
        } else {
            0.0
        }
    }

    /// Segment audible right now, if any
    pub fn now_sounding<D: OutputDevice>(&self, device: &D) -> Option<&StreamEntry> {
        self.streams.now_sounding(device.now())
    }

    /// Diagnostic view of the queue
    pub fn queue_rows(&self) -> Vec<QueueRow> {
        queue::queue_rows(&self.parts, &self.streams)
    }

    /// Cancel timers and scheduled audio, empty both queues
    ///
    /// Safe to call at any time.
    pub fn stop<D: OutputDevice>(&mut self, segments: &SegmentStore, device: &mut D) {
        let was_active = self.timer.is_some() || !self.streams.is_empty() || !self.parts.is_empty();
        self.timer = None;
        for entry in self.streams.drain() {
            segments.cancel(device, &entry.handle);
        }
        self.parts.clear();
        self.queue_duration = 0.0;
        self.play_start_time = f64::INFINITY;
        self.jitter.reset();
        if was_active {
            info!("Playback stopped");
        }
    }

    /// Audition one segment, stopping by itself after its duration
    pub fn play_segment<D: OutputDevice>(
        &mut self,
        ctx: &mut PlaybackContext<'_, D>,
        index: usize,
    ) -> Result<(), PlaybackError> {
        self.stop(ctx.segments, ctx.device);
        let duration = ctx.segments.require(index)?.duration;
        if let Err(e) = self.queue_stream(ctx, index) {
            self.stop(ctx.segments, ctx.device);
            return Err(e);
        }
        self.arm(TimerKind::AutoStop, secs_to_duration(duration));
        info!("Playing segment {} ({:.3}s)", index, duration);
        Ok(())
    }

    /// Start sequence playback at a part, selecting the part's track
    pub fn play_part<D: OutputDevice>(
        &mut self,
        ctx: &mut PlaybackContext<'_, D>,
        track: usize,
        part: usize,
    ) -> Result<(), PlaybackError> {
        self.stop(ctx.segments, ctx.device);
        let definition = ctx
            .graph
            .track(track)
            .ok_or(PlaybackError::NoSuchTrack(track))?
            .get(part)
            .ok_or(PlaybackError::NoSuchPart { track, part })?;

        self.selected_track = track;
        self.parts.push(definition.start());
        info!("Playing track {} part {}", track, part);

        let started = self
            .parts
            .queue_next(ctx.graph, self.selected_track, 0)
            .and_then(|()| self.update(ctx));
        if let Err(e) = started {
            self.stop(ctx.segments, ctx.device);
            return Err(e);
        }
        Ok(())
    }

    /// Switch tracks, redirecting queued parts through transition segments
    pub fn change_track<D: OutputDevice>(
        &mut self,
        ctx: &mut PlaybackContext<'_, D>,
        track: usize,
    ) -> Result<SwitchOutcome, PlaybackError> {
        match switch::change_track(&mut self.parts, ctx.graph, &mut self.selected_track, track) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                if self.mode() == PlaybackMode::PlayingTrackSequence {
                    self.stop(ctx.segments, ctx.device);
                }
                Err(e)
            }
        }
    }

    /// Handle a fired timer
    ///
    /// On error playback has already been stopped.
    pub fn on_timer<D: OutputDevice>(
        &mut self,
        ctx: &mut PlaybackContext<'_, D>,
        token: TimerToken,
    ) -> Result<(), PlaybackError> {
        let timer = match self.timer {
            Some(timer) if timer.token == token => timer,
            _ => {
                trace!("Ignoring stale timer {:?}", token);
                return Ok(());
            }
        };
        self.timer = None;

        match timer.kind {
            TimerKind::AutoStop => {
                self.stop(ctx.segments, ctx.device);
                Ok(())
            }
            TimerKind::Advance => {
                if let Some(front) = self.parts.front_mut() {
                    front.advance();
                }
                let result = self.update(ctx);
                if let Err(e) = &result {
                    warn!("Sequence playback ended: {}", e);
                    self.stop(ctx.segments, ctx.device);
                }
                result
            }
        }
    }

    /// One iteration of the sequence loop: settle the queue head, schedule
    /// its current segment, and arm the next wake
    fn update<D: OutputDevice>(
        &mut self,
        ctx: &mut PlaybackContext<'_, D>,
    ) -> Result<(), PlaybackError> {
        if self.parts.is_empty() {
            self.stop(ctx.segments, ctx.device);
            return Ok(());
        }

        if self.parts.front().is_some_and(|p| p.is_finished()) {
            self.parts.pop_front();
            if self.parts.is_empty() {
                self.stop(ctx.segments, ctx.device);
                return Ok(());
            }
            if self.parts.len() < LOOKAHEAD_DEPTH {
                self.parts.queue_next(ctx.graph, self.selected_track, 0)?;
            }
        }

        let (index, track, part) = match self.parts.front() {
            Some(front) => match front.current_segment() {
                Some(index) => (index, front.track_index(), front.part_index()),
                None => {
                    return Err(PlaybackError::EmptyPart {
                        track: front.track_index(),
                        part: front.part_index(),
                    })
                }
            },
            None => return Ok(()),
        };

        let duration = ctx.segments.require(index)?.duration;
        let now = ctx.device.now();
        let restarted = self.queue_stream(ctx, index)?;
        if restarted {
            self.jitter.reset();
        }
        let delay = self.jitter.next_delay(now, duration);
        trace!(
            "Track {} part {} segment {}: next wake in {:.1}ms (error {:.1}ms)",
            track,
            part,
            index,
            delay.as_secs_f64() * 1000.0,
            self.jitter.last_error_ms()
        );
        self.arm(TimerKind::Advance, delay);
        Ok(())
    }

    /// Schedule a segment at the end of the audio already queued, or now if
    /// nothing is sounding. Returns whether a new run of audio was started.
    fn queue_stream<D: OutputDevice>(
        &mut self,
        ctx: &mut PlaybackContext<'_, D>,
        index: usize,
    ) -> Result<bool, PlaybackError> {
        let duration = ctx.segments.require(index)?.duration;
        let now = ctx.device.now();
        let restarted = !self.is_playing(&*ctx.device);
        let when = if restarted {
            self.play_start_time = now;
            self.queue_duration = 0.0;
            0.0
        } else {
            self.queue_duration - (now - self.play_start_time)
        };

        let handle = ctx.segments.schedule(ctx.device, index, when)?;
        self.queue_duration += duration;
        self.streams.append(StreamEntry::new(handle, duration), now);
        if restarted {
            debug!("Audio run started at {:.3}", now);
        }
        trace!("Segment {} scheduled at {:.3}", index, handle.start_at);
        Ok(restarted)
    }

    fn arm(&mut self, kind: TimerKind, delay: Duration) {
        self.next_token += 1;
        self.timer = Some(ArmedTimer {
            kind,
            delay,
            token: TimerToken(self.next_token),
        });
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
