// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Play queue, stream queue, and the diagnostic queue view.

use std::collections::VecDeque;

use crate::arrangement::{PartState, TransitionGraph};
use crate::error::PlaybackError;
use crate::segments::ScheduledSegment;

/// Parts kept queued during sequence playback: now playing plus on deck
///
/// A track switch can briefly hold one more entry than this.
pub const LOOKAHEAD_DEPTH: usize = 2;

/// Live part states driving the scheduler, front is now playing
#[derive(Debug, Clone, Default)]
pub struct PlayQueue {
    parts: VecDeque<PartState>,
}

impl PlayQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            parts: VecDeque::with_capacity(LOOKAHEAD_DEPTH + 1),
        }
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn front(&self) -> Option<&PartState> {
        self.parts.front()
    }

    pub fn front_mut(&mut self) -> Option<&mut PartState> {
        self.parts.front_mut()
    }

    pub fn get(&self, slot: usize) -> Option<&PartState> {
        self.parts.get(slot)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut PartState> {
        self.parts.get_mut(slot)
    }

    pub fn push(&mut self, state: PartState) {
        self.parts.push_back(state);
    }

    pub fn pop_front(&mut self) -> Option<PartState> {
        self.parts.pop_front()
    }

    pub fn truncate(&mut self, len: usize) {
        self.parts.truncate(len);
    }

    pub fn clear(&mut self) {
        self.parts.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &PartState> {
        self.parts.iter()
    }

    /// Resolve the successor of the part in `slot` on `track` and append a
    /// fresh state for it
    ///
    /// The successor index is looked up on the given track, which need not
    /// be the track of the part in `slot`.
    pub fn queue_next(
        &mut self,
        graph: &TransitionGraph,
        track: usize,
        slot: usize,
    ) -> Result<(), PlaybackError> {
        let Some(from) = self.parts.get(slot) else {
            return Ok(());
        };
        let next = from.part().next_part_index;
        let part = graph
            .part(track, next)
            .ok_or(PlaybackError::DanglingNextPart {
                track,
                part: from.part_index(),
                next,
            })?;
        self.parts.push_back(part.start());
        Ok(())
    }
}

/// A segment handed to the device
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamEntry {
    /// Segment index
    pub segment: usize,
    /// Device handle
    pub handle: ScheduledSegment,
    /// Absolute device start time
    pub start_at: f64,
    /// Absolute device end time
    pub end_at: f64,
}

impl StreamEntry {
    /// Build an entry from a device handle and the segment length
    pub fn new(handle: ScheduledSegment, duration: f64) -> Self {
        Self {
            segment: handle.segment,
            handle,
            start_at: handle.start_at,
            end_at: handle.start_at + duration,
        }
    }

    /// Whether the entry is audible at `now`
    pub fn is_sounding(&self, now: f64) -> bool {
        now >= self.start_at && now < self.end_at
    }
}

/// Scheduled segments whose end has not yet passed
#[derive(Debug, Clone, Default)]
pub struct StreamQueue {
    entries: VecDeque<StreamEntry>,
}

impl StreamQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, first dropping entries that ended before `now`
    pub fn append(&mut self, entry: StreamEntry, now: f64) {
        while self.entries.front().is_some_and(|e| e.end_at <= now) {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Entry audible at `now`, if any
    pub fn now_sounding(&self, now: f64) -> Option<&StreamEntry> {
        self.entries.iter().find(|e| e.is_sounding(now))
    }

    /// Most recently scheduled entry
    pub fn last(&self) -> Option<&StreamEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StreamEntry> {
        self.entries.iter()
    }

    /// Remove every entry, returning them in schedule order
    pub fn drain(&mut self) -> impl Iterator<Item = StreamEntry> + '_ {
        self.entries.drain(..)
    }
}

/// How a queued slot relates to a track change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionLabel {
    /// Transition-in substitute
    In,
    /// Transition-out substitute
    Out,
    /// Regular segment
    Continue,
}

impl std::fmt::Display for TransitionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TransitionLabel::In => "In",
            TransitionLabel::Out => "Out",
            TransitionLabel::Continue => "Continue",
        };
        f.write_str(label)
    }
}

/// One row of the queue view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueRow {
    /// Whether this is the segment under the play cursor
    pub is_current: bool,
    /// Track of the queued part; `None` during single-segment playback
    pub track_index: Option<usize>,
    /// Queued part; `None` during single-segment playback
    pub part_index: Option<usize>,
    /// Segment index
    pub segment: usize,
    /// Transition role; `None` during single-segment playback
    pub transition: Option<TransitionLabel>,
}

/// Rows for every not-yet-played slot of the queued parts, or a single row
/// for the last scheduled segment when no parts are queued
pub fn queue_rows(parts: &PlayQueue, streams: &StreamQueue) -> Vec<QueueRow> {
    if parts.is_empty() {
        return streams
            .last()
            .map(|entry| QueueRow {
                is_current: true,
                track_index: None,
                part_index: None,
                segment: entry.segment,
                transition: None,
            })
            .into_iter()
            .collect();
    }

    let mut rows = Vec::new();
    for (queue_idx, state) in parts.iter().enumerate() {
        let start = state.cursor();
        let last = state.segments().len().saturating_sub(1);
        for (i, &segment) in state.segments().iter().enumerate().skip(start) {
            // A single slot carrying both overrides holds the out segment
            let transition = if state.is_transitioning_out() && i == last {
                TransitionLabel::Out
            } else if state.is_transitioning_in() && i == 0 {
                TransitionLabel::In
            } else {
                TransitionLabel::Continue
            };
            rows.push(QueueRow {
                is_current: queue_idx == 0 && i == start,
                track_index: Some(state.track_index()),
                part_index: Some(state.part_index()),
                segment,
                transition: Some(transition),
            });
        }
    }
    rows
}
