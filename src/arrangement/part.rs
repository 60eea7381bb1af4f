// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Parts and their runtime play state.
//!
//! A [`Part`] is an immutable definition: a contiguous run of segments plus
//! the segments substituted when entering or leaving it from another track.
//! A [`PartState`] is created fresh every time a part is queued, so two queue
//! slots never share a cursor.

/// A position within a track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Part {
    /// Track this part belongs to
    pub track_index: usize,
    /// Index within the track
    pub part_index: usize,
    /// First segment of the part
    pub first_segment: usize,
    /// Number of consecutive segments from `first_segment`
    pub length: usize,
    /// Replaces the first segment when entering from another track
    pub transition_in_segment: usize,
    /// Replaces the last segment when leaving toward another track
    pub transition_out_segment: usize,
    /// Part that follows within the same track
    pub next_part_index: usize,
}

impl Part {
    /// Create a part
    pub fn new(
        track_index: usize,
        part_index: usize,
        first_segment: usize,
        length: usize,
        next_part_index: usize,
    ) -> Self {
        Self {
            track_index,
            part_index,
            first_segment,
            length,
            transition_in_segment: first_segment,
            transition_out_segment: (first_segment + length).saturating_sub(1),
            next_part_index,
        }
    }

    /// Builder: set transition segments
    pub fn with_transitions(mut self, transition_in: usize, transition_out: usize) -> Self {
        self.transition_in_segment = transition_in;
        self.transition_out_segment = transition_out;
        self
    }

    /// Last segment of the un-overridden run
    pub fn last_segment(&self) -> usize {
        (self.first_segment + self.length).saturating_sub(1)
    }

    /// Fresh runtime state for this part
    pub fn start(&self) -> PartState {
        PartState::new(*self)
    }
}

/// Live play state of a queued part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartState {
    part: Part,
    segments: Vec<usize>,
    current: usize,
    transitioning_in: bool,
    transitioning_out: bool,
}

impl PartState {
    /// Create the default (un-overridden) state
    pub fn new(part: Part) -> Self {
        let mut state = Self {
            part,
            segments: Vec::with_capacity(part.length),
            current: 0,
            transitioning_in: false,
            transitioning_out: false,
        };
        state.reset();
        state
    }

    /// Rewind and drop all overrides
    pub fn reset(&mut self) {
        self.transitioning_in = false;
        self.transitioning_out = false;
        self.current = 0;
        self.segments.clear();
        self.segments
            .extend(self.part.first_segment..self.part.first_segment + self.part.length);
    }

    /// Substitute the first segment with the transition-in segment
    pub fn transition_into(&mut self) {
        if let Some(first) = self.segments.first_mut() {
            *first = self.part.transition_in_segment;
            self.transitioning_in = true;
        }
    }

    /// Substitute the last segment with the transition-out segment
    ///
    /// For a single-segment part this overwrites a transition-in.
    pub fn transition_out(&mut self) {
        if let Some(last) = self.segments.last_mut() {
            *last = self.part.transition_out_segment;
            self.transitioning_out = true;
        }
    }

    /// Restore both boundary slots to their default segments
    pub fn reset_transitions(&mut self) {
        self.transitioning_in = false;
        self.transitioning_out = false;
        if let Some(first) = self.segments.first_mut() {
            *first = self.part.first_segment;
        }
        if let Some(last) = self.segments.last_mut() {
            *last = self.part.last_segment();
        }
    }

    /// Definition this state was created from
    pub fn part(&self) -> &Part {
        &self.part
    }

    /// Track of the underlying part
    pub fn track_index(&self) -> usize {
        self.part.track_index
    }

    /// Index of the underlying part
    pub fn part_index(&self) -> usize {
        self.part.part_index
    }

    /// Working sequence of segment indices
    pub fn segments(&self) -> &[usize] {
        &self.segments
    }

    /// Cursor into the working sequence
    pub fn cursor(&self) -> usize {
        self.current
    }

    /// Segment under the cursor, if the part is not finished
    pub fn current_segment(&self) -> Option<usize> {
        self.segments.get(self.current).copied()
    }

    /// Move the cursor to the next slot
    pub fn advance(&mut self) {
        if self.current < self.segments.len() {
            self.current += 1;
        }
    }

    /// Whether every slot has been played
    pub fn is_finished(&self) -> bool {
        self.current >= self.segments.len()
    }

    /// Whether the cursor sits on the final slot
    pub fn is_on_last_segment(&self) -> bool {
        self.current + 1 >= self.segments.len()
    }

    /// Whether the first slot is overridden
    pub fn is_transitioning_in(&self) -> bool {
        self.transitioning_in
    }

    /// Whether the last slot is overridden
    pub fn is_transitioning_out(&self) -> bool {
        self.transitioning_out
    }
}
