// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Transition graph: tracks of parts linked by `next_part_index`.
//!
//! Parts live in a dense array per track and refer to each other by index,
//! so cycles (including a part that follows itself) are plain lookups.
//! `next_part_index` is not range checked here; see the scheduler for what
//! happens when it dangles.

use crate::error::{EditError, EditViolation};

use super::part::Part;

/// An ordered collection of parts for one musical mood
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Track {
    parts: Vec<Part>,
}

impl Track {
    /// Create an empty track
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a track from parts
    pub fn from_parts(parts: Vec<Part>) -> Self {
        Self { parts }
    }

    /// Parts in array order
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Part at an array position
    pub fn get(&self, index: usize) -> Option<&Part> {
        self.parts.get(index)
    }

    /// Number of parts
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub(crate) fn push(&mut self, part: Part) {
        self.parts.push(part);
    }
}

/// Requested new values for a part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartEdit {
    pub part_index: usize,
    pub first_segment: usize,
    pub last_segment: usize,
    pub transition_in_segment: usize,
    pub transition_out_segment: usize,
    /// Accepted without range validation
    pub next_part_index: usize,
}

impl PartEdit {
    /// Start an edit from a part's current values
    pub fn from_part(part: &Part) -> Self {
        Self {
            part_index: part.part_index,
            first_segment: part.first_segment,
            last_segment: part.last_segment(),
            transition_in_segment: part.transition_in_segment,
            transition_out_segment: part.transition_out_segment,
            next_part_index: part.next_part_index,
        }
    }
}

/// All tracks and their parts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionGraph {
    tracks: Vec<Track>,
}

impl TransitionGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a graph from tracks
    pub fn from_tracks(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    /// Swap in the contents of another graph
    pub fn replace(&mut self, other: TransitionGraph) {
        *self = other;
    }

    /// All tracks
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Track by index
    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// Number of tracks
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Part by track and array position
    pub fn part(&self, track: usize, part: usize) -> Option<&Part> {
        self.tracks.get(track).and_then(|t| t.get(part))
    }

    /// Total number of parts over all tracks
    pub fn part_count(&self) -> usize {
        self.tracks.iter().map(|t| t.len()).sum()
    }

    pub(crate) fn track_mut_or_insert(&mut self, index: usize) -> &mut Track {
        if index >= self.tracks.len() {
            self.tracks.resize_with(index + 1, Track::new);
        }
        &mut self.tracks[index]
    }

    /// Append an empty track, returning its index
    pub fn add_track(&mut self) -> usize {
        self.tracks.push(Track::new());
        self.tracks.len() - 1
    }

    /// Remove a track; later tracks move down and their parts are renumbered
    pub fn remove_track(&mut self, index: usize) -> Result<Track, EditError> {
        if index >= self.tracks.len() {
            return Err(EditError::NoSuchTrack(index));
        }
        let removed = self.tracks.remove(index);
        for (track_index, track) in self.tracks.iter_mut().enumerate().skip(index) {
            for part in &mut track.parts {
                part.track_index = track_index;
            }
        }
        Ok(removed)
    }

    /// Append a one-segment part that loops onto itself, returning its position
    pub fn add_part(&mut self, track: usize) -> Result<usize, EditError> {
        let parts = &mut self
            .tracks
            .get_mut(track)
            .ok_or(EditError::NoSuchTrack(track))?
            .parts;
        let position = parts.len();
        parts.push(Part::new(track, position, 0, 1, position));
        Ok(position)
    }

    /// Remove a part; remaining parts get `part_index` equal to their position
    ///
    /// `next_part_index` values are left alone.
    pub fn remove_part(&mut self, track: usize, position: usize) -> Result<Part, EditError> {
        let parts = &mut self
            .tracks
            .get_mut(track)
            .ok_or(EditError::NoSuchTrack(track))?
            .parts;
        if position >= parts.len() {
            return Err(EditError::NoSuchPart {
                track,
                part: position,
            });
        }
        let removed = parts.remove(position);
        for (i, part) in parts.iter_mut().enumerate() {
            part.part_index = i;
        }
        Ok(removed)
    }

    /// Validate and apply an edit to the part at `position`
    ///
    /// On failure every violated constraint is reported and nothing changes.
    /// After a successful edit the track is re-sorted by `part_index`.
    pub fn edit_part(
        &mut self,
        track: usize,
        position: usize,
        edit: PartEdit,
        segment_count: usize,
    ) -> Result<(), EditError> {
        let parts = &mut self
            .tracks
            .get_mut(track)
            .ok_or(EditError::NoSuchTrack(track))?
            .parts;
        if position >= parts.len() {
            return Err(EditError::NoSuchPart {
                track,
                part: position,
            });
        }

        let mut violations = Vec::new();
        let taken = parts
            .iter()
            .enumerate()
            .any(|(i, p)| i != position && p.part_index == edit.part_index);
        if taken {
            violations.push(EditViolation::PartIndexTaken(edit.part_index));
        }
        if edit.first_segment >= segment_count {
            violations.push(EditViolation::FirstSegmentOutOfRange(edit.first_segment));
        }
        if edit.last_segment >= segment_count {
            violations.push(EditViolation::LastSegmentOutOfRange(edit.last_segment));
        }
        if edit.first_segment > edit.last_segment {
            violations.push(EditViolation::FirstAfterLast {
                first: edit.first_segment,
                last: edit.last_segment,
            });
        }
        if !violations.is_empty() {
            return Err(EditError::InvalidPartEdit(violations));
        }

        let part = &mut parts[position];
        part.part_index = edit.part_index;
        part.first_segment = edit.first_segment;
        part.length = edit.last_segment - edit.first_segment + 1;
        part.transition_in_segment = edit.transition_in_segment;
        part.transition_out_segment = edit.transition_out_segment;
        part.next_part_index = edit.next_part_index;
        parts.sort_by_key(|p| p.part_index);
        Ok(())
    }
}
