// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Track-switch resolver.
//!
//! A switch re-routes the queue so the music leaves the current part early
//! through its transition-out segment and enters a part of the new track
//! through its transition-in segment. If the front part is already on its
//! last segment there is no room left to redirect it, so the part on deck
//! becomes the outgoing one instead.

use tracing::debug;

use super::queue::PlayQueue;
use crate::arrangement::TransitionGraph;
use crate::error::PlaybackError;

/// What a track change did to the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// Requested track was already selected
    Unchanged,
    /// Selection changed; nothing was queued
    SelectionOnly,
    /// Queue was redirected
    Redirected {
        /// Queue slot of the outgoing part
        out_slot: usize,
        /// Queue slot of the incoming part
        in_slot: usize,
        /// Whether transition overrides were applied (false when both
        /// parts are on the same track)
        transitions: bool,
    },
}

/// Select `new_track` and redirect the queued parts toward it
///
/// The selection wraps modulo the track count. On error the selection has
/// already changed and the queue holds only the kept slots.
pub fn change_track(
    queue: &mut PlayQueue,
    graph: &TransitionGraph,
    selected_track: &mut usize,
    new_track: usize,
) -> Result<SwitchOutcome, PlaybackError> {
    if new_track == *selected_track {
        return Ok(SwitchOutcome::Unchanged);
    }
    let track_count = graph.track_count();
    if track_count == 0 {
        return Err(PlaybackError::NoSuchTrack(new_track));
    }
    *selected_track = new_track % track_count;

    let Some(front) = queue.front() else {
        return Ok(SwitchOutcome::SelectionOnly);
    };

    let out_slot = if front.is_on_last_segment() && queue.len() > 1 {
        1
    } else {
        0
    };
    let in_slot = out_slot + 1;
    queue.truncate(in_slot);
    queue.queue_next(graph, *selected_track, out_slot)?;

    let out_track = queue.get(out_slot).map(|p| p.track_index());
    let in_track = queue.get(in_slot).map(|p| p.track_index());
    let transitions = out_track != in_track;

    if let Some(out) = queue.get_mut(out_slot) {
        if transitions {
            out.transition_out();
        } else {
            out.reset_transitions();
        }
    }
    if let Some(into) = queue.get_mut(in_slot) {
        if transitions {
            into.transition_into();
        } else {
            into.reset_transitions();
        }
    }

    debug!(
        "Track switch to {}: out slot {} ({:?}), in slot {} ({:?}), transitions {}",
        selected_track, out_slot, out_track, in_slot, in_track, transitions
    );

    Ok(SwitchOutcome::Redirected {
        out_slot,
        in_slot,
        transitions,
    })
}
