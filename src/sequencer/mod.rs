// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Sequencer core for gapless segment playback.
//!
//! This module provides:
//! - Play and stream queues with a diagnostic row view
//! - The timer-driven playback scheduler
//! - The track-switch resolver

pub mod queue;
pub mod scheduler;
pub mod switch;

pub use queue::{PlayQueue, QueueRow, StreamEntry, StreamQueue, TransitionLabel, LOOKAHEAD_DEPTH};
pub use scheduler::{
    ArmedTimer, PlaybackContext, PlaybackMode, Scheduler, TimerKind, TimerToken,
};
pub use switch::{change_track, SwitchOutcome};
