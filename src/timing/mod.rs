// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Timing module.
//!
//! This module provides the self-correcting wake delay used by the
//! playback loop.

pub mod jitter;

pub use jitter::{secs_to_duration, JitterCompensator, ANTICIPATION_MS};
