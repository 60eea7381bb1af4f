// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! SLBGM - seamlessly looping background music.
//!
//! Music is cut into pre-rendered segments. Parts are runs of segments,
//! tracks are graphs of parts, and the scheduler strings segments together
//! gaplessly while the listener switches tracks.

pub mod arrangement;
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod player;
pub mod segments;
pub mod sequencer;
pub mod timing;

pub use arrangement::{Part, PartEdit, PartState, Track, TransitionGraph};
pub use audio::{OfflineDevice, OutputDevice};
pub use config::PlayerConfig;
pub use engine::{Engine, EngineHandle, GraphEdit, LoadSummary, StatusReport};
pub use error::{Error, Result};
pub use player::Player;
pub use segments::{Segment, SegmentStore};
pub use sequencer::{PlaybackMode, Scheduler};
