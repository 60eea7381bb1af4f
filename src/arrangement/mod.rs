// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Transition graph and its text format.
//!
//! This module provides:
//! - Parts: segment runs with transition substitutions at their boundaries
//! - Tracks and the transition graph linking parts into cycles
//! - Row parsing and serialization, built-in presets

pub mod graph;
pub mod part;
pub mod presets;
pub mod rows;

pub use graph::{PartEdit, Track, TransitionGraph};
pub use part::{Part, PartState};
pub use presets::Preset;
pub use rows::{export_file_name, load_graph_file, save_graph_file, ParsedRows};

/// Display labels for a graph's tracks
pub fn track_labels(track_count: usize) -> Vec<String> {
    if track_count == 2 {
        return vec!["Peaceful".to_string(), "Combat".to_string()];
    }
    (0..track_count).map(|i| i.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_track_labels() {
        assert_eq!(track_labels(2), vec!["Peaceful", "Combat"]);
    }

    #[test]
    fn test_numeric_labels() {
        assert_eq!(track_labels(3), vec!["0", "1", "2"]);
        assert!(track_labels(0).is_empty());
    }
}
