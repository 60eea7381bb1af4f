// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Built-in transition presets.

use super::graph::{Track, TransitionGraph};
use super::part::Part;

/// A named audio source with its transition graph
#[derive(Debug, Clone)]
pub struct Preset {
    /// Preset name
    pub name: &'static str,
    /// Audio source the graph was written for
    pub audio: &'static str,
    /// Transition graph
    pub graph: TransitionGraph,
}

/// Build a graph from flat `(first, trans_in, length, trans_out, next)` tuples,
/// one slice per track
pub fn graph_from_values(tracks: &[&[usize]]) -> TransitionGraph {
    let tracks = tracks
        .iter()
        .enumerate()
        .map(|(track_index, values)| {
            let mut track = Track::new();
            for v in values.chunks_exact(5) {
                let part_index = track.len();
                track.push(
                    Part::new(track_index, part_index, v[0], v[2], v[4])
                        .with_transitions(v[1], v[3]),
                );
            }
            track
        })
        .collect();
    TransitionGraph::from_tracks(tracks)
}

const FOREST_PEACEFUL: &[usize] = &[
    0, 24, 4, 25, 1, //
    4, 4, 4, 26, 2, //
    8, 8, 4, 27, 3, //
    12, 12, 4, 28, 4, //
    16, 16, 4, 29, 5, //
    20, 20, 4, 30, 0,
];

const FOREST_COMBAT: &[usize] = &[
    31, 55, 4, 56, 1, //
    35, 35, 4, 57, 2, //
    39, 39, 4, 58, 3, //
    43, 43, 4, 59, 4, //
    47, 47, 4, 60, 5, //
    51, 51, 4, 61, 0,
];

/// Forest background music: peaceful and combat, six parts each
pub fn forest() -> Preset {
    Preset {
        name: "forest",
        audio: "slbgm_forest",
        graph: graph_from_values(&[FOREST_PEACEFUL, FOREST_COMBAT]),
    }
}

/// All built-in presets
pub fn all() -> Vec<Preset> {
    vec![forest()]
}

/// Look up a preset by name
pub fn find(name: &str) -> Option<Preset> {
    all().into_iter().find(|p| p.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forest_shape() {
        let preset = forest();
        let graph = &preset.graph;
        assert_eq!(graph.track_count(), 2);
        assert_eq!(graph.track(0).unwrap().len(), 6);
        assert_eq!(graph.track(1).unwrap().len(), 6);

        let first = graph.part(0, 0).unwrap();
        assert_eq!(first.first_segment, 0);
        assert_eq!(first.transition_in_segment, 24);
        assert_eq!(first.transition_out_segment, 25);
        assert_eq!(first.next_part_index, 1);

        // Last part of each track cycles back to the first
        assert_eq!(graph.part(0, 5).unwrap().next_part_index, 0);
        assert_eq!(graph.part(1, 5).unwrap().next_part_index, 0);
        assert_eq!(graph.part(1, 0).unwrap().track_index, 1);
    }

    #[test]
    fn test_forest_row_round_trip() {
        let graph = forest().graph;
        assert_eq!(TransitionGraph::from_rows(&graph.to_rows()), graph);
    }

    #[test]
    fn test_find() {
        assert!(find("forest").is_some());
        assert!(find("desert").is_none());
    }
}
