// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Text row format for transition definitions.
//!
//! One row per part:
//!
//! ```text
//! track_index,first_segment,transition_in_segment,length,transition_out_segment,next_part_index
//! ```
//!
//! `part_index` is the row's position among the rows of its track. Malformed
//! rows are skipped and do not consume a part index.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

use super::graph::TransitionGraph;
use super::part::Part;
use crate::error::DefinitionError;

/// Highest track count a definition file may create
pub const MAX_TRACKS: usize = 256;

/// Number of fields in a row
pub const ROW_FIELDS: usize = 6;

/// Result of parsing a definition
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRows {
    /// Graph built from the well-formed rows
    pub graph: TransitionGraph,
    /// Rows that were skipped
    pub skipped: Vec<DefinitionError>,
}

fn parse_row(row: &str) -> std::result::Result<[usize; ROW_FIELDS], String> {
    let fields: Vec<&str> = row.split(',').map(str::trim).collect();
    if fields.len() < ROW_FIELDS {
        return Err(format!(
            "expected {} fields, found {}",
            ROW_FIELDS,
            fields.len()
        ));
    }
    let mut values = [0usize; ROW_FIELDS];
    for (value, field) in values.iter_mut().zip(&fields) {
        *value = field
            .parse()
            .map_err(|_| format!("'{}' is not a non-negative integer", field))?;
    }
    if values[0] >= MAX_TRACKS {
        return Err(format!("track index {} exceeds {}", values[0], MAX_TRACKS - 1));
    }
    if values[3] == 0 {
        return Err("length must be at least 1".to_string());
    }
    Ok(values)
}

impl TransitionGraph {
    /// Parse rows, reporting the ones that were skipped
    pub fn parse_rows(text: &str) -> ParsedRows {
        let mut graph = TransitionGraph::new();
        let mut skipped = Vec::new();

        for (line_idx, row) in text.lines().enumerate() {
            if row.trim().is_empty() {
                continue;
            }
            match parse_row(row) {
                Ok([track, first, trans_in, length, trans_out, next]) => {
                    let parts = graph.track_mut_or_insert(track);
                    let part_index = parts.len();
                    parts.push(
                        Part::new(track, part_index, first, length, next)
                            .with_transitions(trans_in, trans_out),
                    );
                }
                Err(reason) => {
                    let err = DefinitionError::MalformedRow {
                        line: line_idx + 1,
                        reason,
                    };
                    warn!("Skipping row: {}", err);
                    skipped.push(err);
                }
            }
        }

        ParsedRows { graph, skipped }
    }

    /// Parse rows, silently dropping malformed ones
    pub fn from_rows(text: &str) -> Self {
        Self::parse_rows(text).graph
    }

    /// Serialize to rows, parts ordered by `part_index` within each track
    ///
    /// Rows only name tracks that have parts, so empty tracks after the last
    /// non-empty one do not survive a round trip.
    pub fn to_rows(&self) -> String {
        let mut out = String::new();
        for (track_index, track) in self.tracks().iter().enumerate() {
            let mut parts: Vec<&Part> = track.parts().iter().collect();
            parts.sort_by_key(|p| p.part_index);
            for part in parts {
                // Writing to a String cannot fail
                let _ = writeln!(
                    out,
                    "{},{},{},{},{},{}",
                    track_index,
                    part.first_segment,
                    part.transition_in_segment,
                    part.length,
                    part.transition_out_segment,
                    part.next_part_index
                );
            }
        }
        out
    }

    /// Number of empty tracks after the last track with parts
    pub fn trailing_empty_tracks(&self) -> usize {
        self.tracks().iter().rev().take_while(|t| t.is_empty()).count()
    }
}

/// Definition file name for an audio source: extension stripped, `_tracks.txt` appended
pub fn export_file_name<P: AsRef<Path>>(audio_path: P) -> PathBuf {
    let path = audio_path.as_ref();
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}_tracks.txt", stem))
}

/// Load a definition file
pub fn load_graph_file<P: AsRef<Path>>(path: P) -> Result<ParsedRows> {
    let text = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read transition file: {:?}", path.as_ref()))?;
    Ok(TransitionGraph::parse_rows(&text))
}

/// Write a definition file
pub fn save_graph_file<P: AsRef<Path>>(graph: &TransitionGraph, path: P) -> Result<()> {
    let dropped = graph.trailing_empty_tracks();
    if dropped > 0 {
        warn!(
            "{} empty track(s) at the end of the graph will not be saved to {:?}",
            dropped,
            path.as_ref()
        );
    }
    fs::write(path.as_ref(), graph.to_rows())
        .with_context(|| format!("Failed to write transition file: {:?}", path.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_part_index_from_row_order() {
        let graph = TransitionGraph::from_rows("0,0,24,4,25,1\n0,4,4,4,26,2\n");
        let track = graph.track(0).unwrap();
        assert_eq!(track.len(), 2);
        assert_eq!(track.parts()[0].part_index, 0);
        assert_eq!(track.parts()[0].next_part_index, 1);
        assert_eq!(track.parts()[0].transition_in_segment, 24);
        assert_eq!(track.parts()[0].transition_out_segment, 25);
        assert_eq!(track.parts()[1].part_index, 1);
        assert_eq!(track.parts()[1].next_part_index, 2);
    }

    #[test]
    fn test_malformed_row_skipped_without_consuming_index() {
        let parsed = TransitionGraph::parse_rows("0,0,24,4,25,1\n0,0,24\n0,4,4,4,26,2\n");
        assert_eq!(parsed.skipped.len(), 1);
        assert!(matches!(
            parsed.skipped[0],
            DefinitionError::MalformedRow { line: 2, .. }
        ));
        let track = parsed.graph.track(0).unwrap();
        assert_eq!(track.len(), 2);
        assert_eq!(track.parts()[1].part_index, 1);
        assert_eq!(track.parts()[1].first_segment, 4);
    }

    #[test]
    fn test_non_numeric_and_zero_length_rows_skipped() {
        let parsed = TransitionGraph::parse_rows("0,a,1,1,1,0\n0,1,1,0,1,0\n300,0,0,1,0,0\n");
        assert_eq!(parsed.skipped.len(), 3);
        assert_eq!(parsed.graph.track_count(), 0);
    }

    #[test]
    fn test_rows_for_later_track_create_gaps() {
        let graph = TransitionGraph::from_rows("1,0,0,2,1,0\n");
        assert_eq!(graph.track_count(), 2);
        assert!(graph.track(0).unwrap().is_empty());
        assert_eq!(graph.part(1, 0).unwrap().track_index, 1);
    }

    #[test]
    fn test_round_trip() {
        let text = "0,0,24,4,25,1\n0,4,4,4,26,0\n1,31,55,4,56,0\n";
        let graph = TransitionGraph::from_rows(text);
        assert_eq!(graph.to_rows(), text);
        assert_eq!(TransitionGraph::from_rows(&graph.to_rows()), graph);
    }

    #[test]
    fn test_whitespace_and_crlf_tolerated() {
        let graph = TransitionGraph::from_rows("0, 0, 1, 2, 3, 0\r\n\r\n");
        assert_eq!(graph.part(0, 0).unwrap().length, 2);
    }

    #[test]
    fn test_export_file_name() {
        assert_eq!(
            export_file_name("music/slbgm_forest.ogg"),
            PathBuf::from("music/slbgm_forest_tracks.txt")
        );
        assert_eq!(export_file_name("forest"), PathBuf::from("forest_tracks.txt"));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("forest_tracks.txt");
        let graph = TransitionGraph::from_rows("0,0,1,2,3,0\n");
        save_graph_file(&graph, &path).unwrap();
        let loaded = load_graph_file(&path).unwrap();
        assert_eq!(loaded.graph, graph);
        assert!(loaded.skipped.is_empty());
    }

    #[test]
    fn test_trailing_empty_tracks_not_saved() {
        let mut graph = TransitionGraph::from_rows("1,0,0,2,1,0\n");
        graph.add_track();
        graph.add_track();
        assert_eq!(graph.track_count(), 4);
        assert_eq!(graph.trailing_empty_tracks(), 2);

        let dir = tempdir().unwrap();
        let path = dir.path().join("gaps_tracks.txt");
        save_graph_file(&graph, &path).unwrap();
        let loaded = load_graph_file(&path).unwrap().graph;
        assert_eq!(loaded.track_count(), 2);
        assert!(loaded.track(0).unwrap().is_empty());
        assert_eq!(loaded.trailing_empty_tracks(), 0);
    }
}
