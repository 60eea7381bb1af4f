// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! File watcher for hot-reloading transition definitions.
//!
//! The file's directory is watched rather than the file itself so that
//! editors which save by replacing the file are still seen. Modifications
//! are debounced, then the rows are re-parsed.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::arrangement::{load_graph_file, TransitionGraph};

/// Events emitted by the transition watcher
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// File changed and was re-parsed
    Reloaded(Box<TransitionGraph>),
    /// File changed but could not be read
    Error(String),
    /// File was removed
    FileDeleted,
}

/// Watches one transition definition file
pub struct TransitionWatcher {
    _watcher: RecommendedWatcher,
    event_receiver: Receiver<WatchEvent>,
    watched_path: PathBuf,
}

impl TransitionWatcher {
    /// Start watching `path`, reporting changes after `debounce_ms` of quiet
    pub fn new<P: AsRef<Path>>(path: P, debounce_ms: u64) -> Result<Self> {
        let watched_path = path.as_ref().to_path_buf();
        let file_name: OsString = watched_path
            .file_name()
            .ok_or_else(|| anyhow!("Not a file path: {:?}", watched_path))?
            .to_os_string();
        if !watched_path.is_file() {
            return Err(anyhow!("Transition file does not exist: {:?}", watched_path));
        }
        let dir = match watched_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let debounce = Duration::from_millis(debounce_ms);

        let (event_tx, event_rx): (Sender<WatchEvent>, Receiver<WatchEvent>) = mpsc::channel();
        let (notify_tx, notify_rx): (Sender<Event>, Receiver<Event>) = mpsc::channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    let _ = notify_tx.send(event);
                }
            },
            Config::default(),
        )
        .map_err(|e| anyhow!("Failed to create file watcher: {}", e))?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| anyhow!("Failed to watch path {:?}: {}", dir, e))?;

        let reload_path = watched_path.clone();
        std::thread::Builder::new()
            .name("slbgm-watch".to_string())
            .spawn(move || {
                debounce_loop(notify_rx, event_tx, &reload_path, &file_name, debounce)
            })
            .map_err(|e| anyhow!("Failed to start watcher thread: {}", e))?;

        info!("Watching {:?} for changes", watched_path);
        Ok(Self {
            _watcher: watcher,
            event_receiver: event_rx,
            watched_path,
        })
    }

    /// Next event, if one is waiting
    pub fn try_recv(&self) -> Option<WatchEvent> {
        self.event_receiver.try_recv().ok()
    }

    /// Every waiting event
    pub fn recv_all(&self) -> Vec<WatchEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }

    /// Block until the next event; `None` once the watcher has stopped
    pub fn recv(&self) -> Option<WatchEvent> {
        self.event_receiver.recv().ok()
    }

    pub fn watched_path(&self) -> &Path {
        &self.watched_path
    }
}

fn concerns(event: &Event, file_name: &OsString) -> bool {
    event
        .paths
        .iter()
        .any(|p| p.file_name() == Some(file_name.as_os_str()))
}

fn debounce_loop(
    notify_rx: Receiver<Event>,
    event_tx: Sender<WatchEvent>,
    path: &Path,
    file_name: &OsString,
    debounce: Duration,
) {
    let mut last_change: Option<Instant> = None;

    loop {
        match notify_rx.recv_timeout(Duration::from_millis(50)) {
            Ok(event) if concerns(&event, file_name) => match event.kind {
                EventKind::Create(_) | EventKind::Modify(_) => {
                    last_change = Some(Instant::now());
                }
                EventKind::Remove(_) => {
                    // A save-by-replace removes then recreates; let the
                    // debounce decide which one it was
                    last_change = Some(Instant::now());
                }
                _ => {}
            },
            Ok(_) => {}
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }

        let Some(changed) = last_change else {
            continue;
        };
        if changed.elapsed() < debounce {
            continue;
        }
        last_change = None;

        let event = if !path.exists() {
            warn!("Transition file {:?} was deleted", path);
            WatchEvent::FileDeleted
        } else {
            match load_graph_file(path) {
                Ok(parsed) => {
                    debug!(
                        "Reloaded {:?}: {} parts, {} rows skipped",
                        path,
                        parsed.graph.part_count(),
                        parsed.skipped.len()
                    );
                    WatchEvent::Reloaded(Box::new(parsed.graph))
                }
                Err(e) => WatchEvent::Error(format!("Failed to load {:?}: {:#}", path, e)),
            }
        };
        if event_tx.send(event).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_rejected() {
        let dir = tempdir().unwrap();
        assert!(TransitionWatcher::new(dir.path().join("absent_tracks.txt"), 100).is_err());
    }

    #[test]
    fn test_watcher_creation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("forest_tracks.txt");
        fs::write(&path, "0,0,0,2,1,0\n").unwrap();

        let watcher = TransitionWatcher::new(&path, 100).unwrap();
        assert_eq!(watcher.watched_path(), path.as_path());
        assert!(watcher.try_recv().is_none());
    }

    #[test]
    fn test_watcher_detects_changes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("forest_tracks.txt");
        fs::write(&path, "0,0,0,2,1,0\n").unwrap();

        let watcher = TransitionWatcher::new(&path, 100).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        fs::write(&path, "0,0,0,2,1,0\n1,2,2,2,3,0\n").unwrap();
        std::thread::sleep(Duration::from_millis(400));

        let events = watcher.recv_all();
        let reloaded = events.iter().rev().find_map(|e| match e {
            WatchEvent::Reloaded(graph) => Some(graph),
            _ => None,
        });

        // File events can be slow or coalesced on CI, so only check the
        // content when one arrived
        if let Some(graph) = reloaded {
            assert_eq!(graph.track_count(), 2);
            assert_eq!(graph.part(1, 0).unwrap().first_segment, 2);
        }
    }
}
