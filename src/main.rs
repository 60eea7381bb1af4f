// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::env;
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{anyhow, bail, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::LocalSet;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use slbgm::arrangement::{export_file_name, load_graph_file, presets, save_graph_file};
use slbgm::audio::{default_device_name, list_devices, CpalDevice};
use slbgm::config::{TransitionWatcher, WatchEvent};
use slbgm::segments::{OggFileSource, SegmentSource, WavDirectorySource};
use slbgm::{
    Engine, EngineHandle, GraphEdit, OfflineDevice, OutputDevice, PartEdit, Player,
    PlayerConfig, Scheduler, StatusReport, TransitionGraph,
};

fn print_usage() {
    println!("SLBGM - Seamlessly looping background music");
    println!();
    println!("Usage: slbgm [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --list-devices                       List available audio output devices");
    println!("  --play <audio> [FLAGS]               Load <audio> as segments and play");
    println!("                                       <audio> is a chained .ogg file or a directory of .wav files");
    println!("      --transitions <file>             Transition rows (default <audio>_tracks.txt)");
    println!("      --config <file>                  Player configuration (YAML)");
    println!("      --dry-run                        Run without an audio device");
    println!("  --preset <name> <audio> [FLAGS]      Play with a built-in transition preset");
    println!("  --export <audio> <file>              Write the rows in <file> to <audio>_tracks.txt");
    println!("  --help                               Show this help message");
    println!();
    println!("Commands while playing:");
    println!("  part <track> <part>   Play a part");
    println!("  segment <n>           Audition one segment");
    println!("  track <n>             Switch track");
    println!("  stop                  Stop playback");
    println!("  status                Show the queue");
    println!("  edit on|off           Toggle edit mode");
    println!("  quit                  Exit");
    println!();
    println!("Commands in edit mode:");
    println!("  add-track                         Append an empty track");
    println!("  remove-track <t>                  Remove a track");
    println!("  add-part <t>                      Append a one-segment part to a track");
    println!("  remove-part <t> <p>               Remove the part at position <p>");
    println!("  edit-part <t> <p> <index> <first> <last> <in> <out> <next>");
    println!("                                    Set every field of a part");
    println!("  save [file]                       Write the graph (default <audio>_tracks.txt)");
}

fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_devices() {
    let default = default_device_name();
    let devices = list_devices();
    if devices.is_empty() {
        println!("No audio output devices found");
        return;
    }
    println!("Audio output devices:");
    for (i, name) in devices.iter().enumerate() {
        let marker = if default.as_deref() == Some(name.as_str()) {
            " (default)"
        } else {
            ""
        };
        println!("  {}: {}{}", i, name, marker);
    }
}

/// Flags shared by `--play` and `--preset`
#[derive(Debug, Default)]
struct PlayOptions {
    audio: PathBuf,
    transitions: Option<PathBuf>,
    config: Option<PathBuf>,
    dry_run: bool,
}

fn parse_play_options(audio: &str, flags: &[String]) -> Result<PlayOptions> {
    let mut options = PlayOptions {
        audio: PathBuf::from(audio),
        ..Default::default()
    };
    let mut iter = flags.iter();
    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--transitions" => {
                let path = iter
                    .next()
                    .ok_or_else(|| anyhow!("--transitions requires a file"))?;
                options.transitions = Some(PathBuf::from(path));
            }
            "--config" => {
                let path = iter.next().ok_or_else(|| anyhow!("--config requires a file"))?;
                options.config = Some(PathBuf::from(path));
            }
            "--dry-run" => options.dry_run = true,
            other => bail!("Unknown flag: {}", other),
        }
    }
    Ok(options)
}

/// Read a transition file, reporting skipped rows
fn read_transitions(path: &Path) -> Result<TransitionGraph> {
    let parsed = load_graph_file(path)?;
    if !parsed.skipped.is_empty() {
        println!(
            "Skipped {} malformed row(s) in {:?}",
            parsed.skipped.len(),
            path
        );
    }
    Ok(parsed.graph)
}

/// Segment source for a path: a directory of WAV files or a chained Ogg file
fn open_source(path: &Path) -> Result<Box<dyn SegmentSource>> {
    if path.is_dir() {
        return Ok(Box::new(WavDirectorySource::open(path)?));
    }
    let is_ogg = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("ogg"))
        .unwrap_or(false);
    if !is_ogg {
        bail!("{:?} is neither a directory of .wav files nor an .ogg file", path);
    }
    Ok(Box::new(OggFileSource::open(path)?))
}

fn export(audio: &str, transitions: &str) -> Result<()> {
    let graph = read_transitions(Path::new(transitions))?;
    let target = export_file_name(audio);
    save_graph_file(&graph, &target)?;
    println!(
        "Wrote {} track(s), {} part(s) to {:?}",
        graph.track_count(),
        graph.part_count(),
        target
    );
    Ok(())
}

async fn play(options: PlayOptions, preset: Option<TransitionGraph>) -> Result<()> {
    let config = match &options.config {
        Some(path) => PlayerConfig::load(path)?,
        None => PlayerConfig::default(),
    };
    init_logging(&config.log_filter);

    let transitions = options
        .transitions
        .clone()
        .or_else(|| Some(export_file_name(&options.audio)).filter(|p| p.is_file()));
    let graph = match (preset, &transitions) {
        (Some(graph), _) => graph,
        (None, Some(path)) => read_transitions(path)?,
        (None, None) => {
            println!("No transition file; only segment auditioning is available");
            TransitionGraph::new()
        }
    };
    let scheduler = Scheduler::with_anticipation(config.anticipation_ms);

    if options.dry_run {
        let player = Player::with_scheduler(OfflineDevice::wall_clock(), scheduler);
        run_session(player, &config, &options.audio, graph, transitions).await
    } else {
        let device = CpalDevice::open(&config.audio)?;
        let player = Player::with_scheduler(device, scheduler);
        run_session(player, &config, &options.audio, graph, transitions).await
    }
}

async fn run_session<D: OutputDevice + 'static>(
    player: Player<D>,
    config: &PlayerConfig,
    audio: &Path,
    graph: TransitionGraph,
    transitions: Option<PathBuf>,
) -> Result<()> {
    let (engine, handle) = Engine::new(player, config.chunk_frames);
    let source = open_source(audio)?;

    let local = LocalSet::new();
    local
        .run_until(async move {
            let engine_task = tokio::task::spawn_local(engine.run());

            handle.replace_graph(graph).await?;
            println!("Loading {:?}...", audio);
            let summary = handle.load(source).await?;
            println!(
                "Loaded {} segments ({:.1}s)",
                summary.segment_count, summary.total_duration
            );

            if config.watch_transitions {
                if let Some(path) = transitions {
                    forward_reloads(&path, config.debounce_ms, handle.clone())?;
                }
            }

            println!("Type 'help' for commands");
            console(&handle, &export_file_name(audio)).await?;

            handle.shutdown();
            engine_task.await?;
            Ok::<(), anyhow::Error>(())
        })
        .await
}

/// Replace the engine's graph whenever the transition file changes
fn forward_reloads(path: &Path, debounce_ms: u64, handle: EngineHandle) -> Result<()> {
    let watcher = TransitionWatcher::new(path, debounce_ms)?;
    thread::Builder::new()
        .name("slbgm-reload".to_string())
        .spawn(move || {
            while let Some(event) = watcher.recv() {
                match event {
                    WatchEvent::Reloaded(graph) => {
                        info!("Transition file changed, replacing graph");
                        if handle.submit_graph(*graph).is_err() {
                            break;
                        }
                    }
                    WatchEvent::Error(e) => warn!("{}", e),
                    WatchEvent::FileDeleted => warn!("Transition file deleted"),
                }
            }
        })?;
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum ConsoleCommand {
    Part(usize, usize),
    Segment(usize),
    Track(usize),
    Stop,
    Status,
    EditMode(bool),
    Graph(GraphEdit),
    Save(Option<PathBuf>),
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<Option<ConsoleCommand>> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let number = |i: usize| -> Result<usize> {
        let word = words
            .get(i)
            .ok_or_else(|| anyhow!("'{}' needs more arguments", words[0]))?;
        word.parse()
            .map_err(|_| anyhow!("Invalid number: {}", word))
    };

    let command = match words.first() {
        None => return Ok(None),
        Some(&"part") => ConsoleCommand::Part(number(1)?, number(2)?),
        Some(&"segment") => ConsoleCommand::Segment(number(1)?),
        Some(&"track") => ConsoleCommand::Track(number(1)?),
        Some(&"stop") => ConsoleCommand::Stop,
        Some(&"status") => ConsoleCommand::Status,
        Some(&"edit") => match words.get(1) {
            Some(&"on") => ConsoleCommand::EditMode(true),
            Some(&"off") => ConsoleCommand::EditMode(false),
            _ => bail!("Usage: edit on|off"),
        },
        Some(&"add-track") => ConsoleCommand::Graph(GraphEdit::AddTrack),
        Some(&"remove-track") => ConsoleCommand::Graph(GraphEdit::RemoveTrack(number(1)?)),
        Some(&"add-part") => ConsoleCommand::Graph(GraphEdit::AddPart(number(1)?)),
        Some(&"remove-part") => ConsoleCommand::Graph(GraphEdit::RemovePart {
            track: number(1)?,
            position: number(2)?,
        }),
        Some(&"edit-part") => ConsoleCommand::Graph(GraphEdit::EditPart {
            track: number(1)?,
            position: number(2)?,
            edit: PartEdit {
                part_index: number(3)?,
                first_segment: number(4)?,
                last_segment: number(5)?,
                transition_in_segment: number(6)?,
                transition_out_segment: number(7)?,
                next_part_index: number(8)?,
            },
        }),
        Some(&"save") => ConsoleCommand::Save(words.get(1).map(PathBuf::from)),
        Some(&"help") => ConsoleCommand::Help,
        Some(&"quit") | Some(&"exit") => ConsoleCommand::Quit,
        Some(other) => bail!("Unknown command: {}", other),
    };
    Ok(Some(command))
}

fn print_status(status: &StatusReport) {
    let label = |track: Option<usize>| {
        track
            .and_then(|t| status.track_labels.get(t).cloned())
            .unwrap_or_else(|| "None".to_string())
    };
    println!(
        "{} | playing: {} | position: {:.2}s | track: {} | segments: {}{}",
        status.mode,
        status.playing,
        status.position,
        label(Some(status.selected_track)),
        status.segment_count,
        if status.edit_mode { " | EDIT" } else { "" }
    );
    println!("   {:<10} {:<6} {:<8} Transition", "Track", "Part", "Segment");
    if status.queue.is_empty() {
        println!("   {:<10} {:<6} {:<8} None", "None", "None", "None");
    }
    for row in &status.queue {
        println!(
            "{}  {:<10} {:<6} {:<8} {}",
            if row.is_current { ">" } else { " " },
            label(row.track_index),
            row.part_index
                .map(|p| p.to_string())
                .unwrap_or_else(|| "None".to_string()),
            row.segment,
            row.transition
                .map(|t| t.to_string())
                .unwrap_or_else(|| "None".to_string()),
        );
    }
}

/// Write the live graph to `path`
async fn save(handle: &EngineHandle, path: &Path) -> slbgm::Result<()> {
    let graph = handle.graph().await?;
    match save_graph_file(&graph, path) {
        Ok(()) => println!(
            "Saved {} track(s), {} part(s) to {:?}",
            graph.track_count(),
            graph.part_count(),
            path
        ),
        Err(e) => eprintln!("Error: {:#}", e),
    }
    Ok(())
}

/// Read commands from stdin until `quit` or end of input
///
/// `save` without a file name writes to `save_path`.
async fn console(handle: &EngineHandle, save_path: &Path) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("Error: {}", e);
                continue;
            }
        };

        let result = match command {
            ConsoleCommand::Part(track, part) => handle.play_part(track, part).await,
            ConsoleCommand::Segment(index) => handle.play_segment(index).await,
            ConsoleCommand::Track(track) => handle.change_track(track).await.map(|_| ()),
            ConsoleCommand::Stop => handle.stop().await,
            ConsoleCommand::EditMode(on) => handle.set_edit_mode(on).await,
            ConsoleCommand::Graph(edit) => handle.edit(edit).await,
            ConsoleCommand::Save(path) => {
                save(handle, path.as_deref().unwrap_or(save_path)).await
            }
            ConsoleCommand::Status => handle.status().await.map(|s| print_status(&s)),
            ConsoleCommand::Help => {
                print_usage();
                Ok(())
            }
            ConsoleCommand::Quit => break,
        };
        if let Err(e) = result {
            eprintln!("Error: {}", e);
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("SLBGM - Seamlessly looping background music");
        println!("Run with --help for usage information");
        return Ok(());
    }

    match args[1].as_str() {
        "--list-devices" => {
            print_devices();
        }
        "--play" => {
            if args.len() < 3 {
                eprintln!("Error: --play requires an .ogg file or a directory of .wav segments");
                std::process::exit(1);
            }
            let options = parse_play_options(&args[2], &args[3..])?;
            play(options, None).await?;
        }
        "--preset" => {
            if args.len() < 4 {
                eprintln!("Error: --preset requires a preset name and an audio source");
                std::process::exit(1);
            }
            let preset = presets::find(&args[2]).ok_or_else(|| {
                let names: Vec<&str> = presets::all().iter().map(|p| p.name).collect();
                anyhow!("Unknown preset '{}', available: {}", args[2], names.join(", "))
            })?;
            let options = parse_play_options(&args[3], &args[4..])?;
            play(options, Some(preset.graph)).await?;
        }
        "--export" => {
            if args.len() < 4 {
                eprintln!("Error: --export requires an audio source and a transition file");
                std::process::exit(1);
            }
            export(&args[2], &args[3])?;
        }
        "--help" | "-h" => {
            print_usage();
        }
        _ => {
            eprintln!("Unknown option: {}", args[1]);
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse_command("part 1 3").unwrap(),
            Some(ConsoleCommand::Part(1, 3))
        );
        assert_eq!(
            parse_command("  track 0 ").unwrap(),
            Some(ConsoleCommand::Track(0))
        );
        assert_eq!(
            parse_command("edit on").unwrap(),
            Some(ConsoleCommand::EditMode(true))
        );
        assert_eq!(parse_command("").unwrap(), None);
        assert!(parse_command("part 1").is_err());
        assert!(parse_command("segment x").is_err());
        assert!(parse_command("dance").is_err());
    }

    #[test]
    fn test_parse_edit_commands() {
        assert_eq!(
            parse_command("add-track").unwrap(),
            Some(ConsoleCommand::Graph(GraphEdit::AddTrack))
        );
        assert_eq!(
            parse_command("remove-track 2").unwrap(),
            Some(ConsoleCommand::Graph(GraphEdit::RemoveTrack(2)))
        );
        assert_eq!(
            parse_command("add-part 1").unwrap(),
            Some(ConsoleCommand::Graph(GraphEdit::AddPart(1)))
        );
        assert_eq!(
            parse_command("remove-part 1 0").unwrap(),
            Some(ConsoleCommand::Graph(GraphEdit::RemovePart {
                track: 1,
                position: 0
            }))
        );
        assert_eq!(
            parse_command("edit-part 0 1 1 4 7 24 26 0").unwrap(),
            Some(ConsoleCommand::Graph(GraphEdit::EditPart {
                track: 0,
                position: 1,
                edit: PartEdit {
                    part_index: 1,
                    first_segment: 4,
                    last_segment: 7,
                    transition_in_segment: 24,
                    transition_out_segment: 26,
                    next_part_index: 0,
                },
            }))
        );
        assert!(parse_command("edit-part 0 1 1 4 7 24 26").is_err());
        assert!(parse_command("remove-part 1").is_err());
    }

    #[test]
    fn test_parse_save() {
        assert_eq!(parse_command("save").unwrap(), Some(ConsoleCommand::Save(None)));
        assert_eq!(
            parse_command("save out_tracks.txt").unwrap(),
            Some(ConsoleCommand::Save(Some(PathBuf::from("out_tracks.txt"))))
        );
    }

    #[test]
    fn test_open_source_by_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(open_source(dir.path()).is_ok());

        let text = dir.path().join("notes.txt");
        std::fs::write(&text, "not audio").unwrap();
        assert!(open_source(&text).is_err());

        assert!(open_source(&dir.path().join("missing.ogg")).is_err());
        let ogg = dir.path().join("music.ogg");
        std::fs::write(&ogg, b"OggS").unwrap();
        assert!(open_source(&ogg).is_ok());
    }

    #[test]
    fn test_parse_play_options() {
        let flags: Vec<String> = ["--dry-run", "--transitions", "t.txt"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let options = parse_play_options("music", &flags).unwrap();
        assert!(options.dry_run);
        assert_eq!(options.transitions, Some(PathBuf::from("t.txt")));
        assert!(parse_play_options("music", &["--loud".to_string()]).is_err());
    }
}
