use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::FutureExt;
use serde::Deserialize;
use serde_json::Value;

use crate::connection::{ConnectionId, RendererLink};
use crate::definition::SceneDefinition;
use crate::protocol::{Command, Message};
use crate::scene::SceneController;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the snapshot a freshly connected renderer would receive
    Snapshot {
        /// Scene definition JSON file
        #[arg(long)]
        scene: PathBuf,

        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },
    /// Replay a renderer event log against a scene definition
    Replay {
        /// Scene definition JSON file
        #[arg(long)]
        scene: PathBuf,

        /// Event log, one `{"connection": n, "event": ..., "args": ...}` object per line
        #[arg(long)]
        events: PathBuf,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Snapshot { scene, pretty } => print_snapshot(&scene, pretty),
        Commands::Replay { scene, events } => replay(&scene, &events),
    }
}

fn print_snapshot(path: &Path, pretty: bool) -> Result<()> {
    let scene = SceneDefinition::from_file(path)?.build()?;
    let message = Message::Command(Command::Snapshot(Box::new(scene.snapshot())));
    let json = if pretty {
        serde_json::to_string_pretty(&message)?
    } else {
        serde_json::to_string(&message)?
    };
    println!("{}", json);
    Ok(())
}

/// Prints every outbound message, tagged with the connection number used in
/// the event log.
struct PrintLink {
    label: u64,
}

impl RendererLink for PrintLink {
    fn send(&mut self, message: &Message) -> Result<()> {
        println!("-> [{}] {}", self.label, serde_json::to_string(message)?);
        Ok(())
    }
}

#[derive(Deserialize)]
struct LoggedEvent {
    connection: u64,
    event: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Default)]
struct ReplaySummary {
    events: usize,
    rejected: usize,
    handler_failures: usize,
}

fn replay(scene_path: &Path, events_path: &Path) -> Result<()> {
    let mut scene = SceneDefinition::from_file(scene_path)?.build()?;
    register_printing_handlers(&mut scene);
    let ready = scene.initialized();

    let log = std::fs::read_to_string(events_path)
        .with_context(|| format!("Failed to read event log {:?}", events_path))?;

    let mut connections: HashMap<u64, ConnectionId> = HashMap::new();
    let mut summary = ReplaySummary::default();

    for (index, line) in log.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let entry: LoggedEvent = serde_json::from_str(line)
            .with_context(|| format!("{:?} line {}: not an event record", events_path, index + 1))?;
        summary.events += 1;

        match entry.event.as_str() {
            "connect" => {
                if connections.contains_key(&entry.connection) {
                    bail!("line {}: connection {} is already open", index + 1, entry.connection);
                }
                let id = scene.connect(PrintLink {
                    label: entry.connection,
                });
                connections.insert(entry.connection, id);
            }
            "disconnect" => {
                let id = connections
                    .remove(&entry.connection)
                    .with_context(|| format!("line {}: connection {} is not open", index + 1, entry.connection))?;
                scene.disconnect(id)?;
            }
            name => {
                let id = *connections
                    .get(&entry.connection)
                    .with_context(|| format!("line {}: connection {} is not open", index + 1, entry.connection))?;
                match scene.handle_event(id, name, &entry.args) {
                    Ok(report) => summary.handler_failures += report.failures.len(),
                    Err(e) => {
                        log::warn!("line {}: {}", index + 1, e);
                        summary.rejected += 1;
                    }
                }
            }
        }
    }

    let initialized = matches!(ready.now_or_never(), Some(Ok(())));
    println!();
    println!("Replayed {} events ({} rejected, {} handler failures)", summary.events, summary.rejected, summary.handler_failures);
    println!(
        "Objects: {}, open connections: {}, initialized: {}",
        scene.object_count(),
        scene.connection_count(),
        if initialized { "yes" } else { "no" }
    );
    Ok(())
}

fn register_printing_handlers(scene: &mut SceneController) {
    scene
        .on_click(|e| {
            match e.hits.first() {
                Some(hit) => {
                    let p = hit.point();
                    println!(
                        "   {} {} on {} at ({}, {}, {}) ({} hits)",
                        e.connection,
                        e.click_type.as_str(),
                        hit.object_id,
                        p.x,
                        p.y,
                        p.z,
                        e.hits.len()
                    );
                }
                None => println!("   {} {} on nothing", e.connection, e.click_type.as_str()),
            }
            Ok(())
        })
        .on_drag_end(|e| {
            let p = e.position;
            println!("   {} dragged {} to ({}, {}, {})", e.connection, e.object_id, p.x, p.y, p.z);
            Ok(())
        })
        .on_transform_end(|e| {
            let p = e.position;
            println!("   {} transformed {} to ({}, {}, {})", e.connection, e.object_id, p.x, p.y, p.z);
            Ok(())
        });
}
