use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use entstream_common::EntitySnapshot;
use entstream_core::{
    InboundMessage, Notification, StreamConfig, StreamWorker, Streamer, decode_inbound,
    encode_notification,
};
use glam::Vec3;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "entstream-cli", about = "CLI tool for entity streaming")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Stream config file (YAML or JSON); defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate versions and the effective config
    Info,
    /// Feed JSON-lines inbound messages through a worker and print notifications
    Replay {
        /// Input file, or `-` for stdin
        #[arg(default_value = "-")]
        input: String,
    },
    /// Walk an observer past a single entity and print what happens
    Demo,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Info => {
            println!("entstream-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("core: {}", entstream_core::crate_info());
            println!("cells per axis: {}", config.cells_per_axis());
            print!("{}", serde_yaml::to_string(&config)?);
        }
        Commands::Replay { input } => {
            let reader: Box<dyn BufRead> = if input == "-" {
                Box::new(io::stdin().lock())
            } else {
                let file = File::open(&input).with_context(|| format!("opening {input}"))?;
                Box::new(BufReader::new(file))
            };
            replay(config, reader, io::stdout().lock())?;
        }
        Commands::Demo => demo(config)?,
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<StreamConfig> {
    let Some(path) = path else {
        return Ok(StreamConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config =
        parse_config(&text).with_context(|| format!("parsing config {}", path.display()))?;
    tracing::info!(path = %path.display(), "loaded stream config");
    Ok(config)
}

/// YAML (and therefore JSON) config text, validated.
fn parse_config(text: &str) -> anyhow::Result<StreamConfig> {
    let config: StreamConfig = serde_yaml::from_str(text)?;
    config.validate()?;
    Ok(config)
}

fn replay(config: StreamConfig, reader: impl BufRead, mut sink: impl Write) -> anyhow::Result<()> {
    let worker = StreamWorker::spawn(config)?;
    let notifications = worker.notifications().clone();
    let mut sent = 0usize;

    for (line_no, raw) in reader.split(b'\n').enumerate() {
        let line = match String::from_utf8(raw?) {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!(line = line_no + 1, %err, "skipping line that is not valid UTF-8");
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match decode_inbound(&line) {
            Ok(msg) => {
                worker.send(msg)?;
                sent += 1;
            }
            Err(err) => tracing::warn!(line = line_no + 1, %err, "skipping undecodable message"),
        }
        for notification in notifications.try_iter() {
            writeln!(sink, "{}", encode_notification(&notification)?)?;
        }
    }

    let stats = worker.shutdown()?;
    for notification in notifications.try_iter() {
        writeln!(sink, "{}", encode_notification(&notification)?)?;
    }
    sink.flush()?;
    tracing::info!(
        sent,
        handled = stats.messages_handled,
        tracked = stats.tracked,
        indexed = stats.indexed,
        "replay complete"
    );
    Ok(())
}

fn demo(config: StreamConfig) -> anyhow::Result<()> {
    let mut streamer = Streamer::new(config)?;
    let entity = EntitySnapshot::new(1, Vec3::ZERO, 50.0);

    let steps = [
        ("observer at (-20, 0, 0)", InboundMessage::at(Vec3::new(-20.0, 0.0, 0.0))),
        ("add entity #1, range 50", InboundMessage::add(entity)),
        ("observer at (1000, 0, 0)", InboundMessage::at(Vec3::new(1_000.0, 0.0, 0.0))),
        ("observer at (10, 0, 0)", InboundMessage::at(Vec3::new(10.0, 0.0, 0.0))),
        ("remove entity #1", InboundMessage::remove(&entity)),
        ("observer at (0, 0, 0)", InboundMessage::at(Vec3::ZERO)),
    ];

    for (label, msg) in steps {
        let out = streamer.handle(msg);
        println!("{label}: {}", describe(&out));
    }
    println!(
        "final: tracked={}, indexed={}",
        streamer.stats().tracked,
        streamer.stats().indexed
    );
    Ok(())
}

fn describe(notifications: &[Notification]) -> String {
    if notifications.is_empty() {
        return "no change".to_string();
    }
    notifications
        .iter()
        .map(|n| match n {
            Notification::StreamIn(e) => format!("stream in {}", e.id),
            Notification::StreamOut(e) => format!("stream out {}", e.id),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
