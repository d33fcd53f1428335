//! Graph simulation command.
//!
//! Builds the configured graph on the in-memory backend, runs it on the audio
//! worker thread, spreads channels across the mixers, optionally exercises a
//! device change and a mixer disposal, then reports what the graph and the
//! backend ended up with.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use mixgraph_core::{
    AudioThread, Channel, ChannelHandle, MixerGraph, MixerNode, PositionMode, SoftBackend,
};
use serde::Serialize;

use super::common::{load_config, sync};

/// Length of every simulated channel, in seconds of audio.
const CHANNEL_SECONDS: u64 = 30;

#[derive(Args)]
pub struct SimulateArgs {
    /// Graph config file (defaults to the user config file)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Number of channels to spread across the mixers
    #[arg(long, default_value = "8")]
    channels: usize,

    /// Number of ticks to run
    #[arg(long, default_value = "20")]
    ticks: u32,

    /// Switch to this output device halfway through
    #[arg(long, value_name = "DEVICE")]
    device_change: Option<u32>,

    /// Dispose the named mixer halfway through
    #[arg(long, value_name = "NAME")]
    dispose: Option<String>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Report {
    mixers: Vec<MixerReport>,
    channels: Vec<ChannelReport>,
    stats: StatsReport,
}

#[derive(Serialize)]
struct MixerReport {
    name: String,
    stream: u32,
    device: Option<u32>,
    members: usize,
    effects: Vec<EffectReport>,
}

#[derive(Serialize)]
struct EffectReport {
    kind: String,
    priority: u32,
    handle: u32,
}

#[derive(Serialize)]
struct ChannelReport {
    index: usize,
    mixer: Option<String>,
    state: String,
    position_ms: Option<u64>,
}

#[derive(Serialize)]
struct StatsReport {
    mixers: usize,
    channels: usize,
    members: usize,
    effects: usize,
    native_streams: usize,
    native_effects: usize,
    actions_run: u64,
    actions_failed: u64,
}

pub fn run(args: SimulateArgs) -> anyhow::Result<()> {
    let (config, source) = load_config(args.config.as_deref())?;
    tracing::info!(%source, channels = args.channels, ticks = args.ticks, "starting simulation");

    let backend = Arc::new(SoftBackend::with_device(config.device));
    let graph = config
        .build(backend.clone())
        .with_context(|| format!("cannot build graph from {source}"))?;
    let worker = AudioThread::spawn(graph.queue().clone(), config.tick())
        .context("cannot start audio thread")?;

    let mixers = graph.mixers();
    let length = u64::from(config.stream.frequency) * 4 * CHANNEL_SECONDS;
    let channels: Vec<(Channel, ChannelHandle)> = (0..args.channels)
        .map(|i| {
            let channel = graph.create_channel();
            let handle = backend.create_channel(config.stream.frequency, length);
            channel.set_handle(handle);
            mixers[i % mixers.len()].add(&channel);
            (channel, handle)
        })
        .collect();
    sync(graph.queue())?;

    // Every fourth channel starting at 1 is paused, starting at 3 stopped.
    for (i, (channel, _)) in channels.iter().enumerate() {
        let Some(mixer) = channel.mixer() else { continue };
        match i % 4 {
            1 => {
                mixer.pause(channel);
            }
            3 => {
                mixer.stop(channel);
            }
            _ => {}
        }
    }

    let bytes_per_tick = u64::from(config.stream.frequency) * 4 * config.tick_ms / 1000;
    let halfway = args.ticks / 2;
    for tick in 0..args.ticks {
        if tick == halfway {
            midpoint_events(&args, &graph, &backend)?;
        }
        for (_, handle) in &channels {
            backend.advance(*handle, bytes_per_tick);
        }
        std::thread::sleep(config.tick());
    }
    if args.ticks == 0 {
        midpoint_events(&args, &graph, &backend)?;
    }
    sync(graph.queue())?;

    let report = build_report(&graph, &backend, &channels);
    worker.stop();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn midpoint_events(
    args: &SimulateArgs,
    graph: &MixerGraph,
    backend: &SoftBackend,
) -> anyhow::Result<()> {
    if let Some(device) = args.device_change {
        backend.init_device(device);
        graph.on_device_changed(device);
    }
    if let Some(name) = &args.dispose {
        let mixer = graph
            .mixer(name)
            .ok_or_else(|| anyhow::anyhow!("no mixer named '{name}'"))?;
        mixer.dispose();
    }
    sync(graph.queue())
}

fn build_report(
    graph: &MixerGraph,
    backend: &SoftBackend,
    channels: &[(Channel, ChannelHandle)],
) -> Report {
    let mixers = graph
        .mixers()
        .iter()
        .map(|mixer| {
            let stream = mixer.stream_handle();
            MixerReport {
                name: mixer.name().to_owned(),
                stream: stream.raw(),
                device: backend.stream_device(stream),
                members: mixer.count(),
                effects: mixer
                    .effect_snapshot()
                    .into_iter()
                    .map(|e| EffectReport {
                        kind: e.kind.to_string(),
                        priority: e.priority,
                        handle: e.handle.raw(),
                    })
                    .collect(),
            }
        })
        .collect();

    let channels = channels
        .iter()
        .enumerate()
        .map(|(index, (channel, _))| {
            let mixer: Option<Arc<MixerNode>> = channel.mixer();
            ChannelReport {
                index,
                mixer: mixer.as_ref().map(|m| m.name().to_owned()),
                state: mixer
                    .as_ref()
                    .map_or("detached".to_owned(), |m| m.state(channel).to_string()),
                position_ms: mixer
                    .as_ref()
                    .and_then(|m| m.position(channel, PositionMode::MILLIS)),
            }
        })
        .collect();

    let stats = graph.stats();
    Report {
        mixers,
        channels,
        stats: StatsReport {
            mixers: stats.mixers,
            channels: stats.channels,
            members: stats.members,
            effects: stats.effects,
            native_streams: backend.stream_count(),
            native_effects: backend.effect_count(),
            actions_run: graph.queue().executed(),
            actions_failed: graph.queue().failed(),
        },
    }
}

fn print_report(report: &Report) {
    println!("Mixers");
    println!("======");
    for mixer in &report.mixers {
        let device = mixer
            .device
            .map_or_else(|| "-".to_owned(), |d| d.to_string());
        println!(
            "  {:12} stream #{:<3} device {:<3} members {}",
            mixer.name, mixer.stream, device, mixer.members
        );
        for effect in &mixer.effects {
            println!(
                "    [{}] {:12} #{}",
                effect.priority, effect.kind, effect.handle
            );
        }
    }
    println!();
    println!("Channels");
    println!("========");
    for channel in &report.channels {
        let position = channel
            .position_ms
            .map_or_else(|| "-".to_owned(), |ms| format!("{ms} ms"));
        println!(
            "  {:3} {:12} {:9} {}",
            channel.index,
            channel.mixer.as_deref().unwrap_or("-"),
            channel.state,
            position
        );
    }
    println!();
    let s = &report.stats;
    println!(
        "{} mixers, {} channels, {} members, {} effects ({} native streams, {} native effects)",
        s.mixers, s.channels, s.members, s.effects, s.native_streams, s.native_effects
    );
    println!("{} actions run, {} failed", s.actions_run, s.actions_failed);
}
