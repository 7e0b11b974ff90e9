//! Replay captured SENT pulse intervals through the decoder.
//!
//! Usage:
//!   cargo run --bin sent_replay -- capture.txt
//!   cargo run --bin sent_replay -- --json capture.txt
//!   cargo run --bin sent_replay -- --generate demo.txt
//!
//! Capture format: one pulse per line, `ticks` or `ticks,flags`, decimal;
//! `#` starts a comment.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use sent_rs::config::Config;
use sent_rs::emulator::{esm12_plan, ssm_plan, EmulatorConfig, SentEmulator};
use sent_rs::{ChannelStats, FrameSignals, PulseOutcome, SentChannel, SlowMessage};

#[derive(Parser, Debug)]
#[command(
    name = "sent_replay",
    about = "Replay SENT pulse captures through the decoder"
)]
struct Args {
    /// Capture file to replay (or to write with --generate)
    capture: PathBuf,

    /// Path to configuration file
    #[arg(short = 'f', long = "config")]
    config_file: Option<PathBuf>,

    /// Print the final summary as JSON
    #[arg(long)]
    json: bool,

    /// Log every Nth decoded frame (overrides the config file)
    #[arg(long)]
    report_every: Option<u64>,

    /// Write a synthetic demo capture instead of replaying
    #[arg(long)]
    generate: bool,
}

#[derive(serde::Serialize)]
struct ReplaySummary<'a> {
    pulses: u64,
    frames: u64,
    rejected: u64,
    tick_per_unit: f32,
    tick_time_us: f64,
    signals: Option<FrameSignals>,
    slow_channel: Vec<&'a SlowMessage>,
    stats: &'a ChannelStats,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = match &args.config_file {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };

    if args.generate {
        return generate(&args.capture);
    }
    replay(&args, &config)
}

/// Parse one capture line into `(ticks, flags)`; `None` for blanks and
/// comments.
fn parse_line(line: &str) -> anyhow::Result<Option<(u32, u8)>> {
    let line = line.split('#').next().unwrap_or("").trim();
    if line.is_empty() {
        return Ok(None);
    }
    let mut fields = line.split(',').map(str::trim);
    let ticks = fields
        .next()
        .unwrap_or("")
        .parse::<u32>()
        .with_context(|| format!("bad tick count in {line:?}"))?;
    let flags = match fields.next() {
        Some(field) => field
            .parse::<u8>()
            .with_context(|| format!("bad flags in {line:?}"))?,
        None => 0,
    };
    if fields.next().is_some() {
        bail!("too many fields in {line:?}");
    }
    Ok(Some((ticks, flags)))
}

fn replay(args: &Args, config: &Config) -> anyhow::Result<()> {
    let file = File::open(&args.capture)
        .with_context(|| format!("opening capture {}", args.capture.display()))?;
    let report_every = args.report_every.unwrap_or(config.replay.report_every);

    let mut chan = SentChannel::new();
    let mut pulses = 0u64;
    let mut frames = 0u64;
    let mut rejected = 0u64;

    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let Some((ticks, flags)) = parse_line(&line)
            .with_context(|| format!("{}:{}", args.capture.display(), lineno + 1))?
        else {
            continue;
        };

        pulses += 1;
        match chan.decode(ticks, flags) {
            PulseOutcome::FrameComplete => {
                frames += 1;
                if report_every != 0 && frames % report_every == 0 {
                    // Signals are guaranteed present right after a complete frame.
                    if let Ok(signals) = chan.signals() {
                        info!(frame = frames, %signals, "decoded");
                    }
                }
            }
            PulseOutcome::Rejected => {
                rejected += 1;
                debug!(pulse = pulses, "pulse rejected");
            }
            PulseOutcome::Assembling => {}
        }
    }

    let summary = ReplaySummary {
        pulses,
        frames,
        rejected,
        tick_per_unit: chan.tick_time(),
        tick_time_us: config.capture.ticks_to_us(f64::from(chan.tick_time())),
        signals: chan.signals().ok(),
        slow_channel: chan.slow_messages().collect(),
        stats: chan.stats(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("pulses:   {}", summary.pulses);
    println!("frames:   {}", summary.frames);
    println!("rejected: {}", summary.rejected);
    println!(
        "unit tick: {} clocks ({:.3} us)",
        summary.tick_per_unit, summary.tick_time_us
    );
    match summary.signals {
        Some(signals) => println!("last frame: {signals}"),
        None => println!("last frame: none"),
    }
    for msg in &summary.slow_channel {
        println!("slow[0x{:02x}] = 0x{:04x}", msg.id, msg.data);
    }
    let stats = summary.stats;
    println!(
        "errors: short={} long={} sync={} crc={} (total {}, rate {:.4})",
        stats.short_interval_err,
        stats.long_interval_err,
        stats.sync_err,
        stats.crc_err_cnt,
        stats.total_error(),
        stats.error_rate()
    );
    println!(
        "slow channel: sc12={} sc16={} crc_err={}",
        stats.sc12, stats.sc16, stats.sc_crc_err
    );
    println!(
        "pauses={} restarts={} hw_overflow={}",
        stats.pause_cnt, stats.restart_cnt, stats.hw_overflow_cnt
    );
    Ok(())
}

/// Write a demo capture: calibration traffic, steady frames, one short and
/// one enhanced slow-channel message, and a pause pulse.
fn generate(path: &Path) -> anyhow::Result<()> {
    let file =
        File::create(path).with_context(|| format!("creating capture {}", path.display()))?;
    let mut out = BufWriter::new(file);
    let mut emu = SentEmulator::new(EmulatorConfig::default());

    writeln!(out, "# synthetic SENT capture, unit tick = 3 clocks")?;

    writeln!(out, "# calibration frame")?;
    for pulse in emu.frame(0x0, 0x000, 0x000) {
        writeln!(out, "{pulse}")?;
    }

    writeln!(out, "# short serial message, id 0x5 = 0x9a")?;
    for pulse in emu.slow_series(&ssm_plan(0x5, 0x9A)) {
        writeln!(out, "{pulse}")?;
    }

    writeln!(out, "# pause pulse")?;
    writeln!(out, "{}", emu.pause_pulse())?;

    writeln!(out, "# enhanced serial message, id 0x23 = 0x678")?;
    for pulse in emu.slow_series(&esm12_plan(0x23, 0x678)) {
        writeln!(out, "{pulse}")?;
    }

    writeln!(out, "# steady frames")?;
    for i in 0..8u16 {
        for pulse in emu.frame(0x1, 0x100 + i, 0x200 + i) {
            writeln!(out, "{pulse}")?;
        }
    }

    out.flush()?;
    info!(path = %path.display(), "demo capture written");
    Ok(())
}
