//! gesture_eq: interactive entry point and offline renderer.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use gesture_eq::app::{render_offline, run};
use gesture_eq::config::AppConfig;
use tracing::error;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer};

#[derive(Parser, Debug)]
#[command(name = "gesture_eq", version, about = "Gesture-controlled three-band equalizer")]
struct Args {
    /// WAV file to play.
    input: PathBuf,

    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Render to this WAV file with the configured settings instead of
    /// playing.
    #[arg(long, value_name = "OUT.wav")]
    render: Option<PathBuf>,

    /// Samples per engine block.
    #[arg(long)]
    block_size: Option<usize>,

    /// Default log level; `RUST_LOG` takes precedence.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Skip the banner.
    #[arg(long)]
    quick: bool,
}

fn main() {
    let args = Args::parse();
    if let Err(e) = init_logging(&args.log_level) {
        eprintln!("Error: {:#}", e);
        std::process::exit(2);
    }
    if let Err(e) = real_main(args) {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn real_main(args: Args) -> Result<()> {
    let mut cfg = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None       => AppConfig::default(),
    };
    if let Some(n) = args.block_size {
        cfg.audio.block_size = n;
    }
    cfg.validate()?;

    if let Some(out) = &args.render {
        let summary = render_offline(&cfg, &args.input, out)?;
        println!("  Rendered {} samples to {}", summary.samples, out.display());
        return Ok(());
    }

    if !args.quick {
        banner();
    }
    run(cfg, &args.input)
}

fn banner() {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║          Gesture EQ — two-hand three-band equalizer          ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    println!("  Hands: keyboard simulation (see the legend in the window)");
    println!("  Calibrate first: 5 + close pinch, 4 + open pinch, 1 to finish");
    println!();
    println!("  Opening status window…");
    println!();
}

fn init_logging(level: &str) -> Result<()> {
    let default: LevelFilter = level
        .parse()
        .with_context(|| format!("invalid log level {:?}", level))?;
    let filter = EnvFilter::builder()
        .with_default_directive(default.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(filter),
        )
        .init();
    Ok(())
}
