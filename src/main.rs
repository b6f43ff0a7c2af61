use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use rotation_coach::calibrate::Calibration;
use rotation_coach::clock::SystemClock;
use rotation_coach::config::CoachConfig;
use rotation_coach::controller::Controller;
use rotation_coach::decode::Decoder;
use rotation_coach::frame::FrameFile;
use rotation_coach::registry::Registry;
use rotation_coach::replay::{run_replay, write_report, ReplayConfig};
use rotation_coach::sink::AdvisorySink;
use std::fs;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "rotation-coach")]
#[command(about = "Pixel-telemetry rotation coach: one recommended action per keypress")]
struct Cli {
    /// Log the chosen slot for every pulse
    #[arg(long, global = true, default_value_t = false)]
    debug: bool,
    /// Directory holding specs/, matchups/ and config/ (default: $COACH_DATA_DIR or ./data)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load every data file and print a per-spec summary
    CheckData,
    /// Decode a raw BGRA strip dump into a JSON snapshot
    Decode {
        #[arg(long)]
        strip: PathBuf,
        #[arg(long, default_value_t = 1)]
        stride: u32,
    },
    /// Run recorded scenarios through the decision engine
    Replay {
        #[arg(long, default_value = "scenarios")]
        scenarios: PathBuf,
        #[arg(long)]
        jobs: Option<usize>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Coach loop over a frame dump; each stdin line is one keypad input
    Run {
        #[arg(long)]
        frame_file: PathBuf,
        #[arg(long, default_value_t = 1920)]
        logical_width: u32,
        #[arg(long, default_value_t = 1080)]
        logical_height: u32,
    },
}

fn main() -> Result<()> {
    let Cli {
        debug,
        data_dir,
        command,
    } = Cli::parse();

    let mut config = CoachConfig::from_env();
    config.debug |= debug;
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }

    let level = if config.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(io::stderr)
        .init();

    match command {
        Commands::CheckData => {
            let registry = Registry::load(&config.data_dir)?;
            println!("data_dir={}", config.data_dir.display());
            println!("lethal_spells={}", registry.lethal_spells().len());
            println!("stop_attack_ids={}", registry.stop_attack_ids().len());
            println!("hazard_auras={}", registry.hazard_auras().len());
            for summary in registry.summaries() {
                println!(
                    "  {:>5} {:24} slots={} procs={} auras={} matchups={} loadouts={}",
                    summary.spec_id,
                    summary.name,
                    summary.slots,
                    summary.procs,
                    summary.tracked_auras,
                    summary.matchup_rules,
                    summary.talent_loadouts,
                );
            }
        }
        Commands::Decode { strip, stride } => {
            if stride == 0 {
                return Err(anyhow!("--stride must be >= 1"));
            }
            let bytes =
                fs::read(&strip).with_context(|| format!("failed reading {}", strip.display()))?;
            let registry = Registry::load(&config.data_dir).unwrap_or_else(|err| {
                tracing::warn!("{err:#}; decoding without spec data");
                Registry::empty()
            });
            let decoder = Decoder::from_registry(&registry);
            let snapshot = decoder.decode(&bytes, &Calibration { y: 0, stride }, None, 0.0);
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Commands::Replay {
            scenarios,
            jobs,
            output,
        } => {
            let registry = Arc::new(Registry::load(&config.data_dir)?);
            let report = run_replay(
                registry,
                &ReplayConfig {
                    scenarios_dir: scenarios,
                    jobs,
                },
            )?;
            println!("scenarios={}", report.total);
            println!("passed={}", report.passed);
            println!("failed={}", report.failed);
            for result in report.results.iter().filter(|result| !result.passed) {
                println!("  FAIL {}: {}", result.name, result.mismatches.join("; "));
            }
            if let Some(path) = output {
                write_report(&path, &report)?;
                println!("output={}", path.display());
            }
            if report.failed > 0 {
                return Err(anyhow!("{} scenario(s) failed", report.failed));
            }
        }
        Commands::Run {
            frame_file,
            logical_width,
            logical_height,
        } => {
            let frames = Arc::new(FrameFile::open(&frame_file, logical_width, logical_height)?);
            let mut controller = Controller::start(
                &config,
                frames,
                Box::new(AdvisorySink::stdout()),
                Arc::new(SystemClock),
            )?;
            let stdin = io::stdin();
            let events = stdin
                .lock()
                .lines()
                .map_while(|line| line.ok())
                .map(|line| config.event_for(&line));
            let summary = controller.run(events);
            controller.shutdown();
            eprintln!("{}", serde_json::to_string(&summary)?);
        }
    }

    Ok(())
}
