//! # Rotor Binary
//!
//! Runs the rotator control engine standalone, logging position and status
//! once per second until interrupted.
//!
//! # Usage
//!
//! ```bash
//! # Stock wiring, hardware autodetected
//! rotor
//!
//! # Full simulation, seek once calibrated
//! rotor --simulator 3 --goto 120,45
//!
//! # Bench rig with a throwaway calibration record
//! rotor --transport bench --calibration-file /tmp/cal.txt -v
//! ```

#![deny(warnings)]

use clap::Parser;
use rotor_common::config::{ConfigLoader, LogLevel, RotatorConfig};
use rotor_common::error::RotatorError;
use rotor_engine::Engine;
use rotor_hal::TransportRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Report interval while running.
const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Yaesu G-5500 az/el rotator control engine
#[derive(Parser, Debug)]
#[command(name = "rotor")]
#[command(version)]
#[command(about = "Az/el rotator control engine with calibration and stall detection")]
#[command(long_about = None)]
struct Args {
    /// Path to rotor.toml. Defaults apply when omitted.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Simulation level: 0 off, 1 azimuth only, 2 elevation 0..90, 3 elevation 0..180
    #[arg(short = 's', long, value_name = "LEVEL")]
    simulator: Option<u8>,

    /// Transport name (linux, bench, none)
    #[arg(short, long)]
    transport: Option<String>,

    /// Calibration record path
    #[arg(long, value_name = "FILE")]
    calibration_file: Option<PathBuf>,

    /// Seek to AZ,EL degrees once the engine is ready
    #[arg(long, value_name = "AZ,EL", value_parser = parse_position, conflicts_with = "park")]
    goto: Option<(f64, f64)>,

    /// Seek the park position once the engine is ready
    #[arg(long)]
    park: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn parse_position(s: &str) -> Result<(f64, f64), String> {
    let (az, el) = s
        .split_once(',')
        .ok_or_else(|| format!("expected AZ,EL, got '{s}'"))?;
    let az = az.trim().parse::<f64>().map_err(|e| format!("azimuth: {e}"))?;
    let el = el.trim().parse::<f64>().map_err(|e| format!("elevation: {e}"))?;
    Ok((az, el))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        eprintln!("rotor: {e}");
        error!("Rotor startup failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args)?;

    setup_tracing(&args, &config);
    info!("Rotor v{} starting...", env!("CARGO_PKG_VERSION"));

    let registry = TransportRegistry::with_builtin();
    info!(
        transport = %config.hardware.transport,
        available = ?registry.list(),
        "Selecting transport"
    );
    let engine = Engine::initialize(&config, &registry)?;
    info!("{}", engine.get_info());

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        flag.store(false, Ordering::SeqCst);
    })?;

    let mut pending = if args.park {
        Some(Request::Park)
    } else {
        args.goto.map(|(az, el)| Request::Goto(az, el))
    };

    while running.load(Ordering::SeqCst) {
        if let Some(request) = pending {
            pending = match request.submit(&engine) {
                Ok(()) => None,
                Err(e) if e.is_transient() => Some(request),
                Err(e) if e.is_sticky() => {
                    warn!(error = %e, "Request deferred by fault, retrying");
                    Some(request)
                }
                Err(e) => {
                    error!(error = %e, "Request rejected");
                    None
                }
            };
        }
        report(&engine);
        std::thread::sleep(REPORT_INTERVAL);
    }

    engine.stop();
    if let Some(stats) = engine.shutdown() {
        info!(
            cycles = stats.cycle_count,
            overruns = stats.overruns,
            avg_us = stats.avg_cycle_us(),
            max_us = stats.max_cycle_us,
            "Control loop stats"
        );
    }
    info!("Rotor shutdown complete");
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum Request {
    Goto(f64, f64),
    Park,
}

impl Request {
    fn submit(self, engine: &Engine) -> Result<(), RotatorError> {
        match self {
            Self::Goto(az, el) => engine.set_position(az, el),
            Self::Park => engine.park(),
        }
    }
}

fn report(engine: &Engine) {
    let state = engine.control_state();
    let status = engine.status();
    match engine.get_position() {
        Ok((az, el)) => info!(az, el, ?state, ?status, "Position"),
        Err(e) => info!(reason = %e, ?state, ?status, "Position unavailable"),
    }
}

/// Load the config file, if any, then apply command line overrides.
fn load_config(args: &Args) -> Result<RotatorConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => RotatorConfig::load(path)?,
        None => RotatorConfig::default(),
    };
    if let Some(level) = args.simulator {
        config.engine.simulator = Some(level);
    }
    if let Some(transport) = &args.transport {
        config.hardware.transport = transport.clone();
    }
    if let Some(path) = &args.calibration_file {
        config.engine.calibration_file = path.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Setup tracing subscriber from CLI arguments and the configured level.
fn setup_tracing(args: &Args, config: &RotatorConfig) {
    let directive = if args.verbose {
        LogLevel::Debug.as_directive()
    } else {
        config.shared.log_level.as_directive()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
