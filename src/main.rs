use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{unbounded, RecvTimeoutError};
use log::{info, warn};
use std::path::PathBuf;
use std::time::Duration;

use signal_sim::backend::{select_backend, BackendKind};
use signal_sim::config::AppConfig;
use signal_sim::runtime::ChannelSubscriber;
use signal_sim::simulation::{Scenario, SimulationConfig, TrafficLightStatus, TrafficSnapshot};

#[derive(Parser)]
#[command(name = "signal_sim")]
#[command(about = "Adaptive traffic signal simulation for a single intersection")]
struct Cli {
    /// Scenario preset (balanced, heavy-ns, rush-hour); replaces the
    /// [simulation] section of the config file
    #[arg(long)]
    scenario: Option<Scenario>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Simulated duration in seconds
    #[arg(long)]
    duration: Option<u32>,

    /// Length of one tick in milliseconds
    #[arg(long)]
    step_ms: Option<u64>,

    /// Run as fast as possible instead of in real time
    #[arg(long)]
    fast: bool,

    /// Seed for the arrival and service draws
    #[arg(long)]
    seed: Option<u64>,

    /// Print snapshots as JSON lines
    #[arg(long)]
    json: bool,

    /// Where the simulation runs (local, remote)
    #[arg(long)]
    backend: Option<BackendKind>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;
    run(config, cli.json)
}

/// Defaults, then the config file, then command line flags
fn build_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    if let Some(scenario) = cli.scenario {
        let seed = config.simulation.seed;
        config.simulation = SimulationConfig::from_scenario(scenario);
        config.simulation.seed = seed;
    }
    if let Some(seed) = cli.seed {
        config.simulation.seed = Some(seed);
    }
    if let Some(duration) = cli.duration {
        config.run.duration_seconds = duration;
    }
    if let Some(step_ms) = cli.step_ms {
        config.run.time_step_millis = step_ms;
    }
    if cli.fast {
        config.run.real_time = false;
    }
    if let Some(kind) = cli.backend {
        config.backend.kind = kind;
    }

    config.validate()?;
    Ok(config)
}

fn run(config: AppConfig, json: bool) -> Result<()> {
    let AppConfig {
        simulation,
        run,
        backend,
    } = config;
    let yellow_time = simulation.yellow_time;

    let mut backend = select_backend(&backend, None);
    info!("Running traffic signal simulation on the {} backend...", backend.name());
    info!(
        "Scenario: {}, duration: {}s, step: {}ms, {}",
        simulation.name,
        run.duration_seconds,
        run.time_step_millis,
        if run.real_time { "real time" } else { "fast" }
    );

    let id = backend
        .create_simulation(simulation)
        .context("failed to create simulation")?;
    // Unbounded: every snapshot is printed, none may be dropped.
    let (sender, receiver) = unbounded();
    backend.subscribe(id, Box::new(ChannelSubscriber::new(sender)))?;
    backend.start(id, run)?;

    let print = |snapshot: TrafficSnapshot| -> Result<()> {
        if json {
            println!("{}", serde_json::to_string(&snapshot)?);
        } else {
            let light = TrafficLightStatus::from_snapshot(id, &snapshot, yellow_time);
            println!(
                "{} | NS {:?} EW {:?}",
                snapshot.summary(),
                light.north_south.color,
                light.east_west.color
            );
        }
        Ok(())
    };

    loop {
        match receiver.recv_timeout(Duration::from_millis(250)) {
            Ok(snapshot) => print(snapshot)?,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if !backend.status(id)?.status.is_active() {
            break;
        }
    }
    while let Ok(snapshot) = receiver.try_recv() {
        print(snapshot)?;
    }

    let status = backend.status(id)?;
    if let Some(message) = &status.message {
        info!("{}", message);
    }
    let metrics = backend.metrics(id)?;
    if metrics.total_time_steps == 0 {
        warn!("Simulation produced no ticks");
    }

    info!("=== SIMULATION COMPLETE ===");
    info!("Status: {:?}", status.status);
    metrics.print_summary();

    backend.delete_simulation(id)?;
    Ok(())
}
