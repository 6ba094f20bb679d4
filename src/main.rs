//! sirq-sim entry point: CLI wiring for single runs, comparisons, campaigns
//! and bundle inspection.

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sirq_sim::batch::{BatchOptions, Campaign, export_results_csv, run_campaign};
use sirq_sim::config::ScenarioConfig;
use sirq_sim::io::{Bundle, export_departures_csv, export_timeline_csv};
use sirq_sim::reporting::{print_campaign, print_comparison, print_kpi_report};
use sirq_sim::sim::kpi::RunKpis;
use sirq_sim::sim::types::AgentView;
use sirq_sim::{PolicyKind, SimError, Station};

#[derive(Parser)]
#[command(name = "sirq-sim")]
#[command(about = "Truck charging station simulator: FIFO vs SIRQ admission")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate one day and print its KPI report
    Run {
        #[command(flatten)]
        scenario: ScenarioArgs,

        /// Admission policy (FIFO or SIRQ)
        #[arg(long)]
        policy: Option<PolicyKind>,

        /// Write the departure table to CSV
        #[arg(long, value_name = "PATH")]
        agents_out: Option<PathBuf>,

        /// Write the tick timeline to CSV
        #[arg(long, value_name = "PATH")]
        timeline_out: Option<PathBuf>,

        /// Write config and both tables as a zip bundle
        #[arg(long, value_name = "PATH")]
        bundle_out: Option<PathBuf>,

        /// Print live agents as JSON lines every N ticks
        #[arg(long, value_name = "N")]
        watch: Option<usize>,
    },
    /// Run the same scenario and seed under FIFO and SIRQ
    Compare {
        #[command(flatten)]
        scenario: ScenarioArgs,
    },
    /// Monte Carlo campaign over traffic levels and both policies
    Batch {
        #[command(flatten)]
        scenario: ScenarioArgs,

        /// Runs per (traffic, policy) cell
        #[arg(long, default_value_t = 30)]
        runs: usize,

        /// Comma-separated traffic multipliers
        #[arg(long, value_delimiter = ',', default_values_t = [1.0, 1.2, 1.5])]
        traffic: Vec<f64>,

        /// Worker threads (defaults to all cores)
        #[arg(long)]
        threads: Option<usize>,

        /// Write one CSV row per run
        #[arg(long, value_name = "PATH")]
        out: Option<PathBuf>,
    },
    /// Import a bundle and print its KPIs
    Inspect {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
}

#[derive(Args)]
struct ScenarioArgs {
    /// Load scenario from TOML config file
    #[arg(long, value_name = "PATH", conflicts_with = "preset")]
    scenario: Option<PathBuf>,

    /// Built-in preset (baseline, rush_hour, flat_pricing, vip_heavy)
    #[arg(long)]
    preset: Option<String>,

    /// Override random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override charger count
    #[arg(long)]
    capacity: Option<usize>,
}

impl ScenarioArgs {
    /// --scenario takes priority, then --preset, then the baseline.
    fn load(&self) -> Result<ScenarioConfig, SimError> {
        let mut scenario = if let Some(ref path) = self.scenario {
            ScenarioConfig::from_toml_file(path)?
        } else if let Some(ref name) = self.preset {
            ScenarioConfig::from_preset(name)?
        } else {
            ScenarioConfig::baseline()
        };
        if let Some(seed) = self.seed {
            scenario.run.seed = seed;
        }
        if let Some(capacity) = self.capacity {
            scenario.run.capacity = capacity;
        }
        Ok(scenario)
    }
}

/// One `--watch` line.
#[derive(Serialize)]
struct WatchFrame {
    tick: usize,
    clearing_price: f64,
    agents: Vec<AgentView>,
}

/// Prints every validation error and exits if there are any.
fn exit_if_invalid(scenario: &ScenarioConfig) {
    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }
}

fn run(
    mut scenario: ScenarioConfig,
    policy: Option<PolicyKind>,
    agents_out: Option<PathBuf>,
    timeline_out: Option<PathBuf>,
    bundle_out: Option<PathBuf>,
    watch: Option<usize>,
) -> Result<(), SimError> {
    if let Some(policy) = policy {
        scenario.run.policy = policy.as_str().to_string();
    }
    exit_if_invalid(&scenario);

    let mut station = Station::from_scenario(&scenario)?;
    let watch = watch.filter(|n| *n > 0);
    while !station.is_finished() {
        station.step()?;
        if let Some(every) = watch {
            if station.ticks_elapsed() % every == 0 {
                let frame = WatchFrame {
                    tick: station.ticks_elapsed() - 1,
                    clearing_price: station.clearing_price(),
                    agents: station.live_agents(),
                };
                println!("{}", serde_json::to_string(&frame)?);
            }
        }
    }

    print_kpi_report(&RunKpis::from_station(&station));

    if let Some(ref path) = agents_out {
        export_departures_csv(station.departures(), path)?;
        eprintln!("Departures written to {}", path.display());
    }
    if let Some(ref path) = timeline_out {
        export_timeline_csv(station.timeline(), path)?;
        eprintln!("Timeline written to {}", path.display());
    }
    if let Some(ref path) = bundle_out {
        let (departures, timeline) = station.into_tables();
        let bundle = Bundle {
            scenario,
            departures,
            timeline,
        };
        bundle.save(path)?;
        eprintln!("Bundle written to {}", path.display());
    }
    Ok(())
}

fn compare(scenario: ScenarioConfig) -> Result<(), SimError> {
    exit_if_invalid(&scenario);
    let mut kpis = Vec::with_capacity(2);
    for policy in PolicyKind::ALL {
        let mut scenario = scenario.clone();
        scenario.run.policy = policy.as_str().to_string();
        let mut station = Station::from_scenario(&scenario)?;
        station.run()?;
        info!(%policy, revenue = station.revenue(), "run finished");
        kpis.push(RunKpis::from_station(&station));
    }
    print_comparison(&kpis[0], &kpis[1]);
    Ok(())
}

fn batch(
    scenario: ScenarioConfig,
    runs: usize,
    traffic: Vec<f64>,
    threads: Option<usize>,
    out: Option<PathBuf>,
) -> Result<(), SimError> {
    exit_if_invalid(&scenario);
    let campaign = Campaign {
        traffic_levels: traffic,
        runs_per_cell: runs,
        ..Campaign::new(scenario)
    };
    let options = BatchOptions {
        threads,
        ..BatchOptions::default()
    };
    let report = run_campaign(&campaign, &options)?;
    print_campaign(&report, &report.summary());

    if let Some(ref path) = out {
        export_results_csv(&report.results, path)?;
        eprintln!("Run results written to {}", path.display());
    }
    Ok(())
}

fn inspect(path: PathBuf) -> Result<(), SimError> {
    let bundle = Bundle::open(&path)?;
    println!(
        "{}: {} departures, {} ticks, capacity {}, policy {}, seed {}",
        path.display(),
        bundle.departures.len(),
        bundle.timeline.len(),
        bundle.scenario.run.capacity,
        bundle.scenario.run.policy,
        bundle.scenario.run.seed
    );
    print_kpi_report(&bundle.kpis());
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            scenario,
            policy,
            agents_out,
            timeline_out,
            bundle_out,
            watch,
        } => scenario
            .load()
            .and_then(|s| run(s, policy, agents_out, timeline_out, bundle_out, watch)),
        Commands::Compare { scenario } => scenario.load().and_then(compare),
        Commands::Batch {
            scenario,
            runs,
            traffic,
            threads,
            out,
        } => scenario
            .load()
            .and_then(|s| batch(s, runs, traffic, threads, out)),
        Commands::Inspect { path } => inspect(path),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
