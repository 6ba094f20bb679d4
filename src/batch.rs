//! Monte Carlo campaigns: many independent runs executed in parallel.
//!
//! A campaign expands into one `RunSpec` per (traffic level, run index,
//! policy). Every run gets its own `Station` and RNG, so workers share no
//! mutable state; results are collected only after each run finishes.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::{Rng, SeedableRng, rngs::StdRng};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ScenarioConfig;
use crate::error::{ConfigError, SimError};
use crate::sim::kpi::RunKpis;
use crate::sim::station::Station;
use crate::sim::types::PolicyKind;

/// Seeds are drawn from this range, matching the six-digit seeds of the dashboard.
const SEED_RANGE: std::ops::Range<u64> = 100_000..1_000_000;

/// z-score of a two-sided 95% interval.
const Z_95: f64 = 1.96;

/// A grid of runs over traffic levels and policies.
#[derive(Debug, Clone)]
pub struct Campaign {
    pub base: ScenarioConfig,
    pub traffic_levels: Vec<f64>,
    pub policies: Vec<PolicyKind>,
    pub runs_per_cell: usize,
    pub master_seed: u64,
}

impl Campaign {
    /// Both policies at the base traffic level, 30 runs each.
    pub fn new(base: ScenarioConfig) -> Self {
        Self {
            traffic_levels: vec![base.station.traffic_multiplier],
            policies: PolicyKind::ALL.to_vec(),
            runs_per_cell: 30,
            master_seed: base.run.seed,
            base,
        }
    }

    /// Checks the grid and the base scenario.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runs_per_cell < 1 {
            return Err(ConfigError::new("batch.runs", "must be >= 1"));
        }
        if self.policies.is_empty() {
            return Err(ConfigError::new("batch.policies", "must not be empty"));
        }
        if self.traffic_levels.is_empty() {
            return Err(ConfigError::new("batch.traffic", "must not be empty"));
        }
        if let Some(level) = self.traffic_levels.iter().find(|l| !l.is_finite() || **l < 0.0) {
            return Err(ConfigError::new(
                "batch.traffic",
                format!("traffic level {level} must be finite and >= 0"),
            ));
        }
        match self.base.validate().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Expands the grid into run specs, ordered by traffic, run, then policy.
    ///
    /// All policies at the same (traffic, run) cell share one seed.
    pub fn specs(&self) -> Vec<RunSpec> {
        let mut rng = StdRng::seed_from_u64(self.master_seed);
        let mut specs =
            Vec::with_capacity(self.traffic_levels.len() * self.runs_per_cell * self.policies.len());
        for &traffic_multiplier in &self.traffic_levels {
            for _ in 0..self.runs_per_cell {
                let seed = rng.random_range(SEED_RANGE);
                for &policy in &self.policies {
                    specs.push(RunSpec {
                        index: specs.len(),
                        traffic_multiplier,
                        policy,
                        seed,
                    });
                }
            }
        }
        specs
    }
}

/// Parameters of one run within a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunSpec {
    pub index: usize,
    pub traffic_multiplier: f64,
    pub policy: PolicyKind,
    pub seed: u64,
}

impl RunSpec {
    /// The base scenario with this run's policy, seed and traffic applied.
    pub fn scenario(&self, base: &ScenarioConfig) -> ScenarioConfig {
        let mut scenario = base.clone();
        scenario.run.policy = self.policy.as_str().to_string();
        scenario.run.seed = self.seed;
        scenario.station.traffic_multiplier = self.traffic_multiplier;
        scenario
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Worker count; rayon's default when `None`.
    pub threads: Option<usize>,
    /// Once set, no further runs are started.
    pub cancel: Arc<AtomicBool>,
}

impl BatchOptions {
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }
}

/// A run that finished.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub spec: RunSpec,
    pub kpis: RunKpis,
}

/// A run that faulted or panicked. Siblings are unaffected.
#[derive(Debug, Clone, PartialEq)]
pub struct RunFailure {
    pub spec: RunSpec,
    pub message: String,
}

/// Everything a campaign produced, each list sorted by `RunSpec::index`.
#[derive(Debug, Clone, Default)]
pub struct CampaignReport {
    pub results: Vec<RunResult>,
    pub failures: Vec<RunFailure>,
    /// Specs never started because of cancellation.
    pub cancelled: Vec<RunSpec>,
}

impl CampaignReport {
    pub fn summary(&self) -> CampaignSummary {
        CampaignSummary::from_results(&self.results)
    }
}

/// Runs one simulated day for `scenario` and returns its KPIs.
///
/// # Errors
///
/// Returns an error if the scenario is invalid or the run faults.
pub fn simulate(scenario: &ScenarioConfig) -> Result<RunKpis, SimError> {
    let mut station = Station::from_scenario(scenario)?;
    station.run()?;
    Ok(RunKpis::from_station(&station))
}

/// Executes every run of `campaign` in parallel.
///
/// # Errors
///
/// Returns an error if the campaign is invalid or the worker pool cannot be
/// built. Individual run failures are reported in the `CampaignReport`.
pub fn run_campaign(campaign: &Campaign, options: &BatchOptions) -> Result<CampaignReport, SimError> {
    run_campaign_with(campaign, options, simulate)
}

/// Like [`run_campaign`], with a custom per-run executor.
///
/// # Errors
///
/// Same as [`run_campaign`].
pub fn run_campaign_with<F>(
    campaign: &Campaign,
    options: &BatchOptions,
    execute: F,
) -> Result<CampaignReport, SimError>
where
    F: Fn(&ScenarioConfig) -> Result<RunKpis, SimError> + Sync,
{
    campaign.validate()?;
    let specs = campaign.specs();
    info!(runs = specs.len(), threads = ?options.threads, "starting campaign");

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(threads) = options.threads {
        builder = builder.num_threads(threads);
    }
    let pool = builder.build()?;

    let outcomes: Vec<(RunSpec, Option<Result<RunKpis, String>>)> = pool.install(|| {
        specs
            .into_par_iter()
            .map(|spec| {
                if options.cancel.load(Ordering::SeqCst) {
                    return (spec, None);
                }
                let scenario = spec.scenario(&campaign.base);
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| execute(&scenario)));
                let result = match outcome {
                    Ok(Ok(kpis)) => Ok(kpis),
                    Ok(Err(err)) => Err(err.to_string()),
                    Err(payload) => Err(panic_message(payload.as_ref())),
                };
                (spec, Some(result))
            })
            .collect()
    });

    let mut report = CampaignReport::default();
    for (spec, outcome) in outcomes {
        match outcome {
            Some(Ok(kpis)) => report.results.push(RunResult { spec, kpis }),
            Some(Err(message)) => {
                warn!(
                    index = spec.index,
                    seed = spec.seed,
                    policy = %spec.policy,
                    traffic = spec.traffic_multiplier,
                    %message,
                    "run failed"
                );
                report.failures.push(RunFailure { spec, message });
            }
            None => report.cancelled.push(spec),
        }
    }

    info!(
        completed = report.results.len(),
        failed = report.failures.len(),
        cancelled = report.cancelled.len(),
        "campaign finished"
    );
    Ok(report)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic".to_string()
    }
}

/// Aggregates of one (traffic, policy) cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellSummary {
    pub traffic_multiplier: f64,
    pub policy: PolicyKind,
    pub runs: usize,
    pub mean_revenue: f64,
    /// Half-width of the 95% confidence interval on mean revenue.
    pub revenue_ci95: f64,
    pub mean_critical_failures: f64,
    pub mean_wait_critical: f64,
    pub mean_wait_economy: f64,
    /// Economy minus Critical mean wait.
    pub equity_gap: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CampaignSummary {
    /// Sorted by traffic level, then policy.
    pub cells: Vec<CellSummary>,
    /// `(traffic, percent)` SIRQ revenue gain over FIFO, where both exist.
    pub sirq_gain_pct: Vec<(f64, f64)>,
}

impl CampaignSummary {
    pub fn from_results(results: &[RunResult]) -> Self {
        // Traffic levels are non-negative, so their bit patterns sort numerically.
        let mut groups: BTreeMap<(u64, PolicyKind), Vec<&RunKpis>> = BTreeMap::new();
        for r in results {
            groups
                .entry((r.spec.traffic_multiplier.to_bits(), r.spec.policy))
                .or_default()
                .push(&r.kpis);
        }

        let cells: Vec<CellSummary> = groups
            .into_iter()
            .map(|((bits, policy), runs)| summarize_cell(f64::from_bits(bits), policy, &runs))
            .collect();

        let mut sirq_gain_pct = Vec::new();
        for fifo in cells.iter().filter(|c| c.policy == PolicyKind::Fifo) {
            let sirq = cells.iter().find(|c| {
                c.policy == PolicyKind::Sirq && c.traffic_multiplier == fifo.traffic_multiplier
            });
            if let Some(sirq) = sirq {
                if fifo.mean_revenue != 0.0 {
                    let gain = (sirq.mean_revenue - fifo.mean_revenue) / fifo.mean_revenue * 100.0;
                    sirq_gain_pct.push((fifo.traffic_multiplier, gain));
                }
            }
        }

        Self {
            cells,
            sirq_gain_pct,
        }
    }
}

fn summarize_cell(traffic_multiplier: f64, policy: PolicyKind, runs: &[&RunKpis]) -> CellSummary {
    let n = runs.len() as f64;
    let mean = |f: fn(&RunKpis) -> f64| runs.iter().map(|k| f(k)).sum::<f64>() / n;

    let mean_revenue = mean(|k| k.revenue);
    let sd = if runs.len() < 2 {
        0.0
    } else {
        let var = runs
            .iter()
            .map(|k| (k.revenue - mean_revenue).powi(2))
            .sum::<f64>()
            / (n - 1.0);
        var.sqrt()
    };
    let mean_wait_critical = mean(|k| k.avg_wait_critical);
    let mean_wait_economy = mean(|k| k.avg_wait_economy);

    CellSummary {
        traffic_multiplier,
        policy,
        runs: runs.len(),
        mean_revenue,
        revenue_ci95: Z_95 * sd / n.sqrt(),
        mean_critical_failures: mean(|k| k.critical_failures as f64),
        mean_wait_critical,
        mean_wait_economy,
        equity_gap: mean_wait_economy - mean_wait_critical,
    }
}

/// One flat CSV row per completed run.
#[derive(Debug, Serialize)]
struct RunRow {
    index: usize,
    seed: u64,
    traffic_multiplier: f64,
    policy: PolicyKind,
    revenue: f64,
    completed: usize,
    preempted: usize,
    left_impatient: usize,
    critical_failures: usize,
    balked: u64,
    avg_wait_critical: f64,
    avg_wait_standard: f64,
    avg_wait_economy: f64,
    peak_queue_length: usize,
    avg_clearing_price: f64,
}

impl From<&RunResult> for RunRow {
    fn from(r: &RunResult) -> Self {
        Self {
            index: r.spec.index,
            seed: r.spec.seed,
            traffic_multiplier: r.spec.traffic_multiplier,
            policy: r.spec.policy,
            revenue: r.kpis.revenue,
            completed: r.kpis.completed,
            preempted: r.kpis.preempted,
            left_impatient: r.kpis.left_impatient,
            critical_failures: r.kpis.critical_failures,
            balked: r.kpis.balked,
            avg_wait_critical: r.kpis.avg_wait_critical,
            avg_wait_standard: r.kpis.avg_wait_standard,
            avg_wait_economy: r.kpis.avg_wait_economy,
            peak_queue_length: r.kpis.peak_queue_length,
            avg_clearing_price: r.kpis.avg_clearing_price,
        }
    }
}

/// Writes one CSV row per completed run.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_results_csv(results: &[RunResult], writer: impl Write) -> Result<(), SimError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for r in results {
        wtr.serialize(RunRow::from(r))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Exports completed runs to a CSV file.
///
/// # Errors
///
/// Returns an error if file creation or writing fails.
pub fn export_results_csv(results: &[RunResult], path: &Path) -> Result<(), SimError> {
    let file = File::create(path)?;
    write_results_csv(results, io::BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RunFault;

    fn short_campaign(runs: usize) -> Campaign {
        let mut base = ScenarioConfig::baseline();
        base.run.ticks = 240;
        Campaign {
            traffic_levels: vec![1.0, 1.5],
            runs_per_cell: runs,
            master_seed: 7,
            ..Campaign::new(base)
        }
    }

    fn kpis(revenue: f64, wait_critical: f64, wait_economy: f64) -> RunKpis {
        let mut k = RunKpis::from_tables(&[], &[]);
        k.revenue = revenue;
        k.avg_wait_critical = wait_critical;
        k.avg_wait_economy = wait_economy;
        k
    }

    fn result(index: usize, traffic: f64, policy: PolicyKind, k: RunKpis) -> RunResult {
        RunResult {
            spec: RunSpec {
                index,
                traffic_multiplier: traffic,
                policy,
                seed: 100_000,
            },
            kpis: k,
        }
    }

    #[test]
    fn specs_share_seed_across_policies() {
        let specs = short_campaign(3).specs();
        assert_eq!(specs.len(), 2 * 3 * 2);
        for pair in specs.chunks(2) {
            assert_eq!(pair[0].seed, pair[1].seed);
            assert_eq!(pair[0].policy, PolicyKind::Fifo);
            assert_eq!(pair[1].policy, PolicyKind::Sirq);
        }
        assert!(specs.iter().all(|s| SEED_RANGE.contains(&s.seed)));
        assert!(specs.iter().enumerate().all(|(i, s)| s.index == i));
    }

    #[test]
    fn specs_are_reproducible() {
        assert_eq!(short_campaign(4).specs(), short_campaign(4).specs());
    }

    #[test]
    fn invalid_campaign_is_rejected() {
        let mut c = short_campaign(1);
        c.runs_per_cell = 0;
        assert!(run_campaign(&c, &BatchOptions::default()).is_err());

        let mut c = short_campaign(1);
        c.traffic_levels = vec![-1.0];
        assert!(c.validate().is_err());
    }

    #[test]
    fn campaign_runs_every_spec_in_order() {
        let campaign = short_campaign(2);
        let options = BatchOptions {
            threads: Some(2),
            ..BatchOptions::default()
        };
        let report = run_campaign(&campaign, &options).unwrap();
        assert_eq!(report.results.len(), 8);
        assert!(report.failures.is_empty());
        assert!(report.results.windows(2).all(|w| w[0].spec.index < w[1].spec.index));
    }

    #[test]
    fn parallel_matches_sequential() {
        let campaign = short_campaign(2);
        let one = run_campaign(
            &campaign,
            &BatchOptions {
                threads: Some(1),
                ..BatchOptions::default()
            },
        )
        .unwrap();
        let four = run_campaign(
            &campaign,
            &BatchOptions {
                threads: Some(4),
                ..BatchOptions::default()
            },
        )
        .unwrap();
        assert_eq!(one.results, four.results);
    }

    #[test]
    fn cancelled_campaign_starts_nothing() {
        let options = BatchOptions::default();
        options.cancel();
        let report = run_campaign(&short_campaign(2), &options).unwrap();
        assert!(report.results.is_empty());
        assert_eq!(report.cancelled.len(), 8);
    }

    #[test]
    fn failures_are_isolated() {
        let campaign = short_campaign(2);
        let bad_seed = campaign.specs()[0].seed;
        let report = run_campaign_with(&campaign, &BatchOptions::default(), |scenario| {
            if scenario.run.seed == bad_seed && scenario.run.policy == "FIFO" {
                panic!("boom");
            }
            if scenario.run.seed == bad_seed {
                return Err(RunFault {
                    tick: 3,
                    message: "slot counter underflow".into(),
                }
                .into());
            }
            simulate(scenario)
        })
        .unwrap();

        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.results.len(), 6);
        assert!(report.failures[0].message.contains("boom"));
        assert!(report.failures[1].message.contains("tick 3"));
    }

    #[test]
    fn summary_ci_and_gain() {
        let results = vec![
            result(0, 1.0, PolicyKind::Fifo, kpis(100.0, 10.0, 20.0)),
            result(1, 1.0, PolicyKind::Sirq, kpis(120.0, 2.0, 30.0)),
            result(2, 1.0, PolicyKind::Fifo, kpis(200.0, 10.0, 20.0)),
            result(3, 1.0, PolicyKind::Sirq, kpis(240.0, 4.0, 40.0)),
        ];
        let summary = CampaignSummary::from_results(&results);
        assert_eq!(summary.cells.len(), 2);

        let fifo = &summary.cells[0];
        assert_eq!(fifo.policy, PolicyKind::Fifo);
        assert_eq!(fifo.mean_revenue, 150.0);
        // sd = sqrt(2 * 50^2 / 1) = 70.71; ci = 1.96 * 70.71 / sqrt(2) = 98.0
        assert!((fifo.revenue_ci95 - 98.0).abs() < 1e-9);

        let sirq = &summary.cells[1];
        assert_eq!(sirq.mean_wait_critical, 3.0);
        assert_eq!(sirq.equity_gap, 32.0);

        assert_eq!(summary.sirq_gain_pct.len(), 1);
        assert!((summary.sirq_gain_pct[0].1 - 20.0).abs() < 1e-9);
    }

    #[test]
    fn single_run_cell_has_zero_ci() {
        let summary =
            CampaignSummary::from_results(&[result(0, 1.2, PolicyKind::Sirq, kpis(50.0, 0.0, 0.0))]);
        assert_eq!(summary.cells[0].revenue_ci95, 0.0);
        assert!(summary.sirq_gain_pct.is_empty());
    }

    #[test]
    fn results_csv_has_header_and_rows() {
        let results = vec![result(0, 1.0, PolicyKind::Fifo, kpis(100.0, 1.0, 2.0))];
        let mut buf = Vec::new();
        write_results_csv(&results, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("index,seed,traffic_multiplier,policy,revenue"));
        assert!(lines.next().unwrap().starts_with("0,100000,1.0,FIFO,100.0"));
    }
}
