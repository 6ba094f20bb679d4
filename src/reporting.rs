use std::fmt::Write;

use crate::batch::{CampaignReport, CampaignSummary};
use crate::sim::kpi::RunKpis;

pub fn print_kpi_report(kpis: &RunKpis) {
    println!("\n{kpis}");
}

/// Side-by-side FIFO vs SIRQ table for one scenario and seed.
pub fn format_comparison(fifo: &RunKpis, sirq: &RunKpis) -> String {
    let rows: [(&str, f64, f64); 8] = [
        ("Revenue ($)", fifo.revenue, sirq.revenue),
        ("Completed", fifo.completed as f64, sirq.completed as f64),
        ("Preemptions", fifo.preempted as f64, sirq.preempted as f64),
        ("Left impatient", fifo.left_impatient as f64, sirq.left_impatient as f64),
        (
            "Critical failures",
            fifo.critical_failures as f64,
            sirq.critical_failures as f64,
        ),
        ("Balked", fifo.balked as f64, sirq.balked as f64),
        ("Avg wait Critical", fifo.avg_wait_critical, sirq.avg_wait_critical),
        ("Avg wait Economy", fifo.avg_wait_economy, sirq.avg_wait_economy),
    ];

    let mut out = String::new();
    let _ = writeln!(out, "--- FIFO vs SIRQ ---");
    let _ = writeln!(out, "{:<20}{:>12}{:>12}{:>12}", "", "FIFO", "SIRQ", "delta");
    for (label, f, s) in rows {
        let _ = writeln!(out, "{label:<20}{f:>12.2}{s:>12.2}{:>+12.2}", s - f);
    }
    let _ = write!(
        out,
        "{:<20}{:>12.1}{:>12.1}",
        "Equity gap (min)",
        fifo.equity_gap(),
        sirq.equity_gap()
    );
    out
}

pub fn print_comparison(fifo: &RunKpis, sirq: &RunKpis) {
    println!("\n{}", format_comparison(fifo, sirq));
}

/// Per-cell campaign table followed by SIRQ gains and any failed runs.
pub fn format_campaign(report: &CampaignReport, summary: &CampaignSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "--- Monte Carlo Summary ({} runs, {} failed, {} cancelled) ---",
        report.results.len(),
        report.failures.len(),
        report.cancelled.len()
    );
    let _ = writeln!(
        out,
        "{:>8} {:>6} {:>5} {:>20} {:>10} {:>10} {:>10} {:>10}",
        "traffic", "policy", "n", "revenue (95% CI)", "crit.fail", "wait C", "wait E", "gap"
    );
    for c in &summary.cells {
        let revenue = format!("{:.0} ± {:.0}", c.mean_revenue, c.revenue_ci95);
        let _ = writeln!(
            out,
            "{:>8.2} {:>6} {:>5} {:>20} {:>10.2} {:>10.1} {:>10.1} {:>10.1}",
            c.traffic_multiplier,
            c.policy,
            c.runs,
            revenue,
            c.mean_critical_failures,
            c.mean_wait_critical,
            c.mean_wait_economy,
            c.equity_gap
        );
    }
    for (traffic, gain) in &summary.sirq_gain_pct {
        let _ = writeln!(out, "SIRQ revenue gain at traffic {traffic:.2}: {gain:+.1}%");
    }
    for f in &report.failures {
        let _ = writeln!(
            out,
            "FAILED run {} (policy {}, seed {}, traffic {:.2}): {}",
            f.spec.index, f.spec.policy, f.spec.seed, f.spec.traffic_multiplier, f.message
        );
    }
    out.trim_end().to_string()
}

pub fn print_campaign(report: &CampaignReport, summary: &CampaignSummary) {
    println!("\n{}", format_campaign(report, summary));
}
