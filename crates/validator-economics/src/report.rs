//! Text rendering of a profitability report

use std::fmt::Write;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::billing::ProfitabilityReport;
use crate::constants;

const RULE: &str = "============================================================";
const SUBTOTAL: &str = "  ─────────────────────────────────────────────";

/// Avoid displaying -0.0
fn normalize_zero(value: f64) -> f64 {
    if value == 0.0 { 0.0 } else { value }
}

fn sol(lamports: f64) -> f64 {
    normalize_zero(lamports / constants::LAMPORTS_PER_SOL)
}

/// Render the cycle summary
pub fn format_report(report: &ProfitabilityReport) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = write_report(&mut out, report);
    out
}

fn write_report(out: &mut String, report: &ProfitabilityReport) -> std::fmt::Result {
    let cycle = &report.cycle;
    let summary = &report.summary;
    let price = report.sol_price;

    writeln!(out, "{RULE}")?;
    writeln!(out, "              VALIDATOR ECONOMICS")?;
    writeln!(out, "{RULE}")?;
    writeln!(
        out,
        "Cycle:    {} -> {}",
        cycle.start.format("%Y-%m-%d"),
        cycle.end.format("%Y-%m-%d")
    )?;
    writeln!(
        out,
        "Progress: {:.1}% ({} UTC)",
        cycle.display_elapsed_percent(),
        cycle.now.format("%Y-%m-%d %H:%M")
    )?;
    let range_len = report.epochs.end - report.epochs.start;
    if report.epochs.is_empty() {
        writeln!(out, "Epochs:   none completed yet (current epoch {})", report.current_epoch)?;
    } else {
        writeln!(
            out,
            "Epochs:   {}-{} ({} of {} with data)",
            report.epochs.start,
            report.epochs.end - 1,
            summary.epochs_covered,
            range_len
        )?;
    }
    writeln!(out, "SOL:      ${price:.2}")?;

    writeln!(out, "\nREVENUE:")?;
    let line = |label: &str, lamports: f64| {
        let amount = sol(lamports);
        format!("  {label:<20}{amount:>10.4} SOL  ${:>10.2}", normalize_zero(amount * price))
    };
    writeln!(out, "{}", line("Vote Commission:", summary.total_vote_reward))?;
    writeln!(out, "{}", line("Jito MEV:", summary.total_jito_reward))?;
    writeln!(out, "{}", line("Block Rewards:", summary.total_block_reward))?;
    writeln!(out, "{SUBTOTAL}")?;
    writeln!(out, "{}", line("Total Revenue:", summary.total_revenue()))?;

    writeln!(out, "\nEXPENSES:")?;
    writeln!(out, "{}", line("Vote Fees (gross):", summary.total_vote_cost))?;
    if report.vote_cost_reimbursement_percent > 0.0 {
        writeln!(
            out,
            "  Reimbursed:         {:>9.0}%",
            report.vote_cost_reimbursement_percent
        )?;
    }
    writeln!(
        out,
        "  Vote Fees (net):    {:>10.4} SOL  ${:>10.2}",
        normalize_zero(report.reimbursed_vote_cost_native),
        normalize_zero(report.vote_cost_fiat)
    )?;
    writeln!(
        out,
        "  Base (accrued):                 ${:>10.2}  of ${:.2}",
        normalize_zero(report.accrued_base_expense_fiat),
        report.monthly_base_expense_fiat
    )?;
    writeln!(out, "{SUBTOTAL}")?;
    writeln!(
        out,
        "  Accrued Expenses:               ${:>10.2}",
        normalize_zero(report.accrued_expense_fiat)
    )?;

    writeln!(out, "\nPROFIT/LOSS:")?;
    writeln!(
        out,
        "  Net Gain:           {:>10.4} SOL  ${:>10.2}",
        normalize_zero(report.net_gain_native),
        normalize_zero(report.revenue_fiat)
    )?;
    writeln!(
        out,
        "  Coverage:           {:>9.1}%",
        normalize_zero(report.coverage_percent)
    )?;

    writeln!(out, "\nPROJECTION (full cycle):")?;
    writeln!(
        out,
        "  Revenue:                        ${:>10.2}",
        normalize_zero(report.projected_revenue_fiat)
    )?;
    writeln!(
        out,
        "  Expenses:                       ${:>10.2}",
        normalize_zero(report.monthly_total_expense_fiat)
    )?;
    writeln!(
        out,
        "  Profit:                         ${:>10.2}",
        normalize_zero(report.projected_profit_fiat)
    )?;
    writeln!(
        out,
        "  Coverage:           {:>9.1}%",
        normalize_zero(report.projected_coverage_percent)
    )?;

    let status = if report.is_on_track() { "ON TRACK" } else { "BEHIND PACE" };
    writeln!(out, "\nStatus: {status}")?;

    if !report.warnings.is_empty() {
        writeln!(out, "\nWARNINGS ({}):", report.warnings.len())?;
        for warning in &report.warnings {
            writeln!(out, "  - {warning}")?;
        }
    }
    write!(out, "{RULE}")
}

#[derive(Tabled)]
struct EpochRow {
    epoch: u64,
    #[tabled(rename = "vote (SOL)")]
    vote: String,
    #[tabled(rename = "jito (SOL)")]
    jito: String,
    #[tabled(rename = "blocks (SOL)")]
    blocks: String,
    #[tabled(rename = "vote cost (SOL)")]
    vote_cost: String,
    #[tabled(rename = "net (SOL)")]
    net: String,
}

/// Per-epoch contributions as a table, ascending by epoch
pub fn format_epoch_breakdown(report: &ProfitabilityReport) -> String {
    if report.contributions.is_empty() {
        return "No epoch data for this cycle".to_string();
    }

    let rows = report.contributions.iter().map(|c| {
        let s = &c.summary;
        EpochRow {
            epoch: c.epoch,
            vote: format!("{:.4}", sol(s.total_vote_reward)),
            jito: format!("{:.4}", sol(s.total_jito_reward)),
            blocks: format!("{:.4}", sol(s.total_block_reward)),
            vote_cost: format!("{:.4}", sol(s.total_vote_cost)),
            net: format!("{:.4}", sol(s.total_revenue() - s.total_vote_cost)),
        }
    });

    Table::new(rows).with(Style::psql()).to_string()
}
