//! Output formatting module for CLI display
//!
//! This module handles all terminal output formatting, separating
//! the concerns of data calculation from presentation.

use colored::Colorize;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tabled::{
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

use fundbook::capital_calls::{CallDetail, FundCapitalSummary, LpStatement};
use fundbook::db::{
    CallStatus, CompanyUpdate, Fund, Investment, LimitedPartner, NavCalculation,
    PortfolioCompany, ResponseStatus, User,
};
use fundbook::nav::CompanyValuation;
use fundbook::portfolio::{LatestMetric, MetricPoint};
use fundbook::utils::{format_amount, format_currency, format_percent};

/// Money in a currency, with its symbol unless symbols are turned off
pub fn money(value: Decimal, currency: &str, symbols: bool) -> String {
    if symbols {
        format_currency(value, currency)
    } else {
        format!("{} {}", currency, format_amount(value))
    }
}

fn optional<T: ToString>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn colored_call_status(status: CallStatus) -> String {
    match status {
        CallStatus::FullyPaid => status.as_str().green().to_string(),
        CallStatus::PartiallyPaid => status.as_str().yellow().to_string(),
        CallStatus::Overdue => status.as_str().red().bold().to_string(),
        CallStatus::Pending => status.as_str().to_string(),
    }
}

fn colored_response_status(status: ResponseStatus) -> String {
    match status {
        ResponseStatus::Paid => status.as_str().green().to_string(),
        ResponseStatus::PartiallyPaid => status.as_str().yellow().to_string(),
        ResponseStatus::Late => status.as_str().red().to_string(),
        ResponseStatus::Pending => status.as_str().to_string(),
    }
}

fn render<T: Tabled>(rows: &[T], right_aligned_from: usize) -> String {
    let mut table = Table::new(rows);
    table.with(Style::modern());
    table.modify(Columns::new(right_aligned_from..), Alignment::right());
    table.to_string()
}

fn summary_line(label: &str, value: impl std::fmt::Display) -> String {
    format!("\n{:<24} {}", format!("{}:", label).bold(), value)
}

/// Message shown when a listing has nothing to show
pub fn format_empty(what: &str) -> String {
    format!("{} No {} found\n", "ℹ".blue().bold(), what)
}

pub fn format_success(message: &str) -> String {
    format!("{} {}", "✓".green().bold(), message)
}

pub fn format_users_table(users: &[User]) -> String {
    #[derive(Tabled)]
    struct UserRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Email")]
        email: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Role")]
        role: String,
    }

    let rows: Vec<UserRow> = users
        .iter()
        .map(|u| UserRow {
            id: u.id,
            email: u.email.clone(),
            name: u.name.clone(),
            role: u.role.as_str().to_string(),
        })
        .collect();
    render(&rows, 4)
}

pub fn format_funds_table(funds: &[Fund], symbols: bool) -> String {
    #[derive(Tabled)]
    struct FundRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Vintage")]
        vintage: String,
        #[tabled(rename = "Status")]
        status: String,
        #[tabled(rename = "Target Size")]
        target_size: String,
    }

    let rows: Vec<FundRow> = funds
        .iter()
        .map(|f| FundRow {
            id: f.id,
            name: f.name.clone(),
            vintage: optional(&f.vintage_year),
            status: f.status.as_str().to_string(),
            target_size: money(f.target_size, &f.currency, symbols),
        })
        .collect();
    render(&rows, 4)
}

pub fn format_fund_detail(fund: &Fund, symbols: bool) -> String {
    let mut output = format!("\n{} {}\n", "🏦".cyan().bold(), fund.name.bold());
    output.push_str(&summary_line("ID", fund.id));
    output.push_str(&summary_line("Status", fund.status.as_str()));
    output.push_str(&summary_line("Vintage", optional(&fund.vintage_year)));
    output.push_str(&summary_line("Currency", &fund.currency));
    output.push_str(&summary_line(
        "Target Size",
        money(fund.target_size, &fund.currency, symbols),
    ));
    output.push_str(&summary_line("Owner", optional(&fund.owner_id)));
    output.push('\n');
    output
}

pub fn format_fund_summary(summary: &FundCapitalSummary, symbols: bool) -> String {
    let m = |v: Decimal| money(v, &summary.currency, symbols);

    let mut output = format!(
        "\n{} {} - capital summary\n",
        "📊".cyan().bold(),
        summary.fund_name.bold()
    );
    output.push_str(&format!("\n{}", "━".repeat(60).bright_black()));
    output.push_str(&summary_line("Limited Partners", summary.lp_count));
    output.push_str(&summary_line("Total Commitments", m(summary.total_commitments)));
    output.push_str(&summary_line(
        "Capital Calls",
        format!("{} ({} open)", summary.call_count, summary.open_calls),
    ));
    output.push_str(&summary_line("Total Called", m(summary.total_called)));
    output.push_str(&summary_line("Total Paid", m(summary.total_paid)));

    let outstanding = if summary.outstanding > Decimal::ZERO {
        m(summary.outstanding).yellow().to_string()
    } else {
        m(summary.outstanding).green().to_string()
    };
    output.push_str(&summary_line("Outstanding", outstanding));
    output.push_str(&summary_line("Uncalled Commitment", m(summary.uncalled_commitment)));

    match &summary.latest_nav {
        Some(nav) => output.push_str(&summary_line(
            "Latest NAV",
            format!("{} ({})", money(nav.total_value, &nav.currency, symbols), nav.date),
        )),
        None => output.push_str(&summary_line("Latest NAV", "-")),
    }
    output.push('\n');
    output
}

pub fn format_lps_table(lps: &[LimitedPartner], currency: &str, symbols: bool) -> String {
    #[derive(Tabled)]
    struct LpRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Type")]
        lp_type: String,
        #[tabled(rename = "Email")]
        email: String,
        #[tabled(rename = "Commitment")]
        commitment: String,
    }

    let rows: Vec<LpRow> = lps
        .iter()
        .map(|lp| LpRow {
            id: lp.id,
            name: lp.name.clone(),
            lp_type: lp.lp_type.as_str().to_string(),
            email: optional(&lp.email),
            commitment: money(lp.commitment, currency, symbols),
        })
        .collect();

    let total: Decimal = lps.iter().map(|lp| lp.commitment).sum();
    format!(
        "{}{}\n",
        render(&rows, 4),
        summary_line("Total Commitments", money(total, currency, symbols))
    )
}

pub fn format_statement(statement: &LpStatement, symbols: bool) -> String {
    let m = |v: Decimal| money(v, &statement.currency, symbols);

    #[derive(Tabled)]
    struct LineRow {
        #[tabled(rename = "Call")]
        call: i64,
        #[tabled(rename = "Call Date")]
        call_date: String,
        #[tabled(rename = "Due Date")]
        due_date: String,
        #[tabled(rename = "Status")]
        status: String,
        #[tabled(rename = "%")]
        percentage: String,
        #[tabled(rename = "Expected")]
        expected: String,
        #[tabled(rename = "Paid")]
        paid: String,
    }

    let mut output = format!(
        "\n{} Capital account: {} in {}\n\n",
        "📄".cyan().bold(),
        statement.lp_name.bold(),
        statement.fund_name
    );

    if statement.call_history.is_empty() {
        output.push_str("No capital calls yet\n");
    } else {
        let rows: Vec<LineRow> = statement
            .call_history
            .iter()
            .map(|line| LineRow {
                call: line.capital_call_id,
                call_date: line.call_date.to_string(),
                due_date: line.due_date.to_string(),
                status: colored_response_status(line.status),
                percentage: format_percent(line.percentage),
                expected: m(line.expected_amount),
                paid: m(line.amount_paid),
            })
            .collect();
        output.push_str(&render(&rows, 4));
    }

    output.push_str(&format!("\n\n{} Summary", "━".repeat(60).bright_black()));
    output.push_str(&summary_line("Commitment", m(statement.commitment)));
    output.push_str(&summary_line("Total Called", m(statement.total_called)));
    output.push_str(&summary_line("Total Paid", m(statement.total_paid)));
    output.push_str(&summary_line("Outstanding", m(statement.outstanding_balance)));
    output.push_str(&summary_line(
        "Remaining Commitment",
        m(statement.remaining_commitment),
    ));
    output.push('\n');
    output
}

pub fn format_calls_table(calls: &[CallDetail], currency: &str, symbols: bool) -> String {
    #[derive(Tabled)]
    struct CallRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Call Date")]
        call_date: String,
        #[tabled(rename = "Due Date")]
        due_date: String,
        #[tabled(rename = "Status")]
        status: String,
        #[tabled(rename = "%")]
        percentage: String,
        #[tabled(rename = "Amount")]
        amount: String,
        #[tabled(rename = "Paid")]
        paid: String,
    }

    let rows: Vec<CallRow> = calls
        .iter()
        .map(|c| CallRow {
            id: c.call.id,
            call_date: c.call.call_date.to_string(),
            due_date: c.call.due_date.to_string(),
            status: colored_call_status(c.call.status),
            percentage: format_percent(c.call.percentage),
            amount: money(c.call.amount, currency, symbols),
            paid: money(c.total_paid, currency, symbols),
        })
        .collect();
    render(&rows, 4)
}

pub fn format_call_detail(detail: &CallDetail, currency: &str, symbols: bool) -> String {
    let m = |v: Decimal| money(v, currency, symbols);
    let call = &detail.call;

    #[derive(Tabled)]
    struct ResponseRow {
        #[tabled(rename = "LP")]
        lp_id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Status")]
        status: String,
        #[tabled(rename = "Paid On")]
        date_paid: String,
        #[tabled(rename = "Expected")]
        expected: String,
        #[tabled(rename = "Paid")]
        paid: String,
    }

    let mut output = format!(
        "\n{} Capital call {} - {}\n",
        "📣".cyan().bold(),
        call.id,
        colored_call_status(call.status)
    );
    if let Some(description) = &call.description {
        output.push_str(&format!("{}\n", description.italic()));
    }
    output.push_str(&summary_line("Amount", m(call.amount)));
    output.push_str(&summary_line("Percentage", format_percent(call.percentage)));
    output.push_str(&summary_line(
        "Dates",
        format!("called {}, due {}", call.call_date, call.due_date),
    ));
    output.push_str(&summary_line("Total Paid", m(detail.total_paid)));
    output.push_str("\n\n");

    let rows: Vec<ResponseRow> = detail
        .responses
        .iter()
        .map(|r| ResponseRow {
            lp_id: r.response.lp_id,
            name: r.lp_name.clone(),
            status: colored_response_status(r.response.status),
            date_paid: optional(&r.response.date_paid),
            expected: m(r.expected_amount),
            paid: m(r.response.amount_paid),
        })
        .collect();
    if rows.is_empty() {
        output.push_str("No LP responses\n");
    } else {
        output.push_str(&render(&rows, 4));
        output.push('\n');
    }
    output
}

pub fn format_companies_table(companies: &[PortfolioCompany]) -> String {
    #[derive(Tabled)]
    struct CompanyRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Sector")]
        sector: String,
        #[tabled(rename = "Stage")]
        stage: String,
        #[tabled(rename = "Status")]
        status: String,
    }

    let rows: Vec<CompanyRow> = companies
        .iter()
        .map(|c| CompanyRow {
            id: c.id,
            name: c.name.clone(),
            sector: optional(&c.sector),
            stage: optional(&c.stage),
            status: c.status.as_str().to_string(),
        })
        .collect();
    render(&rows, 5)
}

pub fn format_company_detail(
    company: &PortfolioCompany,
    investments: &[Investment],
    valuation: Option<&CompanyValuation>,
    symbols: bool,
) -> String {
    let mut output = format!("\n{} {}\n", "🏢".cyan().bold(), company.name.bold());
    output.push_str(&summary_line("ID", company.id));
    output.push_str(&summary_line("Status", company.status.as_str()));
    output.push_str(&summary_line("Sector", optional(&company.sector)));
    output.push_str(&summary_line("Stage", optional(&company.stage)));
    output.push_str(&summary_line("Website", optional(&company.website)));
    if let Some(v) = valuation {
        output.push_str(&summary_line(
            "Latest Valuation",
            format!(
                "{} ({}, {})",
                money(v.holding.value, &v.currency, symbols),
                v.holding.method.as_str(),
                v.date
            ),
        ));
    }
    output.push_str("\n\n");
    if investments.is_empty() {
        output.push_str("No investments recorded\n");
    } else {
        output.push_str(&format_investments_table(investments, symbols));
        output.push('\n');
    }
    output
}

pub fn format_investments_table(investments: &[Investment], symbols: bool) -> String {
    #[derive(Tabled)]
    struct InvestmentRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Fund")]
        fund: i64,
        #[tabled(rename = "Company")]
        company: i64,
        #[tabled(rename = "Round")]
        round: String,
        #[tabled(rename = "Amount")]
        amount: String,
        #[tabled(rename = "Ownership")]
        ownership: String,
    }

    let rows: Vec<InvestmentRow> = investments
        .iter()
        .map(|i| InvestmentRow {
            id: i.id,
            date: i.date.to_string(),
            fund: i.fund_id,
            company: i.company_id,
            round: optional(&i.round),
            amount: money(i.amount, &i.currency, symbols),
            ownership: i
                .ownership
                .map(format_percent)
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();
    render(&rows, 5)
}

pub fn format_totals(totals: &BTreeMap<String, Decimal>, symbols: bool) -> String {
    if totals.is_empty() {
        return format_empty("investments");
    }
    let mut output = format!("\n{} Total invested\n", "💰".cyan().bold());
    for (currency, total) in totals {
        output.push_str(&summary_line(currency, money(*total, currency, symbols)));
    }
    output.push('\n');
    output
}

pub fn format_nav_table(calculations: &[NavCalculation], symbols: bool) -> String {
    #[derive(Tabled)]
    struct NavRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Holdings")]
        holdings: usize,
        #[tabled(rename = "Total Value")]
        total_value: String,
    }

    let rows: Vec<NavRow> = calculations
        .iter()
        .map(|c| NavRow {
            id: c.id,
            date: c.date.to_string(),
            holdings: c.holdings.len(),
            total_value: money(c.total_value, &c.currency, symbols),
        })
        .collect();
    render(&rows, 2)
}

pub fn format_nav_detail(nav: &NavCalculation, symbols: bool) -> String {
    #[derive(Tabled)]
    struct HoldingRow {
        #[tabled(rename = "Company")]
        company: i64,
        #[tabled(rename = "Method")]
        method: String,
        #[tabled(rename = "Notes")]
        notes: String,
        #[tabled(rename = "Value")]
        value: String,
    }

    let mut output = format!(
        "\n{} NAV {} for fund {} on {}\n",
        "📈".cyan().bold(),
        nav.id,
        nav.fund_id,
        nav.date
    );
    output.push_str(&summary_line(
        "Total Value",
        money(nav.total_value, &nav.currency, symbols).bold(),
    ));
    output.push_str("\n\n");

    let rows: Vec<HoldingRow> = nav
        .holdings
        .iter()
        .map(|h| HoldingRow {
            company: h.company_id,
            method: h.method.as_str().to_string(),
            notes: optional(&h.notes),
            value: money(h.value, &nav.currency, symbols),
        })
        .collect();
    if !rows.is_empty() {
        output.push_str(&render(&rows, 3));
        output.push('\n');
    }
    output
}

fn metric_value(value: Decimal, unit: &Option<String>) -> String {
    match unit {
        Some(unit) => format!("{} {}", value.normalize(), unit),
        None => value.normalize().to_string(),
    }
}

pub fn format_updates_table(updates: &[CompanyUpdate]) -> String {
    #[derive(Tabled)]
    struct UpdateRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Title")]
        title: String,
        #[tabled(rename = "Metrics")]
        metrics: String,
    }

    let rows: Vec<UpdateRow> = updates
        .iter()
        .map(|u| UpdateRow {
            id: u.id,
            date: u.date.to_string(),
            title: u.title.clone(),
            metrics: u
                .metrics
                .iter()
                .map(|m| format!("{}={}", m.name, metric_value(m.value, &m.unit)))
                .collect::<Vec<_>>()
                .join(", "),
        })
        .collect();
    render(&rows, 4)
}

pub fn format_latest_metrics(metrics: &[LatestMetric]) -> String {
    #[derive(Tabled)]
    struct LatestRow {
        #[tabled(rename = "Metric")]
        name: String,
        #[tabled(rename = "As Of")]
        date: String,
        #[tabled(rename = "Value")]
        value: String,
    }

    let rows: Vec<LatestRow> = metrics
        .iter()
        .map(|m| LatestRow {
            name: m.name.clone(),
            date: m.date.to_string(),
            value: metric_value(m.value, &m.unit),
        })
        .collect();
    render(&rows, 2)
}

pub fn format_metric_history(points: &[MetricPoint]) -> String {
    #[derive(Tabled)]
    struct PointRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Metric")]
        name: String,
        #[tabled(rename = "Update")]
        update_id: i64,
        #[tabled(rename = "Value")]
        value: String,
    }

    let rows: Vec<PointRow> = points
        .iter()
        .map(|p| PointRow {
            date: p.date.to_string(),
            name: p.name.clone(),
            update_id: p.update_id,
            value: metric_value(p.value, &p.unit),
        })
        .collect();
    render(&rows, 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_empty_message() {
        colored::control::set_override(false);
        let msg = format_empty("capital calls");
        assert!(msg.contains("No capital calls found"));
    }

    #[test]
    fn test_money_with_and_without_symbols() {
        assert_eq!(money(dec!(1000), "USD", true), "$1,000.00");
        assert_eq!(money(dec!(1000), "USD", false), "USD 1,000.00");
    }

    #[test]
    fn test_metric_value_trims_zeros() {
        assert_eq!(metric_value(dec!(120.500), &Some("k".to_string())), "120.5 k");
        assert_eq!(metric_value(dec!(42), &None), "42");
    }
}
