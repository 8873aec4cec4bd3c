//! LP capital-account statements and fund-level capital summaries
//!
//! An LP's called capital is the sum of its own expected amounts
//! (commitment × call percentage) over the calls it was included in. The
//! call's absolute amount is a fund-level figure and is only used for the
//! fund summary.

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use super::{expected_amount, list_call_records, list_call_responses, today};
use crate::db::{self, get_decimal_value, get_enum_value, NavCalculation, ResponseStatus};
use crate::error::{LedgerError, Result};
use crate::nav;

/// One call as seen from an LP's capital account
#[derive(Debug, Clone, Serialize)]
pub struct StatementLine {
    pub capital_call_id: i64,
    pub call_date: NaiveDate,
    pub due_date: NaiveDate,
    pub percentage: Decimal,
    pub expected_amount: Decimal,
    pub amount_paid: Decimal,
    pub date_paid: Option<NaiveDate>,
    pub status: ResponseStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct LpStatement {
    pub lp_id: i64,
    pub lp_name: String,
    pub fund_id: i64,
    pub fund_name: String,
    pub currency: String,
    pub commitment: Decimal,
    pub total_called: Decimal,
    pub total_paid: Decimal,
    /// Called but not yet paid
    pub outstanding_balance: Decimal,
    /// Commitment not yet called
    pub remaining_commitment: Decimal,
    pub call_history: Vec<StatementLine>,
}

/// Capital account statement for one LP in one fund
pub fn generate_lp_statement(conn: &Connection, lp_id: i64, fund_id: i64) -> Result<LpStatement> {
    let fund = db::get_fund(conn, fund_id)?;
    let lp = db::get_limited_partner(conn, lp_id)?;
    if lp.fund_id != fund.id {
        return Err(LedgerError::not_found("limited partner", lp_id));
    }

    let mut stmt = conn.prepare(
        "SELECT c.id, c.call_date, c.due_date, c.percentage, r.amount_paid, r.date_paid, r.status
         FROM capital_call_responses r
         JOIN capital_calls c ON c.id = r.capital_call_id
         WHERE r.lp_id = ?1 AND c.fund_id = ?2
         ORDER BY c.call_date ASC, c.id ASC",
    )?;

    let call_history = stmt
        .query_map(params![lp_id, fund_id], |row| {
            let percentage = get_decimal_value(row, 3)?;
            Ok(StatementLine {
                capital_call_id: row.get(0)?,
                call_date: row.get(1)?,
                due_date: row.get(2)?,
                percentage,
                expected_amount: expected_amount(lp.commitment, percentage),
                amount_paid: get_decimal_value(row, 4)?,
                date_paid: row.get(5)?,
                status: get_enum_value(row, 6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let total_called: Decimal = call_history.iter().map(|l| l.expected_amount).sum();
    let total_paid: Decimal = call_history.iter().map(|l| l.amount_paid).sum();

    debug!(
        "Statement for LP {} in fund {}: called {}, paid {}",
        lp_id, fund_id, total_called, total_paid
    );

    Ok(LpStatement {
        lp_id: lp.id,
        lp_name: lp.name,
        fund_id: fund.id,
        fund_name: fund.name,
        currency: fund.currency,
        commitment: lp.commitment,
        outstanding_balance: total_called - total_paid,
        remaining_commitment: lp.commitment - total_called,
        total_called,
        total_paid,
        call_history,
    })
}

/// Fund-wide view of commitments, calls and payments
#[derive(Debug, Clone, Serialize)]
pub struct FundCapitalSummary {
    pub fund_id: i64,
    pub fund_name: String,
    pub currency: String,
    pub lp_count: usize,
    pub total_commitments: Decimal,
    pub call_count: usize,
    pub open_calls: usize,
    pub total_called: Decimal,
    pub total_paid: Decimal,
    pub outstanding: Decimal,
    pub uncalled_commitment: Decimal,
    pub latest_nav: Option<NavCalculation>,
}

pub fn fund_capital_summary(conn: &Connection, fund_id: i64) -> Result<FundCapitalSummary> {
    let fund = db::get_fund(conn, fund_id)?;
    let lps = db::list_limited_partners(conn, fund_id)?;
    let calls = list_call_records(conn, fund_id)?;
    let today = today();

    let total_commitments: Decimal = lps.iter().map(|lp| lp.commitment).sum();
    let total_called: Decimal = calls.iter().map(|c| c.amount).sum();

    let mut total_paid = Decimal::ZERO;
    let mut open_calls = 0;
    for call in &calls {
        let responses = list_call_responses(conn, call.id)?;
        if super::call_status_from_responses(call, &responses, today) != db::CallStatus::FullyPaid
        {
            open_calls += 1;
        }
        total_paid += responses.iter().map(|r| r.amount_paid).sum::<Decimal>();
    }

    Ok(FundCapitalSummary {
        fund_id: fund.id,
        fund_name: fund.name,
        currency: fund.currency,
        lp_count: lps.len(),
        total_commitments,
        call_count: calls.len(),
        open_calls,
        total_called,
        total_paid,
        outstanding: total_called - total_paid,
        uncalled_commitment: total_commitments - total_called,
        latest_nav: nav::get_latest_nav(conn, fund_id)?,
    })
}
