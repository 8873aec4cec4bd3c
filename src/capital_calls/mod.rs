//! Capital-call accounting
//!
//! A capital call asks every LP of a fund for the same percentage of its
//! commitment. Creating a call snapshots the fund's current LPs into one
//! response row each; payments update a response and the call's aggregate
//! status is re-derived from the sum of all responses.

pub mod statement;

use chrono::{Local, NaiveDate};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::db::{
    self, get_decimal_value, get_enum_value, CallStatus, CapitalCall, CapitalCallResponse,
    ResponseStatus,
};
use crate::error::{LedgerError, Result};

pub use statement::{
    fund_capital_summary, generate_lp_statement, FundCapitalSummary, LpStatement,
    StatementLine,
};

/// Largest gap tolerated between a supplied amount and percentage × commitments
const AMOUNT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Amount an LP owes for a call, in cents
///
/// Derived percentages carry 28 digits, so the raw product can sit a hair
/// above the real obligation. Every status and statement uses this value.
pub fn expected_amount(commitment: Decimal, percentage: Decimal) -> Decimal {
    (commitment * percentage / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Status of a single LP's response given what it paid and what it owes
pub fn derive_response_status(amount_paid: Decimal, expected: Decimal) -> ResponseStatus {
    if amount_paid >= expected {
        ResponseStatus::Paid
    } else {
        ResponseStatus::PartiallyPaid
    }
}

/// Aggregate call status from the total paid across responses.
///
/// Any payment at all moves the call out of PENDING/OVERDUE, even when some
/// LPs have not paid.
pub fn derive_call_status(
    total_paid: Decimal,
    amount: Decimal,
    due_date: NaiveDate,
    today: NaiveDate,
) -> CallStatus {
    if total_paid >= amount {
        CallStatus::FullyPaid
    } else if total_paid > Decimal::ZERO {
        CallStatus::PartiallyPaid
    } else if today > due_date {
        CallStatus::Overdue
    } else {
        CallStatus::Pending
    }
}

/// Call status from its stored responses.
///
/// A call whose every response is PAID is fully paid even when the
/// cent-rounded shares add up to slightly less than the call amount.
pub(crate) fn call_status_from_responses(
    call: &CapitalCall,
    responses: &[CapitalCallResponse],
    today: NaiveDate,
) -> CallStatus {
    let all_paid = !responses.is_empty()
        && responses
            .iter()
            .all(|r| r.status == ResponseStatus::Paid);
    if all_paid {
        CallStatus::FullyPaid
    } else {
        derive_call_status(sum_paid(responses), call.amount, call.due_date, today)
    }
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Inputs for a new capital call
#[derive(Debug, Clone)]
pub struct NewCapitalCall {
    pub fund_id: i64,
    pub amount: Decimal,
    pub call_date: NaiveDate,
    pub due_date: NaiveDate,
    /// Derived from the fund's commitments when omitted
    pub percentage: Option<Decimal>,
    pub description: Option<String>,
}

/// A response joined with its LP, for display and statements
#[derive(Debug, Clone, Serialize)]
pub struct ResponseDetail {
    #[serde(flatten)]
    pub response: CapitalCallResponse,
    pub lp_name: String,
    pub commitment: Decimal,
    pub expected_amount: Decimal,
}

/// A call with its responses and the status derived as of a date
#[derive(Debug, Clone, Serialize)]
pub struct CallDetail {
    #[serde(flatten)]
    pub call: CapitalCall,
    pub total_paid: Decimal,
    pub responses: Vec<ResponseDetail>,
}

const CALL_COLUMNS: &str =
    "id, fund_id, call_date, due_date, amount, percentage, description, status, created_at";

fn call_from_row(row: &Row) -> rusqlite::Result<CapitalCall> {
    Ok(CapitalCall {
        id: row.get(0)?,
        fund_id: row.get(1)?,
        call_date: row.get(2)?,
        due_date: row.get(3)?,
        amount: get_decimal_value(row, 4)?,
        percentage: get_decimal_value(row, 5)?,
        description: row.get(6)?,
        status: get_enum_value(row, 7)?,
        created_at: row.get(8)?,
    })
}

const RESPONSE_COLUMNS: &str = "id, capital_call_id, lp_id, amount_paid, date_paid, status, notes";

fn response_from_row(row: &Row) -> rusqlite::Result<CapitalCallResponse> {
    Ok(CapitalCallResponse {
        id: row.get(0)?,
        capital_call_id: row.get(1)?,
        lp_id: row.get(2)?,
        amount_paid: get_decimal_value(row, 3)?,
        date_paid: row.get(4)?,
        status: get_enum_value(row, 5)?,
        notes: row.get(6)?,
    })
}

/// Create a capital call and one pending response per current LP.
///
/// Both writes happen in one transaction, so a call never exists without its
/// responses. LPs added to the fund later are not included.
pub fn create_capital_call(conn: &Connection, new_call: &NewCapitalCall) -> Result<CapitalCall> {
    if new_call.amount <= Decimal::ZERO {
        return Err(LedgerError::validation("amount", "must be greater than zero"));
    }
    if new_call.due_date < new_call.call_date {
        return Err(LedgerError::validation(
            "due_date",
            "cannot be before the call date",
        ));
    }
    if let Some(pct) = new_call.percentage {
        if pct <= Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
            return Err(LedgerError::validation(
                "percentage",
                "must be greater than 0 and at most 100",
            ));
        }
    }

    let tx = db::begin_write(conn)?;

    db::get_fund(&tx, new_call.fund_id)?;
    let lps = db::list_limited_partners(&tx, new_call.fund_id)?;
    let total_commitment: Decimal = lps.iter().map(|lp| lp.commitment).sum();

    let percentage = match new_call.percentage {
        Some(pct) => {
            if total_commitment > Decimal::ZERO {
                let implied = expected_amount(total_commitment, pct);
                if (implied - new_call.amount).abs() > AMOUNT_TOLERANCE {
                    return Err(LedgerError::ArithmeticAmbiguity(format!(
                        "{}% of commitments {} is {}, but the call amount is {}",
                        pct, total_commitment, implied, new_call.amount
                    )));
                }
            }
            pct
        }
        None => {
            if total_commitment <= Decimal::ZERO {
                return Err(LedgerError::NoCommitments {
                    fund_id: new_call.fund_id,
                });
            }
            let derived = new_call.amount / total_commitment * Decimal::ONE_HUNDRED;
            if derived > Decimal::ONE_HUNDRED {
                return Err(LedgerError::validation(
                    "amount",
                    format!(
                        "{} exceeds the fund's total commitments of {}",
                        new_call.amount, total_commitment
                    ),
                ));
            }
            derived
        }
    };

    tx.execute(
        "INSERT INTO capital_calls (fund_id, call_date, due_date, amount, percentage, description, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            new_call.fund_id,
            new_call.call_date,
            new_call.due_date,
            new_call.amount.to_string(),
            percentage.to_string(),
            new_call.description,
            CallStatus::Pending.as_str(),
        ],
    )?;
    let call_id = tx.last_insert_rowid();

    {
        let mut stmt = tx.prepare(
            "INSERT INTO capital_call_responses (capital_call_id, lp_id, amount_paid, status)
             VALUES (?1, ?2, '0', ?3)",
        )?;
        for lp in &lps {
            stmt.execute(params![call_id, lp.id, ResponseStatus::Pending.as_str()])?;
        }
    }

    let call = get_call_record(&tx, call_id)?;
    tx.commit()?;

    info!(
        "Created capital call {} for fund {}: {} ({}%) across {} LPs",
        call.id,
        call.fund_id,
        call.amount,
        call.percentage,
        lps.len()
    );
    Ok(call)
}

/// Load the stored call row without re-deriving its status
pub fn get_call_record(conn: &Connection, capital_call_id: i64) -> Result<CapitalCall> {
    conn.query_row(
        &format!("SELECT {} FROM capital_calls WHERE id = ?1", CALL_COLUMNS),
        [capital_call_id],
        call_from_row,
    )
    .optional()?
    .ok_or_else(|| LedgerError::not_found("capital call", capital_call_id))
}

pub fn list_call_responses(
    conn: &Connection,
    capital_call_id: i64,
) -> Result<Vec<CapitalCallResponse>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM capital_call_responses WHERE capital_call_id = ?1 ORDER BY lp_id",
        RESPONSE_COLUMNS
    ))?;
    let responses = stmt
        .query_map([capital_call_id], response_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(responses)
}

fn find_response(
    conn: &Connection,
    capital_call_id: i64,
    lp_id: i64,
) -> Result<Option<CapitalCallResponse>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {} FROM capital_call_responses WHERE capital_call_id = ?1 AND lp_id = ?2",
                RESPONSE_COLUMNS
            ),
            params![capital_call_id, lp_id],
            response_from_row,
        )
        .optional()?)
}

/// Payment reported by an LP against a call
#[derive(Debug, Clone)]
pub struct Payment {
    pub capital_call_id: i64,
    pub lp_id: i64,
    /// Cumulative amount the LP has paid for this call
    pub amount_paid: Decimal,
    pub date_paid: NaiveDate,
    pub notes: Option<String>,
}

/// Record an LP payment and recompute the call status.
///
/// `amount_paid` replaces the previously recorded figure, so recording the
/// same payment twice leaves the response and call unchanged.
pub fn record_payment(conn: &Connection, payment: &Payment) -> Result<CapitalCallResponse> {
    record_payment_as_of(conn, payment, today())
}

pub fn record_payment_as_of(
    conn: &Connection,
    payment: &Payment,
    today: NaiveDate,
) -> Result<CapitalCallResponse> {
    if payment.amount_paid <= Decimal::ZERO {
        return Err(LedgerError::validation(
            "amount_paid",
            "must be greater than zero",
        ));
    }

    let tx = db::begin_write(conn)?;

    let call = get_call_record(&tx, payment.capital_call_id)?;
    let lp = db::get_limited_partner(&tx, payment.lp_id)?;
    let response = find_response(&tx, call.id, lp.id)?.ok_or_else(|| {
        warn!(
            "LP {} has no response row for capital call {}",
            lp.id, call.id
        );
        LedgerError::ResponseNotFound {
            capital_call_id: call.id,
            lp_id: lp.id,
        }
    })?;

    let expected = expected_amount(lp.commitment, call.percentage);
    let status = derive_response_status(payment.amount_paid, expected);
    debug!(
        "LP {} paid {} of expected {} for call {} -> {}",
        lp.id,
        payment.amount_paid,
        expected,
        call.id,
        status.as_str()
    );

    // Notes are kept when a correction is recorded without new ones
    tx.execute(
        "UPDATE capital_call_responses
         SET amount_paid = ?1, date_paid = ?2, status = ?3, notes = COALESCE(?4, notes)
         WHERE id = ?5",
        params![
            payment.amount_paid.to_string(),
            payment.date_paid,
            status.as_str(),
            payment.notes,
            response.id,
        ],
    )?;

    let call_status = recompute_call_status_as_of(&tx, call.id, today)?;
    let updated = find_response(&tx, call.id, lp.id)?
        .ok_or_else(|| LedgerError::ResponseNotFound {
            capital_call_id: call.id,
            lp_id: lp.id,
        })?;
    tx.commit()?;

    info!(
        "Recorded payment of {} from LP {} on call {} (call now {})",
        payment.amount_paid,
        lp.id,
        call.id,
        call_status.as_str()
    );
    Ok(updated)
}

fn sum_paid(responses: &[CapitalCallResponse]) -> Decimal {
    responses.iter().map(|r| r.amount_paid).sum()
}

/// Re-derive and persist a call's status as of today
pub fn recompute_call_status(conn: &Connection, capital_call_id: i64) -> Result<CallStatus> {
    recompute_call_status_as_of(conn, capital_call_id, today())
}

/// Re-derive and persist a call's status from the stored responses.
///
/// Idempotent: running it again without new payments yields the same status.
pub fn recompute_call_status_as_of(
    conn: &Connection,
    capital_call_id: i64,
    today: NaiveDate,
) -> Result<CallStatus> {
    let call = get_call_record(conn, capital_call_id)?;
    let responses = list_call_responses(conn, capital_call_id)?;
    let status = call_status_from_responses(&call, &responses, today);

    if status != call.status {
        conn.execute(
            "UPDATE capital_calls SET status = ?1 WHERE id = ?2",
            params![status.as_str(), capital_call_id],
        )?;
        debug!(
            "Capital call {} status {} -> {}",
            capital_call_id,
            call.status.as_str(),
            status.as_str()
        );
    }

    Ok(status)
}

/// Persist fresh statuses for every call (optionally one fund's), returning
/// the calls whose status changed.
pub fn sweep_call_statuses(
    conn: &Connection,
    fund_id: Option<i64>,
    today: NaiveDate,
) -> Result<Vec<CapitalCall>> {
    let tx = db::begin_write(conn)?;

    let calls = match fund_id {
        Some(id) => list_call_records(&tx, id)?,
        None => {
            let mut stmt = tx.prepare(&format!(
                "SELECT {} FROM capital_calls ORDER BY id",
                CALL_COLUMNS
            ))?;
            let calls = stmt
                .query_map([], call_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            calls
        }
    };

    let mut changed = Vec::new();
    for call in calls {
        let status = recompute_call_status_as_of(&tx, call.id, today)?;
        if status != call.status {
            changed.push(get_call_record(&tx, call.id)?);
        }
    }
    tx.commit()?;

    info!("Status sweep updated {} capital calls", changed.len());
    Ok(changed)
}

fn list_call_records(conn: &Connection, fund_id: i64) -> Result<Vec<CapitalCall>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM capital_calls WHERE fund_id = ?1 ORDER BY call_date, id",
        CALL_COLUMNS
    ))?;
    let calls = stmt
        .query_map([fund_id], call_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(calls)
}

/// Build the detail view of a call, deriving its status as of `today`.
///
/// Reads never write; the derived status covers calls that went overdue
/// since their last payment.
pub fn get_capital_call(
    conn: &Connection,
    capital_call_id: i64,
    today: NaiveDate,
) -> Result<CallDetail> {
    let call = get_call_record(conn, capital_call_id)?;
    build_detail(conn, call, today)
}

fn build_detail(conn: &Connection, mut call: CapitalCall, today: NaiveDate) -> Result<CallDetail> {
    let responses = list_call_responses(conn, call.id)?;
    let total_paid = sum_paid(&responses);
    call.status = call_status_from_responses(&call, &responses, today);

    let mut details = Vec::with_capacity(responses.len());
    for response in responses {
        let lp = db::get_limited_partner(conn, response.lp_id)?;
        details.push(ResponseDetail {
            expected_amount: expected_amount(lp.commitment, call.percentage),
            lp_name: lp.name,
            commitment: lp.commitment,
            response,
        });
    }

    Ok(CallDetail {
        call,
        total_paid,
        responses: details,
    })
}

/// Calls of a fund, oldest first, with statuses derived as of `today`
pub fn list_capital_calls(
    conn: &Connection,
    fund_id: i64,
    today: NaiveDate,
) -> Result<Vec<CallDetail>> {
    db::get_fund(conn, fund_id)?;
    list_call_records(conn, fund_id)?
        .into_iter()
        .map(|call| build_detail(conn, call, today))
        .collect()
}
