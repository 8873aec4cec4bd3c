// Database module - SQLite connection, models and fund/LP/user records

pub mod models;

use anyhow::Context;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{LedgerError, Result};
use crate::utils;
pub use models::{
    CallStatus, CapitalCall, CapitalCallResponse, CompanyChanges, CompanyStatus, CompanyUpdate,
    Fund, FundChanges, FundStatus, Investment, LimitedPartner, LimitedPartnerChanges, LpType,
    Metric, NavCalculation, NavHolding, NewCompany, NewFund, NewInvestment, NewLimitedPartner,
    PortfolioCompany, ResponseStatus, Role, User, ValuationMethod,
};

/// Get the default database path (~/.fundbook/data.db)
pub fn get_default_db_path() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let fundbook_dir = PathBuf::from(home).join(".fundbook");

    // Create directory if it doesn't exist
    std::fs::create_dir_all(&fundbook_dir).context("Failed to create .fundbook directory")?;

    Ok(fundbook_dir.join("data.db"))
}

/// Open database connection
pub fn open_db(db_path: Option<PathBuf>) -> anyhow::Result<Connection> {
    let path = match db_path {
        Some(p) => p,
        None => get_default_db_path()?,
    };
    let conn = Connection::open(&path).context(format!("Failed to open database at {:?}", path))?;

    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("Failed to enable foreign keys")?;
    // Concurrent CLI invocations wait for the writer instead of failing
    conn.busy_timeout(Duration::from_secs(5))
        .context("Failed to set busy timeout")?;

    Ok(conn)
}

/// Initialize the database with schema
///
/// The schema is idempotent, so this is safe to run before every command.
pub fn init_database(db_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = match db_path {
        Some(p) => p,
        None => get_default_db_path()?,
    };

    debug!("Initializing database at: {:?}", path);

    let conn = open_db(Some(path))?;
    apply_schema(&conn)?;

    Ok(())
}

/// Run the schema SQL against an open connection
pub fn apply_schema(conn: &Connection) -> anyhow::Result<()> {
    let schema_sql = include_str!("schema.sql");
    conn.execute_batch(schema_sql)
        .context("Failed to execute schema")?;
    Ok(())
}

/// Start a write transaction that takes the database lock up front.
///
/// Multi-row writes (call + responses, payment + status) go through this so
/// they commit or roll back as a unit and later reads see the post-write rows.
pub fn begin_write(conn: &Connection) -> Result<rusqlite::Transaction<'_>> {
    Ok(rusqlite::Transaction::new_unchecked(
        conn,
        TransactionBehavior::Immediate,
    )?)
}

/// Helper to read Decimal from SQLite (handles both INTEGER, REAL and TEXT)
pub fn get_decimal_value(row: &Row, idx: usize) -> rusqlite::Result<Decimal> {
    use rusqlite::types::ValueRef;

    match row.get_ref(idx)? {
        ValueRef::Text(bytes) => {
            let s = std::str::from_utf8(bytes)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            Decimal::from_str(s).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
        }
        ValueRef::Integer(i) => Ok(Decimal::from(i)),
        ValueRef::Real(f) => {
            Decimal::try_from(f).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
        }
        _ => Err(rusqlite::Error::InvalidColumnType(
            idx,
            "decimal".to_string(),
            rusqlite::types::Type::Null,
        )),
    }
}

/// Helper to read optional Decimal from SQLite
pub fn get_optional_decimal_value(row: &Row, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    use rusqlite::types::ValueRef;

    match row.get_ref(idx)? {
        ValueRef::Null => Ok(None),
        _ => get_decimal_value(row, idx).map(Some),
    }
}

/// Helper to read a TEXT enum column through its `FromStr` impl
pub fn get_enum_value<T: FromStr>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unrecognized value '{}'", raw).into(),
        )
    })
}

fn require_non_empty(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LedgerError::validation(field, "must not be empty"));
    }
    Ok(())
}

// ============ Users ============

const USER_COLUMNS: &str = "id, email, name, role, created_at";

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        role: get_enum_value(row, 3)?,
        created_at: row.get(4)?,
    })
}

/// Insert a user, returns the new user
pub fn insert_user(conn: &Connection, email: &str, name: &str, role: Role) -> Result<User> {
    require_non_empty("email", email)?;
    require_non_empty("name", name)?;

    let email = email.trim().to_lowercase();
    if find_user_by_email(conn, &email)?.is_some() {
        return Err(LedgerError::validation(
            "email",
            format!("user '{}' already exists", email),
        ));
    }

    conn.execute(
        "INSERT INTO users (email, name, role) VALUES (?1, ?2, ?3)",
        params![email, name.trim(), role.as_str()],
    )?;
    let id = conn.last_insert_rowid();
    info!("Created user {} ({}) with role {}", id, email, role.as_str());

    get_user(conn, id)
}

pub fn get_user(conn: &Connection, id: i64) -> Result<User> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        [id],
        user_from_row,
    )
    .optional()?
    .ok_or_else(|| LedgerError::not_found("user", id))
}

pub fn find_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
            [email.trim().to_lowercase()],
            user_from_row,
        )
        .optional()?)
}

pub fn list_users(conn: &Connection) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))?;
    let users = stmt
        .query_map([], user_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(users)
}

pub fn count_users(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
}

// ============ Funds ============

const FUND_COLUMNS: &str =
    "id, name, target_size, vintage_year, status, currency, owner_id, created_at, updated_at";

fn fund_from_row(row: &Row) -> rusqlite::Result<Fund> {
    Ok(Fund {
        id: row.get(0)?,
        name: row.get(1)?,
        target_size: get_decimal_value(row, 2)?,
        vintage_year: row.get(3)?,
        status: get_enum_value(row, 4)?,
        currency: row.get(5)?,
        owner_id: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn validate_vintage(vintage_year: Option<i32>) -> Result<()> {
    match vintage_year {
        Some(year) if !(1900..=2100).contains(&year) => Err(LedgerError::validation(
            "vintage_year",
            format!("{} is not a plausible vintage year", year),
        )),
        _ => Ok(()),
    }
}

/// Insert fund, returns the stored record
pub fn create_fund(conn: &Connection, fund: &NewFund) -> Result<Fund> {
    require_non_empty("name", &fund.name)?;
    if fund.target_size < Decimal::ZERO {
        return Err(LedgerError::validation("target_size", "cannot be negative"));
    }
    validate_vintage(fund.vintage_year)?;
    let currency = utils::normalize_currency(&fund.currency)?;
    if let Some(owner_id) = fund.owner_id {
        get_user(conn, owner_id)?;
    }

    conn.execute(
        "INSERT INTO funds (name, target_size, vintage_year, status, currency, owner_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            fund.name.trim(),
            fund.target_size.to_string(),
            fund.vintage_year,
            fund.status.as_str(),
            currency,
            fund.owner_id,
        ],
    )?;
    let id = conn.last_insert_rowid();
    info!("Created fund {} '{}'", id, fund.name.trim());

    get_fund(conn, id)
}

pub fn get_fund(conn: &Connection, id: i64) -> Result<Fund> {
    conn.query_row(
        &format!("SELECT {} FROM funds WHERE id = ?1", FUND_COLUMNS),
        [id],
        fund_from_row,
    )
    .optional()?
    .ok_or_else(|| LedgerError::not_found("fund", id))
}

pub fn list_funds(conn: &Connection) -> Result<Vec<Fund>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM funds ORDER BY name COLLATE NOCASE, id",
        FUND_COLUMNS
    ))?;
    let funds = stmt
        .query_map([], fund_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(funds)
}

/// Apply a partial update to a fund
pub fn update_fund(conn: &Connection, id: i64, changes: &FundChanges) -> Result<Fund> {
    let mut fund = get_fund(conn, id)?;

    if let Some(name) = &changes.name {
        require_non_empty("name", name)?;
        fund.name = name.trim().to_string();
    }
    if let Some(target_size) = changes.target_size {
        if target_size < Decimal::ZERO {
            return Err(LedgerError::validation("target_size", "cannot be negative"));
        }
        fund.target_size = target_size;
    }
    if changes.vintage_year.is_some() {
        validate_vintage(changes.vintage_year)?;
        fund.vintage_year = changes.vintage_year;
    }
    if let Some(status) = changes.status {
        fund.status = status;
    }
    if let Some(owner_id) = changes.owner_id {
        get_user(conn, owner_id)?;
        fund.owner_id = Some(owner_id);
    }

    conn.execute(
        "UPDATE funds
         SET name = ?1, target_size = ?2, vintage_year = ?3, status = ?4, owner_id = ?5,
             updated_at = datetime('now')
         WHERE id = ?6",
        params![
            fund.name,
            fund.target_size.to_string(),
            fund.vintage_year,
            fund.status.as_str(),
            fund.owner_id,
            id,
        ],
    )?;
    info!("Updated fund {}", id);

    get_fund(conn, id)
}

/// Hard-delete a fund and everything it owns
pub fn delete_fund(conn: &Connection, id: i64) -> Result<()> {
    let deleted = conn.execute("DELETE FROM funds WHERE id = ?1", [id])?;
    if deleted == 0 {
        return Err(LedgerError::not_found("fund", id));
    }
    info!("Deleted fund {}", id);
    Ok(())
}

// ============ Limited partners ============

const LP_COLUMNS: &str = "id, fund_id, name, email, phone, lp_type, commitment, created_at";

fn lp_from_row(row: &Row) -> rusqlite::Result<LimitedPartner> {
    Ok(LimitedPartner {
        id: row.get(0)?,
        fund_id: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        lp_type: get_enum_value(row, 5)?,
        commitment: get_decimal_value(row, 6)?,
        created_at: row.get(7)?,
    })
}

/// Insert limited partner. Existing capital calls are not extended to it.
pub fn add_limited_partner(conn: &Connection, lp: &NewLimitedPartner) -> Result<LimitedPartner> {
    require_non_empty("name", &lp.name)?;
    if lp.commitment < Decimal::ZERO {
        return Err(LedgerError::validation("commitment", "cannot be negative"));
    }
    get_fund(conn, lp.fund_id)?;

    conn.execute(
        "INSERT INTO limited_partners (fund_id, name, email, phone, lp_type, commitment)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            lp.fund_id,
            lp.name.trim(),
            lp.email,
            lp.phone,
            lp.lp_type.as_str(),
            lp.commitment.to_string(),
        ],
    )?;
    let id = conn.last_insert_rowid();
    info!(
        "Added LP {} '{}' to fund {} with commitment {}",
        id,
        lp.name.trim(),
        lp.fund_id,
        lp.commitment
    );

    get_limited_partner(conn, id)
}

pub fn get_limited_partner(conn: &Connection, id: i64) -> Result<LimitedPartner> {
    conn.query_row(
        &format!("SELECT {} FROM limited_partners WHERE id = ?1", LP_COLUMNS),
        [id],
        lp_from_row,
    )
    .optional()?
    .ok_or_else(|| LedgerError::not_found("limited partner", id))
}

/// LPs of a fund in insertion order
pub fn list_limited_partners(conn: &Connection, fund_id: i64) -> Result<Vec<LimitedPartner>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM limited_partners WHERE fund_id = ?1 ORDER BY id",
        LP_COLUMNS
    ))?;
    let lps = stmt
        .query_map([fund_id], lp_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(lps)
}

/// Sum of LP commitments for a fund
pub fn total_commitments(conn: &Connection, fund_id: i64) -> Result<Decimal> {
    Ok(list_limited_partners(conn, fund_id)?
        .iter()
        .map(|lp| lp.commitment)
        .sum())
}

fn count_lp_responses(conn: &Connection, lp_id: i64) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM capital_call_responses WHERE lp_id = ?1",
        [lp_id],
        |row| row.get(0),
    )?)
}

/// Apply a partial update to a limited partner.
///
/// The commitment is frozen once any capital call references the LP, since
/// expected call amounts are derived from it.
pub fn update_limited_partner(
    conn: &Connection,
    id: i64,
    changes: &LimitedPartnerChanges,
) -> Result<LimitedPartner> {
    let mut lp = get_limited_partner(conn, id)?;

    if let Some(name) = &changes.name {
        require_non_empty("name", name)?;
        lp.name = name.trim().to_string();
    }
    if changes.email.is_some() {
        lp.email = changes.email.clone();
    }
    if changes.phone.is_some() {
        lp.phone = changes.phone.clone();
    }
    if let Some(lp_type) = changes.lp_type {
        lp.lp_type = lp_type;
    }
    if let Some(commitment) = changes.commitment {
        if commitment < Decimal::ZERO {
            return Err(LedgerError::validation("commitment", "cannot be negative"));
        }
        if commitment != lp.commitment && count_lp_responses(conn, id)? > 0 {
            return Err(LedgerError::validation(
                "commitment",
                "cannot change once capital calls reference this limited partner",
            ));
        }
        lp.commitment = commitment;
    }

    conn.execute(
        "UPDATE limited_partners
         SET name = ?1, email = ?2, phone = ?3, lp_type = ?4, commitment = ?5
         WHERE id = ?6",
        params![
            lp.name,
            lp.email,
            lp.phone,
            lp.lp_type.as_str(),
            lp.commitment.to_string(),
            id,
        ],
    )?;
    info!("Updated LP {}", id);

    get_limited_partner(conn, id)
}
