//! Company updates and their metric time series
//!
//! Updates are append-only. Listings are newest first; metric history is
//! oldest first so it can feed trend charts directly.

use chrono::NaiveDate;
use itertools::Itertools;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

use super::get_company;
use crate::db::{self, get_decimal_value, CompanyUpdate, Metric};
use crate::error::{LedgerError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUpdate {
    pub company_id: i64,
    pub date: NaiveDate,
    pub title: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub metrics: Vec<Metric>,
}

/// Most recent value of one metric
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LatestMetric {
    pub name: String,
    pub value: Decimal,
    pub unit: Option<String>,
    pub date: NaiveDate,
    pub update_id: i64,
}

/// One observation in a metric's history
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetricPoint {
    pub update_id: i64,
    pub date: NaiveDate,
    pub name: String,
    pub value: Decimal,
    pub unit: Option<String>,
}

fn validate_metrics(metrics: &[Metric], existing: &HashSet<String>) -> Result<()> {
    let mut seen = HashSet::new();
    for metric in metrics {
        let name = metric.name.trim();
        if name.is_empty() {
            return Err(LedgerError::validation("metrics", "metric name must not be empty"));
        }
        if existing.contains(name) || !seen.insert(name.to_string()) {
            return Err(LedgerError::validation(
                "metrics",
                format!("metric '{}' appears more than once in the update", name),
            ));
        }
    }
    Ok(())
}

fn insert_metrics(conn: &Connection, update_id: i64, metrics: &[Metric]) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO update_metrics (update_id, name, value, unit) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for metric in metrics {
        stmt.execute(params![
            update_id,
            metric.name.trim(),
            metric.value.to_string(),
            metric.unit,
        ])?;
    }
    Ok(())
}

fn load_metrics(conn: &Connection, update_id: i64) -> Result<Vec<Metric>> {
    let mut stmt =
        conn.prepare("SELECT name, value, unit FROM update_metrics WHERE update_id = ?1 ORDER BY id")?;
    let metrics = stmt
        .query_map([update_id], |row| {
            Ok(Metric {
                name: row.get(0)?,
                value: get_decimal_value(row, 1)?,
                unit: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(metrics)
}

const UPDATE_COLUMNS: &str = "id, company_id, update_date, title, notes, created_at";

fn update_from_row(row: &Row) -> rusqlite::Result<CompanyUpdate> {
    Ok(CompanyUpdate {
        id: row.get(0)?,
        company_id: row.get(1)?,
        date: row.get(2)?,
        title: row.get(3)?,
        notes: row.get(4)?,
        metrics: Vec::new(),
        created_at: row.get(5)?,
    })
}

pub fn get_update(conn: &Connection, update_id: i64) -> Result<CompanyUpdate> {
    let mut update = conn
        .query_row(
            &format!("SELECT {} FROM company_updates WHERE id = ?1", UPDATE_COLUMNS),
            [update_id],
            update_from_row,
        )
        .optional()?
        .ok_or_else(|| LedgerError::not_found("update", update_id))?;
    update.metrics = load_metrics(conn, update_id)?;
    Ok(update)
}

/// Record a company update together with its metrics
pub fn create_update(conn: &Connection, new_update: &NewUpdate) -> Result<CompanyUpdate> {
    if new_update.title.trim().is_empty() {
        return Err(LedgerError::validation("title", "must not be empty"));
    }
    validate_metrics(&new_update.metrics, &HashSet::new())?;

    let tx = db::begin_write(conn)?;
    get_company(&tx, new_update.company_id)?;

    tx.execute(
        "INSERT INTO company_updates (company_id, update_date, title, notes)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            new_update.company_id,
            new_update.date,
            new_update.title.trim(),
            new_update.notes,
        ],
    )?;
    let update_id = tx.last_insert_rowid();
    insert_metrics(&tx, update_id, &new_update.metrics)?;

    let update = get_update(&tx, update_id)?;
    tx.commit()?;

    info!(
        "Created update {} for company {} with {} metrics",
        update_id,
        new_update.company_id,
        update.metrics.len()
    );
    Ok(update)
}

/// Append metrics to an existing update; names already present are rejected
pub fn add_metrics_to_update(
    conn: &Connection,
    update_id: i64,
    metrics: &[Metric],
) -> Result<CompanyUpdate> {
    let tx = db::begin_write(conn)?;
    let existing: HashSet<String> = get_update(&tx, update_id)?
        .metrics
        .into_iter()
        .map(|m| m.name)
        .collect();
    validate_metrics(metrics, &existing)?;

    insert_metrics(&tx, update_id, metrics)?;
    let update = get_update(&tx, update_id)?;
    tx.commit()?;

    info!("Added {} metrics to update {}", metrics.len(), update_id);
    Ok(update)
}

/// Updates for a company, newest first, optionally within `[start, end]`
pub fn list_updates(
    conn: &Connection,
    company_id: i64,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<Vec<CompanyUpdate>> {
    get_company(conn, company_id)?;

    let mut sql = format!(
        "SELECT {} FROM company_updates WHERE company_id = ?",
        UPDATE_COLUMNS
    );
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(company_id)];
    if let Some(s) = start {
        sql.push_str(" AND update_date >= ?");
        params.push(Box::new(s));
    }
    if let Some(e) = end {
        sql.push_str(" AND update_date <= ?");
        params.push(Box::new(e));
    }
    sql.push_str(" ORDER BY update_date DESC, id DESC");

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let mut updates = stmt
        .query_map(param_refs.as_slice(), update_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for update in &mut updates {
        update.metrics = load_metrics(conn, update.id)?;
    }
    Ok(updates)
}

fn metric_points(conn: &Connection, company_id: i64) -> Result<Vec<MetricPoint>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.update_date, m.name, m.value, m.unit
         FROM update_metrics m
         JOIN company_updates u ON u.id = m.update_id
         WHERE u.company_id = ?1
         ORDER BY u.update_date ASC, u.id ASC, m.id ASC",
    )?;
    let points = stmt
        .query_map([company_id], |row| {
            Ok(MetricPoint {
                update_id: row.get(0)?,
                date: row.get(1)?,
                name: row.get(2)?,
                value: get_decimal_value(row, 3)?,
                unit: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(points)
}

/// Latest value of every metric a company has reported, sorted by name
pub fn get_latest_metrics(conn: &Connection, company_id: i64) -> Result<Vec<LatestMetric>> {
    get_company(conn, company_id)?;

    // Points arrive oldest first, so the last point per name wins
    let latest = metric_points(conn, company_id)?
        .into_iter()
        .into_group_map_by(|p| p.name.clone())
        .into_iter()
        .filter_map(|(_, points)| points.into_iter().last())
        .map(|p| LatestMetric {
            name: p.name,
            value: p.value,
            unit: p.unit,
            date: p.date,
            update_id: p.update_id,
        })
        .sorted_by(|a, b| a.name.cmp(&b.name))
        .collect();
    Ok(latest)
}

/// History of a company's metrics, oldest first
pub fn get_metric_history(
    conn: &Connection,
    company_id: i64,
    metric_name: Option<&str>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<Vec<MetricPoint>> {
    get_company(conn, company_id)?;

    Ok(metric_points(conn, company_id)?
        .into_iter()
        .filter(|p| metric_name.map_or(true, |name| p.name == name))
        .filter(|p| start.map_or(true, |s| p.date >= s))
        .filter(|p| end.map_or(true, |e| p.date <= e))
        .collect())
}
