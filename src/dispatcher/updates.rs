use anyhow::{bail, Result};

use super::{parse_date_arg, parse_decimal_arg, parse_optional_date_arg, Context};
use crate::cli::{formatters, UpdateCommands};
use fundbook::auth;
use fundbook::db::Metric;
use fundbook::portfolio::{self, NewUpdate};

/// Parse `NAME=VALUE[:UNIT]`
fn parse_metric(raw: &str) -> Result<Metric> {
    let Some((name, rest)) = raw.split_once('=') else {
        bail!("Invalid metric '{}': expected NAME=VALUE[:UNIT]", raw);
    };
    let (value, unit) = match rest.split_once(':') {
        Some((value, unit)) if !unit.trim().is_empty() => (value, Some(unit.trim().to_string())),
        Some((value, _)) => (value, None),
        None => (rest, None),
    };

    Ok(Metric {
        name: name.trim().to_string(),
        value: parse_decimal_arg("metrics", value)?,
        unit,
    })
}

fn parse_metrics(specs: &[String]) -> Result<Vec<Metric>> {
    specs.iter().map(|s| parse_metric(s)).collect()
}

pub async fn dispatch_updates(action: UpdateCommands, ctx: &Context) -> Result<()> {
    let conn = ctx.open()?;
    let user = ctx.current_user(&conn)?;

    match action {
        UpdateCommands::Create {
            company_id,
            date,
            title,
            notes,
            metrics,
        } => {
            auth::require(&user, auth::can_edit_portfolio(&user), "create company update")?;
            let update = portfolio::create_update(
                &conn,
                &NewUpdate {
                    company_id,
                    date: parse_date_arg("date", &date)?,
                    title,
                    notes,
                    metrics: parse_metrics(&metrics)?,
                },
            )?;
            ctx.emit(&update, |u| {
                formatters::format_success(&format!(
                    "Recorded update {} '{}' with {} metrics",
                    u.id,
                    u.title,
                    u.metrics.len()
                ))
            })
        }
        UpdateCommands::AddMetrics { update_id, metrics } => {
            auth::require(&user, auth::can_edit_portfolio(&user), "add metrics")?;
            let update = portfolio::add_metrics_to_update(&conn, update_id, &parse_metrics(&metrics)?)?;
            ctx.emit(&update, |u| formatters::format_updates_table(std::slice::from_ref(u)))
        }
        UpdateCommands::List {
            company_id,
            from,
            to,
        } => {
            let updates = portfolio::list_updates(
                &conn,
                company_id,
                parse_optional_date_arg("start", from.as_deref())?,
                parse_optional_date_arg("end", to.as_deref())?,
            )?;
            if updates.is_empty() && !ctx.json_output {
                println!("{}", formatters::format_empty("updates"));
                return Ok(());
            }
            ctx.emit(&updates, |u| formatters::format_updates_table(u))
        }
        UpdateCommands::Latest { company_id } => {
            let latest = portfolio::get_latest_metrics(&conn, company_id)?;
            if latest.is_empty() && !ctx.json_output {
                println!("{}", formatters::format_empty("metrics"));
                return Ok(());
            }
            ctx.emit(&latest, |m| formatters::format_latest_metrics(m))
        }
        UpdateCommands::History {
            company_id,
            metric,
            from,
            to,
        } => {
            let history = portfolio::get_metric_history(
                &conn,
                company_id,
                metric.as_deref(),
                parse_optional_date_arg("start", from.as_deref())?,
                parse_optional_date_arg("end", to.as_deref())?,
            )?;
            if history.is_empty() && !ctx.json_output {
                println!("{}", formatters::format_empty("metric history"));
                return Ok(());
            }
            ctx.emit(&history, |h| formatters::format_metric_history(h))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_metric_with_unit() {
        let metric = parse_metric("ARR=1,200,000:USD").unwrap();
        assert_eq!(metric.name, "ARR");
        assert_eq!(metric.value, dec!(1200000));
        assert_eq!(metric.unit.as_deref(), Some("USD"));
    }

    #[test]
    fn test_parse_metric_without_unit() {
        let metric = parse_metric("headcount=42").unwrap();
        assert_eq!(metric.value, dec!(42));
        assert!(metric.unit.is_none());
    }

    #[test]
    fn test_parse_metric_requires_equals() {
        assert!(parse_metric("headcount").is_err());
        assert!(parse_metric("headcount=many").is_err());
    }
}
