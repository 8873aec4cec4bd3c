use anyhow::{bail, Result};

use super::{parse_date_arg, parse_decimal_arg, parse_optional_date_arg, Context};
use crate::cli::{formatters, NavCommands};
use fundbook::auth;
use fundbook::db::{NavHolding, ValuationMethod};
use fundbook::nav;
use fundbook::utils::parse_enum;

/// Parse `COMPANY_ID:VALUE[:METHOD]`; the method defaults to LAST_ROUND
fn parse_holding(raw: &str) -> Result<NavHolding> {
    let parts: Vec<&str> = raw.split(':').map(str::trim).collect();
    if parts.len() < 2 || parts.len() > 3 {
        bail!(
            "Invalid holding '{}': expected COMPANY_ID:VALUE[:METHOD]",
            raw
        );
    }
    let company_id: i64 = parts[0]
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid company id in holding '{}'", raw))?;
    let method = match parts.get(2) {
        Some(m) => parse_enum("method", m)?,
        None => ValuationMethod::LastRound,
    };

    Ok(NavHolding {
        company_id,
        value: parse_decimal_arg("value", parts[1])?,
        method,
        notes: None,
    })
}

pub async fn dispatch_nav(action: NavCommands, ctx: &Context) -> Result<()> {
    let conn = ctx.open()?;
    let user = ctx.current_user(&conn)?;

    match action {
        NavCommands::Calculate {
            fund_id,
            date,
            holdings,
            currency,
        } => {
            let fund = auth::require_fund_mutation(&conn, &user, fund_id)?;
            let holdings = holdings
                .iter()
                .map(|h| parse_holding(h))
                .collect::<Result<Vec<_>>>()?;
            let calculation = nav::calculate_nav(
                &conn,
                fund_id,
                parse_date_arg("date", &date)?,
                &holdings,
                &currency.unwrap_or(fund.currency),
            )?;
            ctx.emit(&calculation, |c| formatters::format_nav_detail(c, ctx.symbols()))
        }
        NavCommands::List { fund_id } => {
            auth::require_fund_view(&conn, &user, fund_id)?;
            let calculations = nav::list_calculations(&conn, fund_id)?;
            if calculations.is_empty() && !ctx.json_output {
                println!("{}", formatters::format_empty("NAV calculations"));
                return Ok(());
            }
            ctx.emit(&calculations, |c| formatters::format_nav_table(c, ctx.symbols()))
        }
        NavCommands::Latest { fund_id } => {
            auth::require_fund_view(&conn, &user, fund_id)?;
            match nav::get_latest_nav(&conn, fund_id)? {
                Some(latest) => {
                    ctx.emit(&latest, |c| formatters::format_nav_detail(c, ctx.symbols()))
                }
                None if ctx.json_output => {
                    println!("null");
                    Ok(())
                }
                None => {
                    println!("{}", formatters::format_empty("NAV calculations"));
                    Ok(())
                }
            }
        }
        NavCommands::History { fund_id, from, to } => {
            auth::require_fund_view(&conn, &user, fund_id)?;
            let history = nav::get_historical_nav(
                &conn,
                fund_id,
                parse_date_arg("start", &from)?,
                parse_date_arg("end", &to)?,
            )?;
            if history.is_empty() && !ctx.json_output {
                println!("{}", formatters::format_empty("NAV calculations in range"));
                return Ok(());
            }
            ctx.emit(&history, |c| formatters::format_nav_table(c, ctx.symbols()))
        }
        NavCommands::Valuation { company_id, as_of } => {
            let as_of = parse_optional_date_arg("as_of", as_of.as_deref())?;
            let valuation = nav::get_company_valuation(&conn, company_id, as_of)?;
            ctx.emit(&valuation, |v| match v {
                Some(v) => format!(
                    "Company {} valued at {} ({}) in NAV {} on {}",
                    v.company_id,
                    formatters::money(v.holding.value, &v.currency, ctx.symbols()),
                    v.holding.method.as_str(),
                    v.nav_id,
                    v.date
                ),
                None => formatters::format_empty("valuations"),
            })
        }
    }
}
