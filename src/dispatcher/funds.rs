use anyhow::{Context as _, Result};
use colored::Colorize;
use std::path::Path;
use tracing::info;

use super::{parse_decimal_arg, parse_optional_decimal_arg, Context};
use crate::cli::{formatters, FundCommands, LpCommands};
use fundbook::auth;
use fundbook::capital_calls::{self, LpStatement};
use fundbook::db::{self, FundChanges, LimitedPartnerChanges, NewFund, NewLimitedPartner, Role};
use fundbook::utils::parse_enum;

pub async fn dispatch_funds(action: FundCommands, ctx: &Context) -> Result<()> {
    let conn = ctx.open()?;
    let user = ctx.current_user(&conn)?;

    match action {
        FundCommands::Create {
            name,
            target_size,
            vintage,
            status,
            currency,
            owner,
        } => {
            auth::require(&user, auth::can_create_fund(&user), "create fund")?;
            if owner.is_some_and(|id| id != user.id) {
                auth::require(&user, user.role == Role::SuperAdmin, "assign fund owner")?;
            }
            let fund = db::create_fund(
                &conn,
                &NewFund {
                    name,
                    target_size: parse_decimal_arg("target_size", &target_size)?,
                    vintage_year: vintage,
                    status: parse_enum("status", &status)?,
                    currency: currency.unwrap_or_else(|| ctx.config.default_currency.clone()),
                    owner_id: owner.or(Some(user.id)),
                },
            )?;
            ctx.emit(&fund, |f| {
                formatters::format_success(&format!("Created fund '{}' (id {})", f.name, f.id))
            })
        }
        FundCommands::List => {
            let funds: Vec<_> = db::list_funds(&conn)?
                .into_iter()
                .filter(|f| auth::can_view_fund(&user, f))
                .collect();
            if funds.is_empty() && !ctx.json_output {
                println!("{}", formatters::format_empty("funds"));
                return Ok(());
            }
            ctx.emit(&funds, |f| formatters::format_funds_table(f, ctx.symbols()))
        }
        FundCommands::Show { id } => {
            let fund = auth::require_fund_view(&conn, &user, id)?;
            ctx.emit(&fund, |f| formatters::format_fund_detail(f, ctx.symbols()))
        }
        FundCommands::Update {
            id,
            name,
            target_size,
            vintage,
            status,
            owner,
        } => {
            auth::require_fund_mutation(&conn, &user, id)?;
            if owner.is_some() {
                auth::require(&user, user.role == Role::SuperAdmin, "reassign fund owner")?;
            }
            let changes = FundChanges {
                name,
                target_size: parse_optional_decimal_arg("target_size", target_size.as_deref())?,
                vintage_year: vintage,
                status: status
                    .as_deref()
                    .map(|s| parse_enum("status", s))
                    .transpose()?,
                owner_id: owner,
            };
            let fund = db::update_fund(&conn, id, &changes)?;
            ctx.emit(&fund, |f| formatters::format_fund_detail(f, ctx.symbols()))
        }
        FundCommands::Delete { id } => {
            auth::require(&user, auth::can_delete_fund(&user), "delete fund")?;
            db::delete_fund(&conn, id)?;
            ctx.emit(&serde_json::json!({ "deleted": id }), |_| {
                formatters::format_success(&format!("Deleted fund {}", id))
            })
        }
        FundCommands::Summary { id } => {
            auth::require_fund_view(&conn, &user, id)?;
            let summary = capital_calls::fund_capital_summary(&conn, id)?;
            ctx.emit(&summary, |s| formatters::format_fund_summary(s, ctx.symbols()))
        }
    }
}

pub async fn dispatch_lps(action: LpCommands, ctx: &Context) -> Result<()> {
    let conn = ctx.open()?;
    let user = ctx.current_user(&conn)?;

    match action {
        LpCommands::Add {
            fund_id,
            name,
            commitment,
            lp_type,
            email,
            phone,
        } => {
            auth::require_fund_mutation(&conn, &user, fund_id)?;
            let lp = db::add_limited_partner(
                &conn,
                &NewLimitedPartner {
                    fund_id,
                    name,
                    email,
                    phone,
                    lp_type: parse_enum("lp_type", &lp_type)?,
                    commitment: parse_decimal_arg("commitment", &commitment)?,
                },
            )?;
            ctx.emit(&lp, |lp| {
                formatters::format_success(&format!(
                    "Added LP '{}' (id {}) to fund {}",
                    lp.name, lp.id, lp.fund_id
                ))
            })
        }
        LpCommands::List { fund_id } => {
            let fund = auth::require_fund_view(&conn, &user, fund_id)?;
            let lps = db::list_limited_partners(&conn, fund_id)?;
            if lps.is_empty() && !ctx.json_output {
                println!("{}", formatters::format_empty("limited partners"));
                return Ok(());
            }
            ctx.emit(&lps, |lps| {
                formatters::format_lps_table(lps, &fund.currency, ctx.symbols())
            })
        }
        LpCommands::Update {
            id,
            name,
            commitment,
            lp_type,
            email,
            phone,
        } => {
            let lp = db::get_limited_partner(&conn, id)?;
            auth::require_fund_mutation(&conn, &user, lp.fund_id)?;
            let changes = LimitedPartnerChanges {
                name,
                email,
                phone,
                lp_type: lp_type
                    .as_deref()
                    .map(|t| parse_enum("lp_type", t))
                    .transpose()?,
                commitment: parse_optional_decimal_arg("commitment", commitment.as_deref())?,
            };
            let updated = db::update_limited_partner(&conn, id, &changes)?;
            ctx.emit(&updated, |lp| {
                formatters::format_success(&format!("Updated LP '{}' (id {})", lp.name, lp.id))
            })
        }
        LpCommands::Statement {
            lp_id,
            fund,
            export,
        } => {
            auth::require_fund_view(&conn, &user, fund)?;
            let statement = capital_calls::generate_lp_statement(&conn, lp_id, fund)?;
            if let Some(path) = export {
                export_statement_csv(&statement, &path)?;
                if !ctx.json_output {
                    println!(
                        "{} Exported {} calls to {}",
                        "✓".green().bold(),
                        statement.call_history.len(),
                        path.display()
                    );
                }
            }
            ctx.emit(&statement, |s| formatters::format_statement(s, ctx.symbols()))
        }
    }
}

fn export_statement_csv(statement: &LpStatement, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    writer.write_record([
        "capital_call_id",
        "call_date",
        "due_date",
        "percentage",
        "expected_amount",
        "amount_paid",
        "date_paid",
        "status",
    ])?;
    for line in &statement.call_history {
        writer.write_record([
            line.capital_call_id.to_string(),
            line.call_date.to_string(),
            line.due_date.to_string(),
            line.percentage.to_string(),
            line.expected_amount.round_dp(2).to_string(),
            line.amount_paid.to_string(),
            line.date_paid.map(|d| d.to_string()).unwrap_or_default(),
            line.status.as_str().to_string(),
        ])?;
    }
    writer.flush()?;

    info!(
        "Exported statement for LP {} to {}",
        statement.lp_id,
        path.display()
    );
    Ok(())
}
