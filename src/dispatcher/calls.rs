use anyhow::Result;
use colored::Colorize;

use super::{parse_date_arg, parse_decimal_arg, parse_optional_decimal_arg, Context};
use crate::cli::{formatters, CallCommands};
use fundbook::auth;
use fundbook::capital_calls::{self, NewCapitalCall, Payment};
use fundbook::db::{self, Role};

pub async fn dispatch_calls(action: CallCommands, ctx: &Context) -> Result<()> {
    let conn = ctx.open()?;
    let user = ctx.current_user(&conn)?;
    let today = capital_calls::today();

    match action {
        CallCommands::Create {
            fund_id,
            amount,
            call_date,
            due_date,
            percentage,
            description,
        } => {
            let fund = auth::require_fund_mutation(&conn, &user, fund_id)?;
            let call = capital_calls::create_capital_call(
                &conn,
                &NewCapitalCall {
                    fund_id,
                    amount: parse_decimal_arg("amount", &amount)?,
                    call_date: parse_date_arg("call_date", &call_date)?,
                    due_date: parse_date_arg("due_date", &due_date)?,
                    percentage: parse_optional_decimal_arg("percentage", percentage.as_deref())?,
                    description,
                },
            )?;
            let detail = capital_calls::get_capital_call(&conn, call.id, today)?;
            ctx.emit(&detail, |d| {
                formatters::format_call_detail(d, &fund.currency, ctx.symbols())
            })
        }
        CallCommands::List { fund_id } => {
            let fund = auth::require_fund_view(&conn, &user, fund_id)?;
            let calls = capital_calls::list_capital_calls(&conn, fund_id, today)?;
            if calls.is_empty() && !ctx.json_output {
                println!("{}", formatters::format_empty("capital calls"));
                return Ok(());
            }
            ctx.emit(&calls, |c| {
                formatters::format_calls_table(c, &fund.currency, ctx.symbols())
            })
        }
        CallCommands::Show { id } => {
            let call = capital_calls::get_call_record(&conn, id)?;
            let fund = auth::require_fund_view(&conn, &user, call.fund_id)?;
            let detail = capital_calls::get_capital_call(&conn, id, today)?;
            ctx.emit(&detail, |d| {
                formatters::format_call_detail(d, &fund.currency, ctx.symbols())
            })
        }
        CallCommands::Pay {
            call_id,
            lp_id,
            amount,
            date,
            notes,
        } => {
            let call = capital_calls::get_call_record(&conn, call_id)?;
            let fund = auth::require_fund_mutation(&conn, &user, call.fund_id)?;
            let response = capital_calls::record_payment_as_of(
                &conn,
                &Payment {
                    capital_call_id: call_id,
                    lp_id,
                    amount_paid: parse_decimal_arg("amount_paid", &amount)?,
                    date_paid: parse_date_arg("date_paid", &date)?,
                    notes,
                },
                today,
            )?;
            let call = capital_calls::get_call_record(&conn, call_id)?;

            if ctx.json_output {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "response": response,
                        "call_status": call.status,
                    }))?
                );
            } else {
                println!(
                    "{}",
                    formatters::format_success(&format!(
                        "Recorded {} from LP {} ({})",
                        formatters::money(response.amount_paid, &fund.currency, ctx.symbols()),
                        lp_id,
                        response.status.as_str()
                    ))
                );
                println!("  Call {} is now {}", call_id, call.status.as_str().bold());
            }
            Ok(())
        }
        CallCommands::Recompute { id } => {
            let call = capital_calls::get_call_record(&conn, id)?;
            auth::require_fund_mutation(&conn, &user, call.fund_id)?;
            let status = capital_calls::recompute_call_status_as_of(&conn, id, today)?;
            ctx.emit(
                &serde_json::json!({ "capital_call_id": id, "status": status }),
                |_| format!("Call {} status: {}", id, status.as_str().bold()),
            )
        }
        CallCommands::Sweep { fund } => {
            match fund {
                Some(fund_id) => {
                    auth::require_fund_mutation(&conn, &user, fund_id)?;
                }
                None => auth::require(&user, user.role == Role::SuperAdmin, "sweep all funds")?,
            }
            let changed = capital_calls::sweep_call_statuses(&conn, fund, today)?;

            if ctx.json_output {
                println!("{}", serde_json::to_string_pretty(&changed)?);
            } else if changed.is_empty() {
                println!("{} All call statuses are current", "ℹ".blue().bold());
            } else {
                for call in &changed {
                    let currency = db::get_fund(&conn, call.fund_id)?.currency;
                    println!(
                        "  Call {} (fund {}, {}): {}",
                        call.id,
                        call.fund_id,
                        formatters::money(call.amount, &currency, ctx.symbols()),
                        call.status.as_str().bold()
                    );
                }
                println!(
                    "\n{}",
                    formatters::format_success(&format!("Updated {} calls", changed.len()))
                );
            }
            Ok(())
        }
    }
}
