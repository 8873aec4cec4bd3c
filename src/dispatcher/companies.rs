use anyhow::Result;

use super::{parse_date_arg, parse_decimal_arg, parse_optional_decimal_arg, Context};
use crate::cli::{formatters, CompanyCommands, InvestmentCommands};
use fundbook::auth;
use fundbook::db::{CompanyChanges, NewCompany, NewInvestment};
use fundbook::utils::parse_enum;
use fundbook::{nav, portfolio};

pub async fn dispatch_companies(action: CompanyCommands, ctx: &Context) -> Result<()> {
    let conn = ctx.open()?;
    let user = ctx.current_user(&conn)?;

    match action {
        CompanyCommands::Add {
            name,
            sector,
            stage,
            website,
            description,
            fund,
        } => {
            auth::require(&user, auth::can_edit_portfolio(&user), "add company")?;
            if let Some(fund_id) = fund {
                auth::require_fund_mutation(&conn, &user, fund_id)?;
            }
            let company = portfolio::add_company(
                &conn,
                &NewCompany {
                    name,
                    sector,
                    stage,
                    website,
                    description,
                },
            )?;
            if let Some(fund_id) = fund {
                portfolio::link_company_to_fund(&conn, fund_id, company.id)?;
            }
            ctx.emit(&company, |c| {
                formatters::format_success(&format!("Added company '{}' (id {})", c.name, c.id))
            })
        }
        CompanyCommands::List { fund } => {
            if let Some(fund_id) = fund {
                auth::require_fund_view(&conn, &user, fund_id)?;
            }
            let companies = portfolio::list_companies(&conn, fund)?;
            if companies.is_empty() && !ctx.json_output {
                println!("{}", formatters::format_empty("companies"));
                return Ok(());
            }
            ctx.emit(&companies, |c| formatters::format_companies_table(c))
        }
        CompanyCommands::Show { id } => {
            let company = portfolio::get_company(&conn, id)?;
            let investments = portfolio::list_investments(&conn, Some(id), None)?;
            let valuation = nav::get_company_valuation(&conn, id, None)?;

            if ctx.json_output {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "company": company,
                        "investments": investments,
                        "total_invested": portfolio::get_total_invested(&conn, Some(id))?,
                        "ownership": portfolio::get_ownership(&conn, id)?,
                        "latest_valuation": valuation,
                    }))?
                );
            } else {
                println!(
                    "{}",
                    formatters::format_company_detail(
                        &company,
                        &investments,
                        valuation.as_ref(),
                        ctx.symbols()
                    )
                );
            }
            Ok(())
        }
        CompanyCommands::Update {
            id,
            name,
            sector,
            stage,
            website,
            description,
            status,
        } => {
            auth::require(&user, auth::can_edit_portfolio(&user), "update company")?;
            let changes = CompanyChanges {
                name,
                sector,
                stage,
                website,
                description,
                status: status
                    .as_deref()
                    .map(|s| parse_enum("status", s))
                    .transpose()?,
            };
            let company = portfolio::update_company(&conn, id, &changes)?;
            ctx.emit(&company, |c| {
                formatters::format_success(&format!("Updated company '{}' (id {})", c.name, c.id))
            })
        }
        CompanyCommands::Delete { id } => {
            auth::require(&user, auth::can_edit_portfolio(&user), "delete company")?;
            portfolio::delete_company(&conn, id)?;
            ctx.emit(&serde_json::json!({ "deleted": id }), |_| {
                formatters::format_success(&format!("Deleted company {}", id))
            })
        }
    }
}

pub async fn dispatch_investments(action: InvestmentCommands, ctx: &Context) -> Result<()> {
    let conn = ctx.open()?;
    let user = ctx.current_user(&conn)?;

    match action {
        InvestmentCommands::Add {
            fund,
            company,
            amount,
            date,
            currency,
            round,
            valuation,
            ownership,
            notes,
        } => {
            let fund_record = auth::require_fund_mutation(&conn, &user, fund)?;
            let investment = portfolio::add_investment(
                &conn,
                &NewInvestment {
                    fund_id: fund,
                    company_id: company,
                    amount: parse_decimal_arg("amount", &amount)?,
                    currency: currency.unwrap_or(fund_record.currency),
                    date: parse_date_arg("date", &date)?,
                    round,
                    valuation: parse_optional_decimal_arg("valuation", valuation.as_deref())?,
                    ownership: parse_optional_decimal_arg("ownership", ownership.as_deref())?,
                    notes,
                },
            )?;
            ctx.emit(&investment, |i| {
                formatters::format_success(&format!(
                    "Recorded investment {} of {} into company {}",
                    i.id,
                    formatters::money(i.amount, &i.currency, ctx.symbols()),
                    i.company_id
                ))
            })
        }
        InvestmentCommands::List { company, fund } => {
            if let Some(fund_id) = fund {
                auth::require_fund_view(&conn, &user, fund_id)?;
            }
            let investments = portfolio::list_investments(&conn, company, fund)?;
            if investments.is_empty() && !ctx.json_output {
                println!("{}", formatters::format_empty("investments"));
                return Ok(());
            }
            ctx.emit(&investments, |i| {
                formatters::format_investments_table(i, ctx.symbols())
            })
        }
        InvestmentCommands::Totals { company } => {
            let totals = portfolio::get_total_invested(&conn, company)?;
            ctx.emit(&totals, |t| formatters::format_totals(t, ctx.symbols()))
        }
        InvestmentCommands::Ownership { company_id } => {
            let ownership = portfolio::get_ownership(&conn, company_id)?;
            ctx.emit(
                &serde_json::json!({ "company_id": company_id, "ownership": ownership }),
                |_| {
                    format!(
                        "Company {} ownership: {}",
                        company_id,
                        fundbook::utils::format_percent(ownership)
                    )
                },
            )
        }
    }
}
