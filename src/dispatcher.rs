//! Command dispatcher that routes parsed clap commands to their handlers.
//!
//! Every handler follows the same shape: open the database, resolve the
//! acting user, check the policy, call the engine, then print JSON or a
//! table.

mod calls;
mod companies;
mod funds;
mod nav;
mod updates;
mod users;

use anyhow::{Context as _, Result};
use rusqlite::Connection;
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;
use tracing::info;

use crate::cli::{self, Commands};
use fundbook::auth::{Authenticator, DbAuthenticator};
use fundbook::config::Config;
use fundbook::db::{self, User};

/// Per-invocation settings shared by all handlers
pub struct Context {
    pub json_output: bool,
    pub db_path: Option<PathBuf>,
    pub config: Config,
}

impl Context {
    pub fn new(json_output: bool, db_flag: Option<PathBuf>, config: Config) -> Self {
        let db_path = db_flag.or_else(|| config.database_path.clone());
        Self {
            json_output,
            db_path,
            config,
        }
    }

    /// Create the schema if needed and open a connection
    pub fn open(&self) -> Result<Connection> {
        db::init_database(self.db_path.clone())?;
        db::open_db(self.db_path.clone())
    }

    pub fn authenticator(&self) -> DbAuthenticator {
        DbAuthenticator {
            email: self.config.user_email.clone(),
        }
    }

    pub fn current_user(&self, conn: &Connection) -> Result<User> {
        Ok(self.authenticator().authenticate(conn)?)
    }

    pub fn symbols(&self) -> bool {
        self.config.display.currency_symbol
    }

    /// Print `value` as JSON, or the table produced by `render`
    pub fn emit<T: Serialize>(&self, value: &T, render: impl FnOnce(&T) -> String) -> Result<()> {
        if self.json_output {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", render(value));
        }
        Ok(())
    }
}

/// Route a parsed command to its handler
pub async fn dispatch_command(command: Commands, ctx: &Context) -> Result<()> {
    match command {
        Commands::Init {
            admin_email,
            admin_name,
        } => dispatch_init(admin_email.as_deref(), &admin_name, ctx).await,
        Commands::Users { action } => users::dispatch_users(action, ctx).await,
        Commands::Funds { action } => funds::dispatch_funds(action, ctx).await,
        Commands::Lps { action } => funds::dispatch_lps(action, ctx).await,
        Commands::Companies { action } => companies::dispatch_companies(action, ctx).await,
        Commands::Investments { action } => companies::dispatch_investments(action, ctx).await,
        Commands::Calls { action } => calls::dispatch_calls(action, ctx).await,
        Commands::Nav { action } => nav::dispatch_nav(action, ctx).await,
        Commands::Updates { action } => updates::dispatch_updates(action, ctx).await,
        Commands::Api => dispatch_api(ctx).await,
    }
}

async fn dispatch_init(admin_email: Option<&str>, admin_name: &str, ctx: &Context) -> Result<()> {
    let conn = ctx.open()?;
    let path = match &ctx.db_path {
        Some(p) => p.clone(),
        None => db::get_default_db_path()?,
    };
    info!("Initialized database at {}", path.display());

    let admin = match admin_email {
        Some(email) if db::count_users(&conn)? == 0 => Some(
            db::insert_user(&conn, email, admin_name, db::Role::SuperAdmin)
                .context("Failed to create administrator")?,
        ),
        Some(_) => {
            tracing::warn!("Users already exist; --admin-email ignored");
            None
        }
        None => None,
    };

    if ctx.json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "database": path,
                "admin": admin,
            }))?
        );
    } else {
        println!(
            "{}",
            cli::formatters::format_success(&format!("Database ready at {}", path.display()))
        );
        if let Some(admin) = admin {
            println!(
                "{}",
                cli::formatters::format_success(&format!(
                    "Created SUPER_ADMIN {} (id {})",
                    admin.email, admin.id
                ))
            );
        }
    }
    Ok(())
}

async fn dispatch_api(ctx: &Context) -> Result<()> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read API request from stdin")?;

    let conn = ctx.open()?;
    let response = fundbook::api::handle_json(&conn, &ctx.authenticator(), &input);
    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}

/// Parse a `--from/--to` style date argument
pub(crate) fn parse_date_arg(field: &'static str, value: &str) -> Result<chrono::NaiveDate> {
    Ok(fundbook::utils::parse_date(field, value)?)
}

pub(crate) fn parse_optional_date_arg(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<chrono::NaiveDate>> {
    Ok(fundbook::utils::parse_optional_date(field, value)?)
}

pub(crate) fn parse_decimal_arg(field: &'static str, value: &str) -> Result<rust_decimal::Decimal> {
    Ok(fundbook::utils::parse_decimal(field, value)?)
}

pub(crate) fn parse_optional_decimal_arg(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<rust_decimal::Decimal>> {
    Ok(fundbook::utils::parse_optional_decimal(field, value)?)
}
