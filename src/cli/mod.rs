use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod formatters;

#[derive(Parser)]
#[command(name = "fundbook")]
#[command(version, about = "Venture fund administration ledger")]
#[command(
    long_about = "Track funds, limited partners and capital calls, record NAV calculations, and follow portfolio companies' investments and reported metrics."
)]
pub struct Cli {
    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// SQLite database file (overrides config and ~/.fundbook/data.db)
    #[arg(long = "db", global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database and, on first run, the administrator account
    Init {
        /// Email of the first SUPER_ADMIN (only used while no users exist)
        #[arg(long)]
        admin_email: Option<String>,

        /// Display name of the first SUPER_ADMIN
        #[arg(long, default_value = "Administrator")]
        admin_name: String,
    },

    /// User accounts
    Users {
        #[command(subcommand)]
        action: UserCommands,
    },

    /// Funds
    Funds {
        #[command(subcommand)]
        action: FundCommands,
    },

    /// Limited partners and their capital accounts
    Lps {
        #[command(subcommand)]
        action: LpCommands,
    },

    /// Portfolio companies
    Companies {
        #[command(subcommand)]
        action: CompanyCommands,
    },

    /// Investments from funds into companies
    Investments {
        #[command(subcommand)]
        action: InvestmentCommands,
    },

    /// Capital calls and LP payments
    Calls {
        #[command(subcommand)]
        action: CallCommands,
    },

    /// Net asset value calculations
    Nav {
        #[command(subcommand)]
        action: NavCommands,
    },

    /// Company updates and reported metrics
    Updates {
        #[command(subcommand)]
        action: UpdateCommands,
    },

    /// Answer one JSON API request read from stdin
    Api,
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Add a user (SUPER_ADMIN only)
    Add {
        email: String,

        #[arg(short, long)]
        name: String,

        /// SUPER_ADMIN, FUND_MANAGER, ANALYST, READ_ONLY or USER
        #[arg(short, long, default_value = "USER")]
        role: String,
    },
    /// List users
    List,
    /// Show the user commands run as
    Whoami,
}

#[derive(Subcommand)]
pub enum FundCommands {
    /// Create a fund owned by the current user
    Create {
        name: String,

        /// Target fund size
        #[arg(long)]
        target_size: String,

        #[arg(long)]
        vintage: Option<i32>,

        /// RAISING, INVESTING, FULLY_INVESTED, HARVESTING or CLOSED
        #[arg(long, default_value = "RAISING")]
        status: String,

        /// ISO currency code (defaults to the configured currency)
        #[arg(long)]
        currency: Option<String>,

        /// Owner user id (SUPER_ADMIN only; defaults to the current user)
        #[arg(long)]
        owner: Option<i64>,
    },
    /// List funds visible to the current user
    List,
    /// Show one fund
    Show { id: i64 },
    /// Change fund fields
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        target_size: Option<String>,
        #[arg(long)]
        vintage: Option<i32>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        owner: Option<i64>,
    },
    /// Delete a fund and everything recorded under it (SUPER_ADMIN only)
    Delete { id: i64 },
    /// Commitments, calls, payments and latest NAV for a fund
    Summary { id: i64 },
}

#[derive(Subcommand)]
pub enum LpCommands {
    /// Add a limited partner to a fund
    Add {
        fund_id: i64,
        name: String,

        #[arg(long)]
        commitment: String,

        /// INDIVIDUAL or INSTITUTION
        #[arg(long = "type", default_value = "INSTITUTION")]
        lp_type: String,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        phone: Option<String>,
    },
    /// List a fund's limited partners
    List { fund_id: i64 },
    /// Change LP fields (commitment is frozen once a call includes the LP)
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        commitment: Option<String>,
        #[arg(long = "type")]
        lp_type: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    /// Capital account statement for an LP
    Statement {
        lp_id: i64,

        #[arg(long)]
        fund: i64,

        /// Write the call history to this CSV file
        #[arg(long)]
        export: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum CompanyCommands {
    /// Add a portfolio company
    Add {
        name: String,
        #[arg(long)]
        sector: Option<String>,
        #[arg(long)]
        stage: Option<String>,
        #[arg(long)]
        website: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Link the company to this fund's portfolio
        #[arg(long)]
        fund: Option<i64>,
    },
    /// List companies, optionally only one fund's portfolio
    List {
        #[arg(long)]
        fund: Option<i64>,
    },
    /// Show a company with its investments and latest valuation
    Show { id: i64 },
    /// Change company fields
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        sector: Option<String>,
        #[arg(long)]
        stage: Option<String>,
        #[arg(long)]
        website: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// ACTIVE, EXITED or WRITTEN_OFF
        #[arg(long)]
        status: Option<String>,
    },
    /// Delete a company that no investment or NAV references
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum InvestmentCommands {
    /// Record an investment round
    Add {
        #[arg(long)]
        fund: i64,
        #[arg(long)]
        company: i64,
        #[arg(long)]
        amount: String,
        /// Investment date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        /// Defaults to the fund's currency
        #[arg(long)]
        currency: Option<String>,
        #[arg(long)]
        round: Option<String>,
        /// Post-money valuation
        #[arg(long)]
        valuation: Option<String>,
        /// Ownership percentage acquired (0-100)
        #[arg(long)]
        ownership: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List investments, newest first
    List {
        #[arg(long)]
        company: Option<i64>,
        #[arg(long)]
        fund: Option<i64>,
    },
    /// Total invested per currency
    Totals {
        #[arg(long)]
        company: Option<i64>,
    },
    /// Summed ownership percentage in a company
    Ownership { company_id: i64 },
}

#[derive(Subcommand)]
pub enum CallCommands {
    /// Issue a capital call to every LP of a fund
    Create {
        fund_id: i64,
        #[arg(long)]
        amount: String,
        /// Call date (YYYY-MM-DD)
        #[arg(long)]
        call_date: String,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due_date: String,
        /// Percentage of commitments (derived from the amount when omitted)
        #[arg(long)]
        percentage: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// List a fund's capital calls
    List { fund_id: i64 },
    /// Show a call with every LP response
    Show { id: i64 },
    /// Record an LP payment (replaces the amount recorded so far)
    Pay {
        call_id: i64,
        lp_id: i64,
        #[arg(long)]
        amount: String,
        /// Payment date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Re-derive and store a call's status
    Recompute { id: i64 },
    /// Store fresh statuses for every call (marks OVERDUE calls)
    Sweep {
        #[arg(long)]
        fund: Option<i64>,
    },
}

#[derive(Subcommand)]
pub enum NavCommands {
    /// Record a NAV calculation
    Calculate {
        fund_id: i64,
        /// Valuation date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        /// COMPANY_ID:VALUE[:METHOD], repeatable
        #[arg(long = "holding")]
        holdings: Vec<String>,
        /// Defaults to the fund's currency
        #[arg(long)]
        currency: Option<String>,
    },
    /// List a fund's NAV calculations, newest first
    List { fund_id: i64 },
    /// Latest NAV of a fund
    Latest { fund_id: i64 },
    /// NAV calculations within a date range
    History {
        fund_id: i64,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Most recent recorded value of a company
    Valuation {
        company_id: i64,
        #[arg(long)]
        as_of: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum UpdateCommands {
    /// Record a company update
    Create {
        company_id: i64,
        /// Update date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        notes: Option<String>,
        /// NAME=VALUE[:UNIT], repeatable
        #[arg(long = "metric")]
        metrics: Vec<String>,
    },
    /// Append metrics to an existing update
    AddMetrics {
        update_id: i64,
        /// NAME=VALUE[:UNIT], repeatable
        #[arg(long = "metric", required = true)]
        metrics: Vec<String>,
    },
    /// List a company's updates, newest first
    List {
        company_id: i64,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
    /// Latest value of every metric
    Latest { company_id: i64 },
    /// Metric history, oldest first
    History {
        company_id: i64,
        #[arg(long)]
        metric: Option<String>,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
}
