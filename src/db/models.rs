use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Caller roles, from most to least privileged
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin,
    FundManager,
    Analyst,
    ReadOnly,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "SUPER_ADMIN",
            Role::FundManager => "FUND_MANAGER",
            Role::Analyst => "ANALYST",
            Role::ReadOnly => "READ_ONLY",
            Role::User => "USER",
        }
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "SUPER_ADMIN" | "ADMIN" => Ok(Role::SuperAdmin),
            "FUND_MANAGER" | "MANAGER" => Ok(Role::FundManager),
            "ANALYST" => Ok(Role::Analyst),
            "READ_ONLY" | "READONLY" => Ok(Role::ReadOnly),
            "USER" => Ok(Role::User),
            _ => Err(()),
        }
    }
}

/// Application user; funds reference their owner by id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Fund lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FundStatus {
    Raising,
    Investing,
    FullyInvested,
    Harvesting,
    Closed,
}

impl FundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FundStatus::Raising => "RAISING",
            FundStatus::Investing => "INVESTING",
            FundStatus::FullyInvested => "FULLY_INVESTED",
            FundStatus::Harvesting => "HARVESTING",
            FundStatus::Closed => "CLOSED",
        }
    }
}

impl FromStr for FundStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace([' ', '-'], "_").as_str() {
            "RAISING" => Ok(FundStatus::Raising),
            // Older records used ACTIVE for a fund deploying capital
            "INVESTING" | "ACTIVE" => Ok(FundStatus::Investing),
            "FULLY_INVESTED" => Ok(FundStatus::FullyInvested),
            "HARVESTING" => Ok(FundStatus::Harvesting),
            "CLOSED" => Ok(FundStatus::Closed),
            _ => Err(()),
        }
    }
}

/// Venture fund
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fund {
    pub id: i64,
    pub name: String,
    pub target_size: Decimal,
    pub vintage_year: Option<i32>,
    pub status: FundStatus,
    pub currency: String,
    pub owner_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFund {
    pub name: String,
    pub target_size: Decimal,
    pub vintage_year: Option<i32>,
    pub status: FundStatus,
    pub currency: String,
    pub owner_id: Option<i64>,
}

/// Partial fund update; `None` leaves the column untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FundChanges {
    pub name: Option<String>,
    pub target_size: Option<Decimal>,
    pub vintage_year: Option<i32>,
    pub status: Option<FundStatus>,
    pub owner_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LpType {
    Individual,
    Institution,
}

impl LpType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LpType::Individual => "INDIVIDUAL",
            LpType::Institution => "INSTITUTION",
        }
    }
}

impl FromStr for LpType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INDIVIDUAL" | "PERSON" => Ok(LpType::Individual),
            "INSTITUTION" | "INSTITUTIONAL" => Ok(LpType::Institution),
            _ => Err(()),
        }
    }
}

/// Limited partner and its commitment to exactly one fund
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitedPartner {
    pub id: i64,
    pub fund_id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub lp_type: LpType,
    pub commitment: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLimitedPartner {
    pub fund_id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub lp_type: LpType,
    pub commitment: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitedPartnerChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub lp_type: Option<LpType>,
    pub commitment: Option<Decimal>,
}

/// Aggregate status of a capital call
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallStatus {
    Pending,
    PartiallyPaid,
    FullyPaid,
    Overdue,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Pending => "PENDING",
            CallStatus::PartiallyPaid => "PARTIALLY_PAID",
            CallStatus::FullyPaid => "FULLY_PAID",
            CallStatus::Overdue => "OVERDUE",
        }
    }
}

impl FromStr for CallStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(CallStatus::Pending),
            "PARTIALLY_PAID" => Ok(CallStatus::PartiallyPaid),
            "FULLY_PAID" => Ok(CallStatus::FullyPaid),
            "OVERDUE" => Ok(CallStatus::Overdue),
            _ => Err(()),
        }
    }
}

/// Per-LP status of a capital call response
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    Pending,
    PartiallyPaid,
    Paid,
    /// Never derived today; kept so stored rows from other tools still load
    Late,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Pending => "PENDING",
            ResponseStatus::PartiallyPaid => "PARTIALLY_PAID",
            ResponseStatus::Paid => "PAID",
            ResponseStatus::Late => "LATE",
        }
    }
}

impl FromStr for ResponseStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(ResponseStatus::Pending),
            "PARTIALLY_PAID" => Ok(ResponseStatus::PartiallyPaid),
            "PAID" => Ok(ResponseStatus::Paid),
            "LATE" => Ok(ResponseStatus::Late),
            _ => Err(()),
        }
    }
}

/// Request for LPs to pay in a percentage of their commitments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapitalCall {
    pub id: i64,
    pub fund_id: i64,
    pub call_date: NaiveDate,
    pub due_date: NaiveDate,
    pub amount: Decimal,
    pub percentage: Decimal,
    pub description: Option<String>,
    pub status: CallStatus,
    pub created_at: DateTime<Utc>,
}

/// One LP's obligation and payment progress for one call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapitalCallResponse {
    pub id: i64,
    pub capital_call_id: i64,
    pub lp_id: i64,
    pub amount_paid: Decimal,
    pub date_paid: Option<NaiveDate>,
    pub status: ResponseStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompanyStatus {
    Active,
    Exited,
    WrittenOff,
}

impl CompanyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompanyStatus::Active => "ACTIVE",
            CompanyStatus::Exited => "EXITED",
            CompanyStatus::WrittenOff => "WRITTEN_OFF",
        }
    }
}

impl FromStr for CompanyStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace([' ', '-'], "_").as_str() {
            "ACTIVE" => Ok(CompanyStatus::Active),
            "EXITED" => Ok(CompanyStatus::Exited),
            "WRITTEN_OFF" => Ok(CompanyStatus::WrittenOff),
            _ => Err(()),
        }
    }
}

/// Company in the portfolio roster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioCompany {
    pub id: i64,
    pub name: String,
    pub sector: Option<String>,
    pub stage: Option<String>,
    pub website: Option<String>,
    pub description: Option<String>,
    pub status: CompanyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCompany {
    pub name: String,
    pub sector: Option<String>,
    pub stage: Option<String>,
    pub website: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyChanges {
    pub name: Option<String>,
    pub sector: Option<String>,
    pub stage: Option<String>,
    pub website: Option<String>,
    pub description: Option<String>,
    pub status: Option<CompanyStatus>,
}

/// Money a fund put into a company in one round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Investment {
    pub id: i64,
    pub fund_id: i64,
    pub company_id: i64,
    pub amount: Decimal,
    pub currency: String,
    pub date: NaiveDate,
    pub round: Option<String>,
    pub valuation: Option<Decimal>, // post-money
    pub ownership: Option<Decimal>, // percent, 0-100
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInvestment {
    pub fund_id: i64,
    pub company_id: i64,
    pub amount: Decimal,
    pub currency: String,
    pub date: NaiveDate,
    pub round: Option<String>,
    pub valuation: Option<Decimal>,
    pub ownership: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValuationMethod {
    Market,
    LastRound,
    Dcf,
    Comparables,
    Cost,
    Other,
}

impl ValuationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValuationMethod::Market => "MARKET",
            ValuationMethod::LastRound => "LAST_ROUND",
            ValuationMethod::Dcf => "DCF",
            ValuationMethod::Comparables => "COMPARABLES",
            ValuationMethod::Cost => "COST",
            ValuationMethod::Other => "OTHER",
        }
    }
}

impl FromStr for ValuationMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace([' ', '-'], "_").as_str() {
            "MARKET" => Ok(ValuationMethod::Market),
            "LAST_ROUND" => Ok(ValuationMethod::LastRound),
            "DCF" => Ok(ValuationMethod::Dcf),
            "COMPARABLES" | "COMPS" => Ok(ValuationMethod::Comparables),
            "COST" => Ok(ValuationMethod::Cost),
            "OTHER" => Ok(ValuationMethod::Other),
            _ => Err(()),
        }
    }
}

/// Value of one company inside a NAV calculation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NavHolding {
    pub company_id: i64,
    pub value: Decimal,
    pub method: ValuationMethod,
    pub notes: Option<String>,
}

/// Immutable point-in-time NAV of a fund
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavCalculation {
    pub id: i64,
    pub fund_id: i64,
    pub date: NaiveDate,
    pub total_value: Decimal,
    pub currency: String,
    pub holdings: Vec<NavHolding>,
    pub created_at: DateTime<Utc>,
}

/// Named metric value reported by a company
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metric {
    pub name: String,
    pub value: Decimal,
    pub unit: Option<String>,
}

/// Time-stamped company update carrying metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyUpdate {
    pub id: i64,
    pub company_id: i64,
    pub date: NaiveDate,
    pub title: String,
    pub notes: Option<String>,
    pub metrics: Vec<Metric>,
    pub created_at: DateTime<Utc>,
}
