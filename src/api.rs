//! JSON request/response surface
//!
//! A request is `{"method": "...", "params": {...}}`. Every method
//! authenticates the caller, applies the same policy the CLI applies and
//! then calls one engine function. Failures come back as an envelope with
//! the error's stable `kind` instead of an exit code.

use anyhow::Context;
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::auth::{self, Authenticator};
use crate::capital_calls::{self, NewCapitalCall, Payment};
use crate::db::{
    self, CompanyChanges, FundChanges, FundStatus, Metric, NavHolding, NewCompany, NewFund, Role,
    User, ValuationMethod,
};
use crate::error::{LedgerError, Result as LedgerResult};
use crate::nav;
use crate::portfolio::{self, NewUpdate};
use crate::utils;

// Dates and amounts arrive as raw JSON and go through the same parsers as
// CLI arguments, so a malformed value is a validation error on its field.

fn decimal_param(field: &'static str, raw: &Value) -> LedgerResult<Decimal> {
    match raw {
        Value::String(s) => utils::parse_decimal(field, s),
        Value::Number(n) => utils::parse_decimal(field, &n.to_string()),
        other => Err(LedgerError::validation(
            field,
            format!("expected a decimal number, got {}", other),
        )),
    }
}

fn optional_decimal_param(
    field: &'static str,
    raw: Option<&Value>,
) -> LedgerResult<Option<Decimal>> {
    raw.map(|v| decimal_param(field, v)).transpose()
}

fn date_param(field: &'static str, raw: &Value) -> LedgerResult<NaiveDate> {
    match raw {
        Value::String(s) => utils::parse_date(field, s),
        other => Err(LedgerError::validation(
            field,
            format!("expected a YYYY-MM-DD date, got {}", other),
        )),
    }
}

fn optional_date_param(
    field: &'static str,
    raw: Option<&Value>,
) -> LedgerResult<Option<NaiveDate>> {
    raw.map(|v| date_param(field, v)).transpose()
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdParams {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FundCreateParams {
    pub name: String,
    pub target_size: Value,
    pub vintage_year: Option<i32>,
    pub status: Option<FundStatus>,
    pub currency: Option<String>,
    /// Only administrators may assign a fund to someone else
    pub owner_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FundUpdateParams {
    pub id: i64,
    #[serde(default)]
    pub changes: FundChangeParams,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FundChangeParams {
    pub name: Option<String>,
    pub target_size: Option<Value>,
    pub vintage_year: Option<i32>,
    pub status: Option<FundStatus>,
    pub owner_id: Option<i64>,
}

impl FundChangeParams {
    fn parse(self) -> LedgerResult<FundChanges> {
        Ok(FundChanges {
            target_size: optional_decimal_param("target_size", self.target_size.as_ref())?,
            name: self.name,
            vintage_year: self.vintage_year,
            status: self.status,
            owner_id: self.owner_id,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompanyCreateParams {
    #[serde(flatten)]
    pub company: NewCompany,
    /// Links the new company to this fund's portfolio
    pub fund_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompanyUpdateParams {
    pub id: i64,
    #[serde(default)]
    pub changes: CompanyChanges,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CapitalCallParams {
    pub fund_id: i64,
    pub amount: Value,
    pub call_date: Value,
    pub due_date: Value,
    pub percentage: Option<Value>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentParams {
    pub capital_call_id: i64,
    pub lp_id: i64,
    pub amount_paid: Value,
    pub date_paid: Value,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatementParams {
    pub lp_id: i64,
    pub fund_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NavCalculateParams {
    pub fund_id: i64,
    pub date: Value,
    #[serde(default)]
    pub holdings: Vec<HoldingParams>,
    /// Defaults to the fund's currency
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HoldingParams {
    pub company_id: i64,
    pub value: Value,
    /// Defaults to LAST_ROUND
    pub method: Option<ValuationMethod>,
    pub notes: Option<String>,
}

impl HoldingParams {
    fn parse(self) -> LedgerResult<NavHolding> {
        Ok(NavHolding {
            company_id: self.company_id,
            value: decimal_param("value", &self.value)?,
            method: self.method.unwrap_or(ValuationMethod::LastRound),
            notes: self.notes,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NavHistoryParams {
    pub fund_id: i64,
    pub start: Value,
    pub end: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCreateParams {
    pub company_id: i64,
    pub date: Value,
    pub title: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub metrics: Vec<MetricParams>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricParams {
    pub name: String,
    pub value: Value,
    pub unit: Option<String>,
}

impl UpdateCreateParams {
    fn parse(self) -> LedgerResult<NewUpdate> {
        let metrics = self
            .metrics
            .into_iter()
            .map(|m| {
                Ok(Metric {
                    value: decimal_param("metrics", &m.value)?,
                    name: m.name,
                    unit: m.unit,
                })
            })
            .collect::<LedgerResult<Vec<_>>>()?;
        Ok(NewUpdate {
            company_id: self.company_id,
            date: date_param("date", &self.date)?,
            title: self.title,
            notes: self.notes,
            metrics,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LatestMetricsParams {
    pub company_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricHistoryParams {
    pub company_id: i64,
    pub metric: Option<String>,
    pub start: Option<Value>,
    pub end: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum ApiRequest {
    #[serde(rename = "fund.create")]
    FundCreate(FundCreateParams),
    #[serde(rename = "fund.get")]
    FundGet(IdParams),
    #[serde(rename = "fund.update")]
    FundUpdate(FundUpdateParams),
    #[serde(rename = "fund.delete")]
    FundDelete(IdParams),
    #[serde(rename = "company.create")]
    CompanyCreate(CompanyCreateParams),
    #[serde(rename = "company.get")]
    CompanyGet(IdParams),
    #[serde(rename = "company.update")]
    CompanyUpdate(CompanyUpdateParams),
    #[serde(rename = "company.delete")]
    CompanyDelete(IdParams),
    #[serde(rename = "capitalCall.create")]
    CapitalCallCreate(CapitalCallParams),
    #[serde(rename = "capitalCall.recordPayment")]
    CapitalCallRecordPayment(PaymentParams),
    #[serde(rename = "lp.statement")]
    LpStatement(StatementParams),
    #[serde(rename = "nav.calculate")]
    NavCalculate(NavCalculateParams),
    #[serde(rename = "nav.history")]
    NavHistory(NavHistoryParams),
    #[serde(rename = "updates.create")]
    UpdatesCreate(UpdateCreateParams),
    #[serde(rename = "updates.getLatestMetrics")]
    UpdatesGetLatestMetrics(LatestMetricsParams),
    #[serde(rename = "updates.getMetricHistory")]
    UpdatesGetMetricHistory(MetricHistoryParams),
}

impl ApiRequest {
    pub fn method(&self) -> &'static str {
        match self {
            ApiRequest::FundCreate(_) => "fund.create",
            ApiRequest::FundGet(_) => "fund.get",
            ApiRequest::FundUpdate(_) => "fund.update",
            ApiRequest::FundDelete(_) => "fund.delete",
            ApiRequest::CompanyCreate(_) => "company.create",
            ApiRequest::CompanyGet(_) => "company.get",
            ApiRequest::CompanyUpdate(_) => "company.update",
            ApiRequest::CompanyDelete(_) => "company.delete",
            ApiRequest::CapitalCallCreate(_) => "capitalCall.create",
            ApiRequest::CapitalCallRecordPayment(_) => "capitalCall.recordPayment",
            ApiRequest::LpStatement(_) => "lp.statement",
            ApiRequest::NavCalculate(_) => "nav.calculate",
            ApiRequest::NavHistory(_) => "nav.history",
            ApiRequest::UpdatesCreate(_) => "updates.create",
            ApiRequest::UpdatesGetLatestMetrics(_) => "updates.getLatestMetrics",
            ApiRequest::UpdatesGetMetricHistory(_) => "updates.getMetricHistory",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ApiError {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl ApiResponse {
    pub fn success(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(kind: &str, message: impl Into<String>, field: Option<&str>) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(ApiError {
                kind: kind.to_string(),
                message: message.into(),
                field: field.map(str::to_string),
            }),
        }
    }

    fn from_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<LedgerError>() {
            Some(ledger) => Self::failure(ledger.kind(), ledger.to_string(), ledger.field()),
            None => Self::failure("internal", format!("{:#}", err), None),
        }
    }
}

/// Parse a raw JSON request and run it
pub fn handle_json(conn: &Connection, authenticator: &dyn Authenticator, input: &str) -> ApiResponse {
    match serde_json::from_str::<ApiRequest>(input) {
        Ok(request) => handle_request(conn, authenticator, request),
        Err(e) => ApiResponse::failure("invalid_request", e.to_string(), None),
    }
}

pub fn handle_request(
    conn: &Connection,
    authenticator: &dyn Authenticator,
    request: ApiRequest,
) -> ApiResponse {
    let method = request.method();
    let user = match authenticator.authenticate(conn) {
        Ok(user) => user,
        Err(e) => return ApiResponse::failure(e.kind(), e.to_string(), e.field()),
    };
    debug!("API {} as {}", method, user.email);

    match execute(conn, &user, request) {
        Ok(result) => ApiResponse::success(result),
        Err(e) => {
            info!("API {} failed: {:#}", method, e);
            ApiResponse::from_error(&e)
        }
    }
}

fn to_value<T: Serialize>(value: &T) -> anyhow::Result<Value> {
    serde_json::to_value(value).context("Failed to serialize API result")
}

fn execute(conn: &Connection, user: &User, request: ApiRequest) -> anyhow::Result<Value> {
    match request {
        ApiRequest::FundCreate(params) => {
            auth::require(user, auth::can_create_fund(user), "create fund")?;
            if params.owner_id.is_some_and(|id| id != user.id) {
                auth::require(user, user.role == Role::SuperAdmin, "assign fund owner")?;
            }
            let fund = db::create_fund(
                conn,
                &NewFund {
                    target_size: decimal_param("target_size", &params.target_size)?,
                    name: params.name,
                    vintage_year: params.vintage_year,
                    status: params.status.unwrap_or(FundStatus::Raising),
                    currency: params.currency.unwrap_or_else(|| "USD".to_string()),
                    owner_id: params.owner_id.or(Some(user.id)),
                },
            )?;
            to_value(&fund)
        }
        ApiRequest::FundGet(IdParams { id }) => {
            let fund = auth::require_fund_view(conn, user, id)?;
            to_value(&fund)
        }
        ApiRequest::FundUpdate(params) => {
            auth::require_fund_mutation(conn, user, params.id)?;
            if params.changes.owner_id.is_some() {
                auth::require(user, user.role == Role::SuperAdmin, "reassign fund owner")?;
            }
            let changes = params.changes.parse()?;
            to_value(&db::update_fund(conn, params.id, &changes)?)
        }
        ApiRequest::FundDelete(IdParams { id }) => {
            auth::require(user, auth::can_delete_fund(user), "delete fund")?;
            db::delete_fund(conn, id)?;
            Ok(serde_json::json!({ "deleted": id }))
        }
        ApiRequest::CompanyCreate(params) => {
            auth::require(user, auth::can_edit_portfolio(user), "create company")?;
            if let Some(fund_id) = params.fund_id {
                auth::require_fund_mutation(conn, user, fund_id)?;
            }
            let company = portfolio::add_company(conn, &params.company)?;
            if let Some(fund_id) = params.fund_id {
                portfolio::link_company_to_fund(conn, fund_id, company.id)?;
            }
            to_value(&company)
        }
        ApiRequest::CompanyGet(IdParams { id }) => to_value(&portfolio::get_company(conn, id)?),
        ApiRequest::CompanyUpdate(params) => {
            auth::require(user, auth::can_edit_portfolio(user), "update company")?;
            to_value(&portfolio::update_company(conn, params.id, &params.changes)?)
        }
        ApiRequest::CompanyDelete(IdParams { id }) => {
            auth::require(user, auth::can_edit_portfolio(user), "delete company")?;
            portfolio::delete_company(conn, id)?;
            Ok(serde_json::json!({ "deleted": id }))
        }
        ApiRequest::CapitalCallCreate(params) => {
            auth::require_fund_mutation(conn, user, params.fund_id)?;
            let call = capital_calls::create_capital_call(
                conn,
                &NewCapitalCall {
                    fund_id: params.fund_id,
                    amount: decimal_param("amount", &params.amount)?,
                    call_date: date_param("call_date", &params.call_date)?,
                    due_date: date_param("due_date", &params.due_date)?,
                    percentage: optional_decimal_param("percentage", params.percentage.as_ref())?,
                    description: params.description,
                },
            )?;
            to_value(&capital_calls::get_capital_call(
                conn,
                call.id,
                capital_calls::today(),
            )?)
        }
        ApiRequest::CapitalCallRecordPayment(params) => {
            let call = capital_calls::get_call_record(conn, params.capital_call_id)?;
            auth::require_fund_mutation(conn, user, call.fund_id)?;
            let response = capital_calls::record_payment(
                conn,
                &Payment {
                    capital_call_id: params.capital_call_id,
                    lp_id: params.lp_id,
                    amount_paid: decimal_param("amount_paid", &params.amount_paid)?,
                    date_paid: date_param("date_paid", &params.date_paid)?,
                    notes: params.notes,
                },
            )?;
            let call = capital_calls::get_call_record(conn, params.capital_call_id)?;
            Ok(serde_json::json!({
                "response": to_value(&response)?,
                "call_status": call.status,
            }))
        }
        ApiRequest::LpStatement(params) => {
            auth::require_fund_view(conn, user, params.fund_id)?;
            to_value(&capital_calls::generate_lp_statement(
                conn,
                params.lp_id,
                params.fund_id,
            )?)
        }
        ApiRequest::NavCalculate(params) => {
            let fund = auth::require_fund_mutation(conn, user, params.fund_id)?;
            let date = date_param("date", &params.date)?;
            let holdings = params
                .holdings
                .into_iter()
                .map(HoldingParams::parse)
                .collect::<LedgerResult<Vec<_>>>()?;
            let currency = params.currency.unwrap_or(fund.currency);
            to_value(&nav::calculate_nav(
                conn,
                params.fund_id,
                date,
                &holdings,
                &currency,
            )?)
        }
        ApiRequest::NavHistory(params) => {
            auth::require_fund_view(conn, user, params.fund_id)?;
            to_value(&nav::get_historical_nav(
                conn,
                params.fund_id,
                date_param("start", &params.start)?,
                date_param("end", &params.end)?,
            )?)
        }
        ApiRequest::UpdatesCreate(params) => {
            auth::require(user, auth::can_edit_portfolio(user), "create company update")?;
            let new_update = params.parse()?;
            to_value(&portfolio::create_update(conn, &new_update)?)
        }
        ApiRequest::UpdatesGetLatestMetrics(params) => {
            to_value(&portfolio::get_latest_metrics(conn, params.company_id)?)
        }
        ApiRequest::UpdatesGetMetricHistory(params) => to_value(&portfolio::get_metric_history(
            conn,
            params.company_id,
            params.metric.as_deref(),
            optional_date_param("start", params.start.as_ref())?,
            optional_date_param("end", params.end.as_ref())?,
        )?),
    }
}
