//! Utility functions for formatting, parsing and currency codes
//!
//! This module provides centralized formatting utilities for consistent
//! display of money across the application, plus the input parsers shared
//! by the CLI and the JSON API.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::{LedgerError, Result};

/// ISO-4217 codes accepted for funds, investments and NAV calculations
pub const KNOWN_CURRENCIES: &[&str] = &[
    "AED", "ARS", "AUD", "BRL", "CAD", "CHF", "CLP", "CNY", "COP", "CZK", "DKK", "EUR", "GBP",
    "HKD", "HUF", "IDR", "ILS", "INR", "JPY", "KES", "KRW", "MXN", "MYR", "NGN", "NOK", "NZD",
    "PEN", "PHP", "PLN", "SAR", "SEK", "SGD", "THB", "TRY", "TWD", "UAH", "USD", "VND", "ZAR",
];

/// Validate a currency code and return it uppercased.
///
/// # Examples
/// ```
/// use fundbook::utils::normalize_currency;
///
/// assert_eq!(normalize_currency(" usd ").unwrap(), "USD");
/// assert!(normalize_currency("US$").is_err());
/// ```
pub fn normalize_currency(code: &str) -> Result<String> {
    let upper = code.trim().to_ascii_uppercase();
    if upper.len() != 3 || !upper.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(LedgerError::validation(
            "currency",
            format!("'{}' is not a three-letter currency code", code.trim()),
        ));
    }
    if !KNOWN_CURRENCIES.contains(&upper.as_str()) {
        return Err(LedgerError::validation(
            "currency",
            format!("unknown currency code '{}'", upper),
        ));
    }
    Ok(upper)
}

/// Parse a YYYY-MM-DD date, reporting failures against `field`
pub fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        LedgerError::validation(
            field,
            format!("'{}' is not a valid date (expected YYYY-MM-DD)", value.trim()),
        )
    })
}

pub fn parse_optional_date(field: &'static str, value: Option<&str>) -> Result<Option<NaiveDate>> {
    value.map(|v| parse_date(field, v)).transpose()
}

/// Parse a decimal amount, reporting failures against `field`
pub fn parse_decimal(field: &'static str, value: &str) -> Result<Decimal> {
    let cleaned: String = value.trim().chars().filter(|c| *c != ',' && *c != '_').collect();
    Decimal::from_str(&cleaned).map_err(|_| {
        LedgerError::validation(field, format!("'{}' is not a decimal number", value.trim()))
    })
}

pub fn parse_optional_decimal(field: &'static str, value: Option<&str>) -> Result<Option<Decimal>> {
    value.map(|v| parse_decimal(field, v)).transpose()
}

/// Parse one of the model enums (roles, statuses, methods) by its stored name
pub fn parse_enum<T: FromStr>(field: &'static str, value: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| LedgerError::validation(field, format!("unrecognized value '{}'", value)))
}

fn currency_prefix(currency: &str) -> String {
    match currency {
        "USD" => "$".to_string(),
        "EUR" => "€".to_string(),
        "GBP" => "£".to_string(),
        "JPY" => "¥".to_string(),
        other => format!("{} ", other),
    }
}

/// Group the integer digits of a two-decimal rendering with commas.
///
/// # Examples
/// ```
/// use fundbook::utils::format_amount;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_amount(dec!(1234567.891)), "1,234,567.89");
/// assert_eq!(format_amount(dec!(-500)), "-500.00");
/// ```
pub fn format_amount(value: Decimal) -> String {
    let is_negative = value < Decimal::ZERO;
    let formatted = format!("{:.2}", value.abs().round_dp(2));
    let (integer_part, decimal_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let with_separators: String = integer_part
        .chars()
        .rev()
        .enumerate()
        .flat_map(|(i, c)| {
            if i > 0 && i % 3 == 0 {
                vec![',', c]
            } else {
                vec![c]
            }
        })
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    let sign = if is_negative { "-" } else { "" };
    format!("{}{}.{}", sign, with_separators, decimal_part)
}

/// Format money with the currency's symbol, or its code when it has none.
///
/// # Examples
/// ```
/// use fundbook::utils::format_currency;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_currency(dec!(1000000), "USD"), "$1,000,000.00");
/// assert_eq!(format_currency(dec!(-12.5), "CHF"), "-CHF 12.50");
/// ```
pub fn format_currency(value: Decimal, currency: &str) -> String {
    let sign = if value < Decimal::ZERO { "-" } else { "" };
    format!("{}{}{}", sign, currency_prefix(currency), format_amount(value.abs()))
}

/// Format a percentage with up to four decimals, trailing zeros trimmed
///
/// # Examples
/// ```
/// use fundbook::utils::format_percent;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_percent(dec!(10)), "10%");
/// assert_eq!(format_percent(dec!(9.0909090909)), "9.0909%");
/// ```
pub fn format_percent(value: Decimal) -> String {
    format!("{}%", value.round_dp(4).normalize())
}
