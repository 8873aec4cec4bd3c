//! fundbook - venture fund administration ledger
//!
//! This library tracks funds, their limited partners and capital calls,
//! records NAV calculations and follows portfolio companies' investments
//! and reported metrics.

pub mod api;
pub mod auth;
pub mod capital_calls;
pub mod config;
pub mod db;
pub mod error;
pub mod nav;
pub mod portfolio;
pub mod utils;
