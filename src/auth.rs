//! Caller identity and the authorization policy
//!
//! Engines never check permissions themselves. Every entry point (CLI
//! command, API method) resolves the caller through an [`Authenticator`]
//! and asks the policy functions below before touching a fund.

use rusqlite::Connection;
use tracing::warn;

use crate::db::{self, Fund, Role, User};
use crate::error::{LedgerError, Result};

/// Resolves the user on whose behalf a request runs
pub trait Authenticator {
    fn authenticate(&self, conn: &Connection) -> Result<User>;
}

/// Always returns the same user; for embedding and tests
#[derive(Debug, Clone)]
pub struct StaticAuthenticator {
    pub user: User,
}

impl Authenticator for StaticAuthenticator {
    fn authenticate(&self, _conn: &Connection) -> Result<User> {
        Ok(self.user.clone())
    }
}

/// Looks the configured email up in the users table
#[derive(Debug, Clone)]
pub struct DbAuthenticator {
    pub email: Option<String>,
}

impl Authenticator for DbAuthenticator {
    fn authenticate(&self, conn: &Connection) -> Result<User> {
        let email = self.email.as_deref().ok_or_else(|| {
            LedgerError::permission("no user configured (set FUNDBOOK_USER or user_email)")
        })?;
        db::find_user_by_email(conn, email)?
            .ok_or_else(|| LedgerError::permission(format!("unknown user '{}'", email)))
    }
}

/// SUPER_ADMIN, or the FUND_MANAGER who owns the fund
pub fn can_mutate_fund(user: &User, fund: &Fund) -> bool {
    match user.role {
        Role::SuperAdmin => true,
        Role::FundManager => fund.owner_id == Some(user.id),
        Role::Analyst | Role::ReadOnly | Role::User => false,
    }
}

/// Plain USERs only see funds they own
pub fn can_view_fund(user: &User, fund: &Fund) -> bool {
    match user.role {
        Role::SuperAdmin | Role::FundManager | Role::Analyst | Role::ReadOnly => true,
        Role::User => fund.owner_id == Some(user.id),
    }
}

pub fn can_create_fund(user: &User) -> bool {
    matches!(user.role, Role::SuperAdmin | Role::FundManager)
}

/// Hard deletes are reserved for administrators
pub fn can_delete_fund(user: &User) -> bool {
    user.role == Role::SuperAdmin
}

/// Roster, investments' companies and metric updates
pub fn can_edit_portfolio(user: &User) -> bool {
    matches!(
        user.role,
        Role::SuperAdmin | Role::FundManager | Role::Analyst
    )
}

pub fn can_manage_users(user: &User) -> bool {
    user.role == Role::SuperAdmin
}

fn deny(user: &User, action: String) -> LedgerError {
    warn!(
        "Denied {} for user {} ({})",
        action,
        user.id,
        user.role.as_str()
    );
    LedgerError::permission(action)
}

/// Load a fund and require that the user may change it
pub fn require_fund_mutation(conn: &Connection, user: &User, fund_id: i64) -> Result<Fund> {
    let fund = db::get_fund(conn, fund_id)?;
    if !can_mutate_fund(user, &fund) {
        return Err(deny(user, format!("modify fund {}", fund_id)));
    }
    Ok(fund)
}

/// Load a fund and require that the user may read it
pub fn require_fund_view(conn: &Connection, user: &User, fund_id: i64) -> Result<Fund> {
    let fund = db::get_fund(conn, fund_id)?;
    if !can_view_fund(user, &fund) {
        return Err(deny(user, format!("view fund {}", fund_id)));
    }
    Ok(fund)
}

pub fn require(user: &User, allowed: bool, action: &str) -> Result<()> {
    if allowed {
        Ok(())
    } else {
        Err(deny(user, action.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::FundStatus;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn user(id: i64, role: Role) -> User {
        User {
            id,
            email: format!("user{}@example.com", id),
            name: format!("User {}", id),
            role,
            created_at: Utc::now(),
        }
    }

    fn fund_owned_by(owner_id: Option<i64>) -> Fund {
        Fund {
            id: 1,
            name: "Fund".to_string(),
            target_size: Decimal::ZERO,
            vintage_year: None,
            status: FundStatus::Raising,
            currency: "USD".to_string(),
            owner_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_mutation_policy() {
        let fund = fund_owned_by(Some(2));
        assert!(can_mutate_fund(&user(1, Role::SuperAdmin), &fund));
        assert!(can_mutate_fund(&user(2, Role::FundManager), &fund));
        assert!(!can_mutate_fund(&user(3, Role::FundManager), &fund));
        assert!(!can_mutate_fund(&user(2, Role::Analyst), &fund));
        assert!(!can_mutate_fund(&user(2, Role::ReadOnly), &fund));
        assert!(!can_mutate_fund(&user(2, Role::User), &fund));
    }

    #[test]
    fn test_unowned_fund_only_admin_mutates() {
        let fund = fund_owned_by(None);
        assert!(can_mutate_fund(&user(1, Role::SuperAdmin), &fund));
        assert!(!can_mutate_fund(&user(2, Role::FundManager), &fund));
    }

    #[test]
    fn test_view_policy() {
        let fund = fund_owned_by(Some(2));
        assert!(can_view_fund(&user(5, Role::ReadOnly), &fund));
        assert!(can_view_fund(&user(5, Role::Analyst), &fund));
        assert!(!can_view_fund(&user(5, Role::User), &fund));
        assert!(can_view_fund(&user(2, Role::User), &fund));
    }

    #[test]
    fn test_require_maps_to_permission_error() {
        let err = require(&user(1, Role::Analyst), false, "delete fund").unwrap_err();
        assert_eq!(err.kind(), "permission");
        assert!(require(&user(1, Role::SuperAdmin), true, "delete fund").is_ok());
    }

    #[test]
    fn test_role_capabilities() {
        assert!(can_delete_fund(&user(1, Role::SuperAdmin)));
        assert!(!can_delete_fund(&user(1, Role::FundManager)));
        assert!(can_create_fund(&user(1, Role::FundManager)));
        assert!(!can_create_fund(&user(1, Role::Analyst)));
        assert!(can_edit_portfolio(&user(1, Role::Analyst)));
        assert!(!can_edit_portfolio(&user(1, Role::ReadOnly)));
    }
}
