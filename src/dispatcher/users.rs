use anyhow::Result;

use super::Context;
use crate::cli::{formatters, UserCommands};
use fundbook::auth;
use fundbook::db::{self, Role};
use fundbook::utils::parse_enum;

pub async fn dispatch_users(action: UserCommands, ctx: &Context) -> Result<()> {
    let conn = ctx.open()?;
    let user = ctx.current_user(&conn)?;

    match action {
        UserCommands::Add { email, name, role } => {
            auth::require(&user, auth::can_manage_users(&user), "add users")?;
            let role: Role = parse_enum("role", &role)?;
            let created = db::insert_user(&conn, &email, &name, role)?;
            ctx.emit(&created, |u| {
                formatters::format_success(&format!(
                    "Added {} as {} (id {})",
                    u.email,
                    u.role.as_str(),
                    u.id
                ))
            })
        }
        UserCommands::List => {
            auth::require(&user, auth::can_manage_users(&user), "list users")?;
            let users = db::list_users(&conn)?;
            ctx.emit(&users, |u| formatters::format_users_table(u))
        }
        UserCommands::Whoami => ctx.emit(&user, |u| {
            format!("{} <{}> - {}", u.name, u.email, u.role.as_str())
        }),
    }
}
