//! Users command implementation.

use super::Context;
use crate::error::CliResult;
use routelog_core::AccountService;
use std::io::Write;

/// Prints every account username, one per line. Soft-deleted accounts
/// are included; their records are still in place.
pub async fn run(ctx: &Context, out: &mut (dyn Write + Send)) -> CliResult<Vec<String>> {
    let users = AccountService::new(ctx.kv()?, ctx.clock())
        .with_pager_config(ctx.pager())
        .list_users()
        .await?;
    for user in &users {
        writeln!(out, "{user}")?;
    }
    Ok(users)
}
