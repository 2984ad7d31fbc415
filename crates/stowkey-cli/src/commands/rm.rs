//! rm command - remove an object

use super::CommandContext;
use crate::utils::confirm;
use anyhow::{Context, Result};
use colored::Colorize;

pub async fn execute(ctx: &CommandContext, key: &str, stored: bool, force: bool) -> Result<()> {
    let store = ctx.store()?;
    let resolved = ctx.resolve_key(store.resolver(), key, stored)?;

    if !force && !ctx.quiet {
        let msg = format!("Delete {} from bucket {}?", resolved, store.config().bucket);
        if !confirm(&msg)? {
            ctx.info("Cancelled");
            return Ok(());
        }
    }

    store
        .remove_file(&resolved)
        .await
        .with_context(|| format!("Delete of {} failed", resolved))?;

    if ctx.is_json() {
        println!("{}", serde_json::json!({ "deleted": resolved }));
    } else if !ctx.quiet {
        println!("{}: {}", "delete".red(), resolved);
    }

    Ok(())
}
