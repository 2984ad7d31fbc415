//! info command - object metadata

use super::CommandContext;
use crate::utils::{format_datetime, format_size};
use anyhow::{Context, Result};
use colored::Colorize;

pub async fn execute(ctx: &CommandContext, key: &str, stored: bool) -> Result<()> {
    let store = ctx.store()?;
    let resolved = ctx.resolve_key(store.resolver(), key, stored)?;

    let info = store
        .file_info(&resolved)
        .await
        .with_context(|| format!("Failed to get metadata for {}", resolved))?;

    if ctx.is_json() {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("{}", store.url_for(&resolved).blue().bold());
    println!();
    println!("  {}: {}", "Key".cyan(), info.key);
    println!("  {}: {} ({})", "Size".cyan(), info.size, format_size(info.size));
    if let Some(ct) = &info.content_type {
        println!("  {}: {}", "Content-Type".cyan(), ct);
    }
    if let Some(lm) = &info.last_modified {
        println!("  {}: {}", "Last-Modified".cyan(), format_datetime(lm));
    }
    if let Some(etag) = &info.etag {
        println!("  {}: {}", "ETag".cyan(), etag);
    }

    if !info.metadata.is_empty() {
        println!();
        println!("  {}:", "Metadata".cyan());
        let mut entries: Vec<_> = info.metadata.iter().collect();
        entries.sort();
        for (k, v) in entries {
            println!("    {}: {}", k, v);
        }
    }

    Ok(())
}
