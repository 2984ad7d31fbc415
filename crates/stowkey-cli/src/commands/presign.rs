//! presign command - generate presigned URLs

use super::CommandContext;
use anyhow::Result;
use colored::Colorize;
use stowkey_core::types::{CannedAcl, SignOperation, SignOptions};

pub async fn execute(
    ctx: &CommandContext,
    key: &str,
    operation: SignOperation,
    expires: Option<u64>,
    acl: Option<CannedAcl>,
    content_type: Option<String>,
) -> Result<()> {
    let store = ctx.store()?;

    let options = SignOptions {
        expires_in: expires,
        acl,
        content_type,
    };
    ctx.debug(&format!("Signing {} URL for {} ({:?})", operation, key, options));

    let signed = store.get_signed_url(key, operation, options).await?;

    if ctx.is_json() {
        println!("{}", serde_json::to_string_pretty(&signed)?);
        return Ok(());
    }

    println!("{}", signed.url);
    if !ctx.quiet {
        eprintln!(
            "  {}: {} until {}",
            "Method".cyan(),
            signed.method,
            crate::utils::format_datetime(&signed.expires_at)
        );
        for (name, value) in &signed.headers {
            eprintln!("  {}: {}: {}", "Header".cyan(), name, value);
        }
    }

    Ok(())
}
