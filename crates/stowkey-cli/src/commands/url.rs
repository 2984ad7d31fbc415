//! url command - public URL of a key

use super::CommandContext;
use anyhow::Result;

pub fn execute(ctx: &CommandContext, key: &str, stored: bool) -> Result<()> {
    let resolver = ctx.resolver()?;
    let resolved = ctx.resolve_key(&resolver, key, stored)?;
    let url = resolver.url_for(&resolved);

    if ctx.is_json() {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "key": resolved,
                "url": url,
            }))?
        );
    } else {
        println!("{}", url);
    }

    Ok(())
}
