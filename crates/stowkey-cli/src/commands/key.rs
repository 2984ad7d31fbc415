//! key command - build a hierarchical object key

use super::CommandContext;
use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use stowkey_core::KeyBuilder;

#[derive(Debug, Serialize)]
pub struct KeyOutput {
    pub key: String,
    pub resolved: String,
    pub url: String,
}

pub fn build(
    ctx: &CommandContext,
    base: &str,
    filename: &str,
    id: Option<&str>,
    module: Option<&str>,
    name: Option<&str>,
) -> Result<KeyOutput> {
    let resolver = ctx.resolver()?;
    let mut builder = KeyBuilder::new(base);
    if let Some(module) = module {
        builder.module(module);
    }
    let id = id.as_ref().map(|id| id as &dyn std::fmt::Display);
    let key = builder.build(id, filename, name);
    let resolved = resolver.resolve(&key)?;

    Ok(KeyOutput {
        url: resolver.url_for(&resolved),
        key: key.into_string(),
        resolved: resolved.into_string(),
    })
}

pub fn execute(
    ctx: &CommandContext,
    base: &str,
    filename: &str,
    id: Option<String>,
    module: Option<String>,
    name: Option<String>,
) -> Result<()> {
    let output = build(
        ctx,
        base,
        filename,
        id.as_deref(),
        module.as_deref(),
        name.as_deref(),
    )?;

    if ctx.is_json() {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if ctx.quiet {
        println!("{}", output.key);
    } else {
        println!("  {}: {}", "Key".cyan(), output.key);
        println!("  {}: {}", "Stored".cyan(), output.resolved);
        println!("  {}: {}", "URL".cyan(), output.url);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OutputFormat;
    use stowkey_core::StorageConfig;

    fn ctx() -> CommandContext {
        CommandContext {
            config: StorageConfig::new("", "", "media", "us-east-1").with_prefix("dev"),
            output_format: OutputFormat::Text,
            verbose: false,
            quiet: true,
        }
    }

    #[test]
    fn test_build_with_everything() {
        let out = build(&ctx(), "users", "me.png", Some("42"), Some("profile"), Some("avatar"))
            .unwrap();
        assert_eq!(out.key, "/users/42/profile/avatar.png");
        assert_eq!(out.resolved, "/dev/users/42/profile/avatar.png");
        assert_eq!(
            out.url,
            "https://media.s3.us-east-1.amazonaws.com/dev/users/42/profile/avatar.png"
        );
    }

    #[test]
    fn test_build_unique_leaf() {
        let out = build(&ctx(), "groups", "cover.jpeg", None, None, None).unwrap();
        assert!(out.key.starts_with("/groups/"));
        assert!(out.key.ends_with(".jpeg"));
        assert_eq!(out.key.matches('/').count(), 2);
    }
}
