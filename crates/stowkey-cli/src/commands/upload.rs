//! upload command - upload a file or stdin

use super::CommandContext;
use crate::utils::format_size;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use stowkey_core::types::{CannedAcl, UploadOptions};
use stowkey_core::ObjectKey;
use stowkey_storage::{LazyFile, UploadSource};

pub struct UploadArgs {
    pub acl: Option<CannedAcl>,
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    pub metadata: Vec<(String, String)>,
}

impl UploadArgs {
    fn into_options(self) -> UploadOptions {
        UploadOptions {
            acl: self.acl,
            content_type: self.content_type,
            cache_control: self.cache_control,
            metadata: self.metadata.into_iter().collect(),
        }
    }
}

/// `-` reads stdin; anything else is a local file opened when the upload starts
pub fn source_for(file: &str) -> Result<UploadSource> {
    if file == "-" {
        return Ok(UploadSource::from_reader(tokio::io::stdin()));
    }

    let path = Path::new(file);
    if !path.is_file() {
        anyhow::bail!("Not a file: {}", file);
    }
    Ok(UploadSource::deferred(LazyFile::new(path)))
}

pub async fn execute(ctx: &CommandContext, file: &str, key: &str, args: UploadArgs) -> Result<()> {
    let store = ctx.store()?;
    let key = ObjectKey::parse(key)?;
    let source = source_for(file)?;

    ctx.debug(&format!("Uploading {} to {}", file, key));

    let result = store
        .upload(source, &key, args.into_options())
        .await
        .with_context(|| format!("Upload of {} failed", file))?;

    if ctx.is_json() {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if ctx.quiet {
        println!("{}", result.key);
    } else {
        println!(
            "{}: {} -> {} ({}, {})",
            "upload".green(),
            file,
            result.key,
            format_size(result.size),
            result.content_type
        );
        println!("  {}: {}", "URL".cyan(), result.location);
        if let Some(etag) = &result.etag {
            println!("  {}: {}", "ETag".cyan(), etag);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_into_options() {
        let options = UploadArgs {
            acl: Some(CannedAcl::Private),
            content_type: None,
            cache_control: Some("max-age=60".into()),
            metadata: vec![("owner".into(), "42".into())],
        }
        .into_options();

        assert_eq!(options.acl, Some(CannedAcl::Private));
        assert_eq!(options.cache_control.as_deref(), Some("max-age=60"));
        assert_eq!(options.metadata.get("owner").map(String::as_str), Some("42"));
    }

    #[test]
    fn test_source_for() {
        assert!(matches!(source_for("-").unwrap(), UploadSource::Stream(_)));

        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        assert!(matches!(source_for(path).unwrap(), UploadSource::Deferred(_)));

        let dir = tempfile::tempdir().unwrap();
        assert!(source_for(dir.path().to_str().unwrap()).is_err());
    }
}
