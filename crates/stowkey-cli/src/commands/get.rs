//! get command - download an object to a file or stdout

use super::CommandContext;
use crate::utils::format_size;
use anyhow::{Context, Result};
use colored::Colorize;
use futures::TryStreamExt;
use std::path::Path;
use tokio::io::{AsyncWrite, AsyncWriteExt};

pub async fn execute(ctx: &CommandContext, key: &str, out: Option<&Path>, stored: bool) -> Result<()> {
    let store = ctx.store()?;
    let resolved = ctx.resolve_key(store.resolver(), key, stored)?;

    let body = store
        .file(&resolved)
        .await
        .with_context(|| format!("Failed to get {}", resolved))?;

    let written = match out {
        Some(path) => {
            let mut file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create {}", path.display()))?;
            copy_body(body.stream, &mut file).await?
        }
        None => copy_body(body.stream, &mut tokio::io::stdout()).await?,
    };

    if let Some(path) = out {
        if !ctx.quiet {
            println!(
                "{}: {} -> {} ({})",
                "download".green(),
                resolved,
                path.display(),
                format_size(written)
            );
        }
    }

    Ok(())
}

async fn copy_body<W>(mut stream: stowkey_storage::BodyStream, writer: &mut W) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;
    while let Some(chunk) = stream.try_next().await? {
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    writer.flush().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use stowkey_storage::BodyStream;

    fn chunks(parts: &[&'static [u8]]) -> BodyStream {
        let items: Vec<std::io::Result<_>> = parts.iter().map(|p| Ok(p.to_vec().into())).collect();
        futures::stream::iter(items).boxed()
    }

    #[tokio::test]
    async fn test_copy_body() {
        let mut out = Vec::new();
        let written = copy_body(chunks(&[&b"hello "[..], &b"world"[..]]), &mut out).await.unwrap();
        assert_eq!(written, 11);
        assert_eq!(out, b"hello world");
    }
}
