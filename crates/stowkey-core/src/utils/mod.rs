//! Utility functions

use crate::DEFAULT_CONTENT_TYPE;
use tracing::debug;

/// Extension of a file name including the leading dot.
///
/// Only the last dot counts; names without a dot, or whose only dot is the
/// first character (`.env`), have no extension.
pub fn extension(filename: &str) -> &str {
    let name = filename
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename);
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[idx..],
        _ => "",
    }
}

/// Look up a content type from the extension of `filename`
pub fn guess_content_type(filename: &str) -> Option<String> {
    if extension(filename).is_empty() {
        return None;
    }
    mime_guess::from_path(filename)
        .first()
        .map(|mime| mime.essence_str().to_string())
}

/// Pick the content type for an upload.
///
/// Order: explicit value, extension lookup on `filename`, the type reported
/// by the source, then `application/octet-stream`. Never fails.
pub fn resolve_content_type(
    explicit: Option<&str>,
    filename: Option<&str>,
    reported: Option<&str>,
) -> String {
    if let Some(content_type) = explicit.filter(|c| !c.trim().is_empty()) {
        return content_type.to_string();
    }

    if let Some(content_type) = filename.and_then(guess_content_type) {
        return content_type;
    }

    if let Some(content_type) = reported.filter(|c| !c.trim().is_empty()) {
        debug!(
            filename = filename.unwrap_or(""),
            "No MIME mapping for extension, using source content type {}", content_type
        );
        return content_type.to_string();
    }

    debug!(
        filename = filename.unwrap_or(""),
        "Content type unresolved, defaulting to {}", DEFAULT_CONTENT_TYPE
    );
    DEFAULT_CONTENT_TYPE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension() {
        assert_eq!(extension("image.jpg"), ".jpg");
        assert_eq!(extension("archive.tar.gz"), ".gz");
        assert_eq!(extension("README"), "");
        assert_eq!(extension(".bashrc"), "");
        assert_eq!(extension("dir.d/file"), "");
        assert_eq!(extension("name."), ".");
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type("a.png").as_deref(), Some("image/png"));
        assert_eq!(guess_content_type("a.JPG").as_deref(), Some("image/jpeg"));
        assert_eq!(guess_content_type("/users/1/doc.pdf").as_deref(), Some("application/pdf"));
        assert_eq!(guess_content_type("noext"), None);
        assert_eq!(guess_content_type("a.unknownext"), None);
    }

    #[test]
    fn test_resolve_content_type_chain() {
        assert_eq!(
            resolve_content_type(Some("text/plain"), Some("a.png"), Some("image/gif")),
            "text/plain"
        );
        assert_eq!(
            resolve_content_type(None, Some("a.png"), Some("image/gif")),
            "image/png"
        );
        assert_eq!(
            resolve_content_type(None, Some("blob.unknownext"), Some("image/gif")),
            "image/gif"
        );
        assert_eq!(
            resolve_content_type(None, None, None),
            "application/octet-stream"
        );
        assert_eq!(
            resolve_content_type(Some(" "), Some("noext"), Some("")),
            "application/octet-stream"
        );
    }
}
