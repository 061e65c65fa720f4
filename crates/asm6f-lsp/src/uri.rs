//! Path/URI conversion helpers.
use std::path::Path;

use url::Url;

/// Convert a filesystem path to a canonical `file://` URI.
///
/// Relative paths are resolved against the current working directory so
/// the URI always carries an absolute path.
pub fn path_to_uri(path: &Path) -> String {
    let abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    };
    match Url::from_file_path(&abs) {
        Ok(url) => url.to_string(),
        Err(()) => format!("file://{}", abs.to_string_lossy()),
    }
}

/// Normalize a document URI received from the client.
///
/// Round-trips `file://` URIs through the filesystem path representation
/// so cache keys and diagnostic keys agree regardless of how the client
/// spelled the URI. Non-file URIs pass through unchanged.
pub fn normalize_uri(uri: &str) -> String {
    match Url::parse(uri) {
        Ok(url) if url.scheme() == "file" => match url.to_file_path() {
            Ok(path) => path_to_uri(&path),
            Err(()) => uri.to_string(),
        },
        _ => uri.to_string(),
    }
}
