#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;

use std::path;

use anyhow::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::fs;

/// Rendered when the profile image fails to load in the browser.
pub const FALLBACK_AVATAR: &str = "https://api.dicebear.com/7.x/avataaars/svg?seed=Felix";

fn mime_type(file_path: &path::Path) -> &'static str {
    let extension = file_path
        .extension()
        .map(|ext| return ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    return match extension.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "image/jpeg",
    };
}

pub struct Profile {}

impl Profile {
    /// Resolves the configured profile image to something usable as an
    /// `<img src>`. URLs pass through; local files are embedded as a Base64
    /// data URI so the page does not need to serve them.
    pub async fn resolve(source: &str) -> Result<String> {
        let source = source.trim();
        if source.is_empty() {
            return Ok(FALLBACK_AVATAR.to_string());
        }

        if source.starts_with("http://")
            || source.starts_with("https://")
            || source.starts_with("data:")
        {
            return Ok(source.to_string());
        }

        let file_path = path::PathBuf::from(source);
        let bytes = fs::read(&file_path).await?;
        tracing::debug!(path = source, bytes = bytes.len(), "Embedding profile image");

        return Ok(format!(
            "data:{};base64,{}",
            mime_type(&file_path),
            STANDARD.encode(bytes)
        ));
    }
}
