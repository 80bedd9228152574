//! Loaders for remote content: YouTube transcripts and plain websites.

pub mod transcript;
pub mod url;
pub mod website;

use std::time::Duration;

use crate::core::config::settings::SummarizeSettings;
use crate::core::errors::ApiError;
use crate::rag::Document;

pub use self::url::{is_youtube_url, validate_url};
pub use transcript::TranscriptLoader;
pub use website::WebsiteLoader;

/// Where a summarised text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Youtube,
    Website,
}

/// Validates `raw` and loads it with the matching loader.
pub async fn load_url(
    raw: &str,
    settings: &SummarizeSettings,
) -> Result<(SourceKind, Vec<Document>), ApiError> {
    let url = validate_url(raw)?;

    if is_youtube_url(&url) {
        let loader = TranscriptLoader::new(&settings.ytdlp_binary, &settings.subtitle_lang);
        return Ok((SourceKind::Youtube, loader.load(url.as_str()).await?));
    }

    let loader = WebsiteLoader::new(
        Duration::from_secs(settings.fetch_timeout_secs.max(1)),
        settings.max_fetch_chars,
    );
    Ok((SourceKind::Website, loader.load(url.as_str()).await?))
}
