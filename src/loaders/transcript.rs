//! YouTube transcripts through the external `yt-dlp` subtitle extractor.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tokio::process::Command;

use crate::core::errors::ApiError;
use crate::rag::Document;

pub struct TranscriptLoader {
    binary: String,
    lang: String,
}

impl TranscriptLoader {
    pub fn new(binary: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            lang: lang.into(),
        }
    }

    fn resolve_binary(&self) -> Result<PathBuf, ApiError> {
        which::which(&self.binary).map_err(|_| {
            ApiError::ServiceUnavailable(format!(
                "'{}' was not found on PATH; install yt-dlp to summarize videos",
                self.binary
            ))
        })
    }

    pub async fn load(&self, url: &str) -> Result<Vec<Document>, ApiError> {
        let binary = self.resolve_binary()?;
        let tmpdir = tempfile::tempdir().map_err(ApiError::internal)?;
        let output_template = tmpdir.path().join("%(id)s.%(ext)s");

        tracing::info!("Fetching subtitles for {}", url);
        let output = Command::new(&binary)
            .arg("--skip-download")
            .arg("--write-auto-sub")
            .arg("--write-sub")
            .args(["--sub-lang", &self.lang])
            .args(["--sub-format", "vtt"])
            .arg("-o")
            .arg(&output_template)
            .arg(url)
            .output()
            .await
            .map_err(|e| ApiError::Upstream(format!("Failed to run yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!("yt-dlp exited with {}: {}", output.status, stderr.trim());
            return Err(ApiError::Upstream(
                "Failed to fetch subtitles using yt-dlp".to_string(),
            ));
        }

        let subtitle_file = find_subtitle_file(tmpdir.path())?.ok_or_else(|| {
            ApiError::Upstream("No subtitles available for this video".to_string())
        })?;

        let raw = tokio::fs::read_to_string(&subtitle_file)
            .await
            .map_err(ApiError::internal)?;
        let text = vtt_to_text(&raw);
        if text.is_empty() {
            return Err(ApiError::Upstream(
                "No subtitles available for this video".to_string(),
            ));
        }

        Ok(vec![Document::new(text, url, None)])
    }
}

fn find_subtitle_file(dir: &Path) -> Result<Option<PathBuf>, ApiError> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(ApiError::internal)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().map(|ext| ext == "vtt").unwrap_or(false))
        .collect();
    candidates.sort();
    Ok(candidates.into_iter().next())
}

fn inline_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^>]*>").expect("static regex"))
}

/// Plain text from a WebVTT file: cue text only, in order, with the
/// rolling duplicates of auto-generated captions collapsed.
pub fn vtt_to_text(vtt: &str) -> String {
    let tags = inline_tag_pattern();
    let mut lines: Vec<String> = Vec::new();

    for line in vtt.lines() {
        let line = line.trim();
        if line.is_empty()
            || line.contains("-->")
            || line.starts_with("WEBVTT")
            || line.starts_with("NOTE")
            || line.starts_with("Kind:")
            || line.starts_with("Language:")
            || line.chars().all(|c| c.is_ascii_digit())
        {
            continue;
        }

        let cleaned = tags.replace_all(line, "");
        let cleaned = cleaned
            .replace("&nbsp;", " ")
            .replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">");
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            continue;
        }
        if lines.last().map(|prev| prev == cleaned).unwrap_or(false) {
            continue;
        }
        lines.push(cleaned.to_string());
    }

    lines.join(" ")
}
