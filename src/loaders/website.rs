use std::time::Duration;

use crate::core::errors::ApiError;
use crate::rag::Document;

pub struct WebsiteLoader {
    client: reqwest::Client,
    max_chars: usize,
}

impl WebsiteLoader {
    pub fn new(timeout: Duration, max_chars: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("llm-playground/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, max_chars }
    }

    pub async fn load(&self, url: &str) -> Result<Vec<Document>, ApiError> {
        tracing::info!("Fetching {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("Failed to fetch {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(ApiError::Upstream(format!(
                "Failed to fetch {}: HTTP {}",
                url,
                response.status()
            )));
        }

        let body = response.text().await.map_err(ApiError::upstream)?;
        let text: String = strip_html_tags(&body).chars().take(self.max_chars).collect();
        if text.trim().is_empty() {
            return Err(ApiError::Upstream(format!("No readable text found at {}", url)));
        }

        Ok(vec![Document::new(text, url, None)])
    }
}

/// Drops tags plus `<script>`/`<style>` bodies and collapses blank lines.
pub fn strip_html_tags(html: &str) -> String {
    let mut result = String::with_capacity(html.len() / 2);
    let lower = html.to_ascii_lowercase();
    let mut i = 0;

    while i < html.len() {
        let rest = &lower[i..];
        if rest.starts_with("<script") || rest.starts_with("<style") {
            let closing = if rest.starts_with("<script") {
                "</script>"
            } else {
                "</style>"
            };
            match rest.find(closing) {
                Some(end) => {
                    i += end + closing.len();
                    continue;
                }
                None => break,
            }
        }

        if starts_tag(rest) {
            match rest.find('>') {
                Some(end) => {
                    i += end + 1;
                    result.push(' ');
                    continue;
                }
                None => break,
            }
        }

        let Some(c) = html[i..].chars().next() else {
            break;
        };
        result.push(c);
        i += c.len_utf8();
    }

    let decoded = result
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">");

    decoded
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// `<` opens a tag only before a name, `/` or `!`; otherwise it is text.
fn starts_tag(rest: &str) -> bool {
    let mut chars = rest.chars();
    chars.next() == Some('<')
        && chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '/' || c == '!')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_scripts_and_styles() {
        let html = r#"
            <html>
            <head><script>var x = 1;</script><style>p { color: red; }</style></head>
            <body>
                <h1>Hello</h1>
                <p>World &amp; friends</p>
            </body>
            </html>
        "#;

        let text = strip_html_tags(html);
        assert_eq!(text, "Hello\nWorld & friends");
    }

    #[test]
    fn inline_tags_do_not_glue_words() {
        assert_eq!(strip_html_tags("<p>one<br>two</p>"), "one two");
    }

    #[test]
    fn bare_angle_brackets_stay_in_text() {
        assert_eq!(
            strip_html_tags("<p>if a < b and c > d</p><p>x <3 y</p>"),
            "if a < b and c > d x <3 y"
        );
        assert_eq!(strip_html_tags("<!-- note --><p>kept</p>"), "kept");
    }

    #[test]
    fn keeps_multibyte_text() {
        assert_eq!(strip_html_tags("<div>café — ünïcode</div>"), "café — ünïcode");
    }
}
