use anyhow::Result;
use migaswatch_common::Sentiment;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::Engine;

/// The only category tags the system persists. Anything else the model
/// invents is filtered out.
pub const ALLOWED_CATEGORIES: &[&str] = &[
    "Produksi",
    "Eksplorasi",
    "Regulasi",
    "Investasi",
    "Lingkungan",
    "Infrastruktur",
    "Keselamatan",
    "Personel",
    "Pasar",
    "Komunitas",
    "Teknologi",
    "Umum",
];

pub const FALLBACK_CATEGORY: &str = "Umum";

/// Crawled content is capped at this many characters in the prompt.
const PROMPT_CONTENT_CAP: usize = 15_000;

const SYSTEM_PROMPT: &str = "Anda adalah analis berita industri minyak dan gas bumi Indonesia. \
Analisis artikel berita berbahasa Indonesia berikut. Buat ringkasan singkat (2-3 kalimat), \
tentukan sentimen pemberitaan terhadap industri migas (positive, negative, atau neutral), \
pilih kategori yang relevan dari daftar: Produksi, Eksplorasi, Regulasi, Investasi, Lingkungan, \
Infrastruktur, Keselamatan, Personel, Pasar, Komunitas, Teknologi, Umum, dan jelaskan alasan \
penilaian sentimen secara singkat.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl From<SentimentLabel> for Sentiment {
    fn from(label: SentimentLabel) -> Self {
        match label {
            SentimentLabel::Positive => Sentiment::Positive,
            SentimentLabel::Negative => Sentiment::Negative,
            SentimentLabel::Neutral => Sentiment::Neutral,
        }
    }
}

/// Structured output contract for one article analysis.
#[derive(Debug, Deserialize, JsonSchema)]
struct ArticleAnalysis {
    summary: String,
    sentiment: SentimentLabel,
    categories: Vec<String>,
    reason: String,
}

/// A validated, sanitized analysis ready for persistence.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub summary: String,
    pub sentiment: Sentiment,
    pub categories: Vec<String>,
    pub reason: String,
}

/// Keep only allow-listed categories, deduplicated in order of appearance.
/// An empty result falls back to the catch-all category. Idempotent.
pub fn sanitize_categories(raw: Vec<String>) -> Vec<String> {
    let mut kept: Vec<String> = Vec::new();
    for cat in raw {
        let trimmed = cat.trim();
        if ALLOWED_CATEGORIES.contains(&trimmed) && !kept.iter().any(|k| k == trimmed) {
            kept.push(trimmed.to_string());
        }
    }
    if kept.is_empty() {
        kept.push(FALLBACK_CATEGORY.to_string());
    }
    kept
}

/// Body preference: crawled content (capped), else the snippet, else an
/// explicit no-content marker.
pub fn build_user_prompt(title: &str, snippet: Option<&str>, content: Option<&str>) -> String {
    let body = match content {
        Some(c) if !c.trim().is_empty() => {
            let trimmed = c.trim();
            if trimmed.chars().count() > PROMPT_CONTENT_CAP {
                trimmed.chars().take(PROMPT_CONTENT_CAP).collect()
            } else {
                trimmed.to_string()
            }
        }
        _ => snippet
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("No content available.")
            .to_string(),
    };

    format!("Judul: {title}\n\nIsi artikel:\n{body}")
}

impl Engine {
    /// Run one article through the LLM and sanitize the result.
    pub(crate) async fn analyze_article(
        &self,
        title: &str,
        snippet: Option<&str>,
        content: Option<&str>,
    ) -> Result<Analysis> {
        let user_prompt = build_user_prompt(title, snippet, content);
        let raw: ArticleAnalysis = self.llm.extract(SYSTEM_PROMPT, &user_prompt).await?;

        Ok(Analysis {
            summary: raw.summary,
            sentiment: raw.sentiment.into(),
            categories: sanitize_categories(raw.categories),
            reason: raw.reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_filters_unknown_categories() {
        let out = sanitize_categories(vec![
            "Produksi".into(),
            "Hoax".into(),
            "Ekonomi".into(),
        ]);
        assert_eq!(out, vec!["Produksi"]);
    }

    #[test]
    fn sanitize_falls_back_to_umum() {
        assert_eq!(sanitize_categories(vec!["Hoax".into()]), vec!["Umum"]);
        assert_eq!(sanitize_categories(vec![]), vec!["Umum"]);
    }

    #[test]
    fn sanitize_is_idempotent() {
        let cases = vec![
            vec!["Produksi".into(), "Hoax".into()],
            vec!["Hoax".into()],
            vec![],
            vec!["Umum".into(), "Pasar".into(), "Umum".into()],
        ];
        for case in cases {
            let once = sanitize_categories(case);
            let twice = sanitize_categories(once.clone());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn prompt_prefers_content_then_snippet() {
        let p = build_user_prompt("Judul", Some("ringkasan"), Some("isi lengkap artikel"));
        assert!(p.contains("isi lengkap artikel"));
        assert!(!p.contains("ringkasan"));

        let p = build_user_prompt("Judul", Some("ringkasan"), None);
        assert!(p.contains("ringkasan"));

        let p = build_user_prompt("Judul", None, None);
        assert!(p.contains("No content available."));
    }

    #[test]
    fn prompt_caps_long_content() {
        let content = "x".repeat(20_000);
        let p = build_user_prompt("Judul", None, Some(&content));
        let body_len = p.chars().filter(|c| *c == 'x').count();
        assert_eq!(body_len, 15_000);
    }

    #[test]
    fn sentiment_labels_deserialize() {
        let raw: ArticleAnalysis = serde_json::from_str(
            r#"{"summary":"s","sentiment":"negative","categories":["Pasar"],"reason":"r"}"#,
        )
        .unwrap();
        assert_eq!(raw.sentiment, SentimentLabel::Negative);
    }
}
