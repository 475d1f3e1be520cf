use migaswatch_store::Topic;
use uuid::Uuid;

/// The text a topic's keywords are matched against.
fn searchable_text(title: &str, snippet: Option<&str>) -> String {
    format!("{} {}", title, snippet.unwrap_or("")).to_lowercase()
}

/// Every enabled, non-empty-keyword topic whose keyword set OR-matches the
/// article text (case-insensitive substring). Topics with no keywords never
/// match; they only drive aggregator search and the deletion cascade.
pub fn matching_topics(topics: &[Topic], title: &str, snippet: Option<&str>) -> Vec<Uuid> {
    let text = searchable_text(title, snippet);
    topics
        .iter()
        .filter(|t| t.enabled && !t.keywords.is_empty())
        .filter(|t| {
            t.keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .any(|k| !k.is_empty() && text.contains(&k))
        })
        .map(|t| t.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn topic(name: &str, keywords: &[&str], enabled: bool) -> Topic {
        Topic {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            enabled,
            last_fetched_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn matches_are_case_insensitive_substrings() {
        let topics = vec![topic("migas", &["skk migas"], true)];
        let hit = matching_topics(&topics, "SKK MIGAS umumkan lelang blok baru", None);
        assert_eq!(hit, vec![topics[0].id]);
    }

    #[test]
    fn snippet_contributes_to_matching() {
        let topics = vec![topic("pertamina", &["Pertamina"], true)];
        let hit = matching_topics(
            &topics,
            "Produksi kilang naik",
            Some("Pertamina mencatat kenaikan output"),
        );
        assert_eq!(hit.len(), 1);
    }

    #[test]
    fn article_can_match_multiple_topics() {
        let topics = vec![
            topic("migas", &["migas"], true),
            topic("investasi", &["investasi"], true),
            topic("lain", &["geothermal"], true),
        ];
        let hit = matching_topics(&topics, "Investasi hulu migas tembus target", None);
        assert_eq!(hit, vec![topics[0].id, topics[1].id]);
    }

    #[test]
    fn disabled_and_keywordless_topics_never_match() {
        let topics = vec![
            topic("disabled", &["migas"], false),
            topic("empty", &[], true),
            topic("blank", &["   "], true),
        ];
        assert!(matching_topics(&topics, "berita migas hari ini", None).is_empty());
    }
}
