use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, Duration, Utc};
use migaswatch_common::{IngestReport, NewsItem, SourceType};
use migaswatch_store::{ArticleInsert, Topic};
use tokio::sync::Semaphore;
use tracing::{info, warn};
use uuid::Uuid;

use crate::matcher::matching_topics;
use crate::reader::split_publisher;
use crate::Engine;

/// Only the first N keywords of a topic are searched per run.
pub const AGGREGATOR_KEYWORD_CAP: usize = 5;
/// Cutoff for topics that have never been fetched.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 7;

fn cutoff_for(last_fetched_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    last_fetched_at.unwrap_or(now - Duration::days(DEFAULT_LOOKBACK_DAYS))
}

/// Articles without a publish timestamp never pass a cutoff comparison.
fn passes_cutoff(published_at: Option<DateTime<Utc>>, cutoff: DateTime<Utc>) -> bool {
    published_at.map(|p| p > cutoff).unwrap_or(false)
}

/// Merge duplicate links within one incoming batch, unioning their
/// matched-topic sets. First occurrence wins on metadata.
fn dedupe_items(items: Vec<NewsItem>) -> Vec<NewsItem> {
    let mut order: Vec<String> = Vec::new();
    let mut by_link: HashMap<String, NewsItem> = HashMap::new();

    for item in items {
        match by_link.get_mut(&item.link) {
            Some(existing) => {
                for id in item.matched_topic_ids {
                    if !existing.matched_topic_ids.contains(&id) {
                        existing.matched_topic_ids.push(id);
                    }
                }
            }
            None => {
                order.push(item.link.clone());
                by_link.insert(item.link.clone(), item);
            }
        }
    }

    order.into_iter().filter_map(|l| by_link.remove(&l)).collect()
}

struct UpsertPlan {
    inserts: Vec<ArticleInsert>,
    /// Existing rows whose matched-topic set grew: (link, merged set).
    updates: Vec<(String, Vec<Uuid>)>,
    /// Existing rows already carrying every incoming topic id.
    unchanged: usize,
    /// Topics that caused articles in this batch; candidates for a
    /// `last_fetched_at` bump.
    touched_topics: Vec<Uuid>,
}

/// Partition a deduplicated batch into inserts and topic-set merges. Existing
/// rows are only ever touched on `matched_topic_ids`; enrichment columns are
/// out of reach by construction.
fn plan_upsert(items: Vec<NewsItem>, existing: &HashMap<String, Vec<Uuid>>) -> UpsertPlan {
    let mut plan = UpsertPlan {
        inserts: Vec::new(),
        updates: Vec::new(),
        unchanged: 0,
        touched_topics: Vec::new(),
    };

    for item in items {
        for id in &item.matched_topic_ids {
            if !plan.touched_topics.contains(id) {
                plan.touched_topics.push(*id);
            }
        }

        match existing.get(&item.link) {
            Some(current) => {
                let mut merged = current.clone();
                let mut grew = false;
                for id in &item.matched_topic_ids {
                    if !merged.contains(id) {
                        merged.push(*id);
                        grew = true;
                    }
                }
                if grew {
                    plan.updates.push((item.link, merged));
                } else {
                    plan.unchanged += 1;
                }
            }
            None => {
                let url_decoded = item.source_type == SourceType::Rss;
                plan.inserts.push(ArticleInsert {
                    link: item.link,
                    source_type: item.source_type,
                    title: item.title,
                    snippet: item.snippet,
                    source_name: item.source_name,
                    source_url: item.source_url,
                    photo_url: item.photo_url,
                    published_at: item.published_at,
                    matched_topic_ids: item.matched_topic_ids,
                    url_decoded,
                });
            }
        }
    }

    plan
}

impl Engine {
    /// Aggregator fan-out: for every enabled topic with keywords, search the
    /// first keywords sequentially with a politeness gap, drop stale results
    /// by the per-topic cutoff, and upsert the survivors.
    pub async fn ingest_aggregator(&self, user_id: Uuid) -> IngestReport {
        let now = Utc::now();
        let mut report = IngestReport::default();

        let topics = match self.store.enabled_topics(user_id).await {
            Ok(t) => t,
            Err(e) => {
                report.errors.push(format!("load topics: {e}"));
                return report;
            }
        };
        let searchable: Vec<&Topic> = topics.iter().filter(|t| !t.keywords.is_empty()).collect();
        if searchable.is_empty() {
            return report;
        }
        let probed: Vec<Uuid> = searchable.iter().map(|t| t.id).collect();

        let mut collected: Vec<NewsItem> = Vec::new();
        let mut first = true;
        for topic in &searchable {
            let cutoff = cutoff_for(topic.last_fetched_at, now);
            for keyword in topic.keywords.iter().take(AGGREGATOR_KEYWORD_CAP) {
                if !first {
                    tokio::time::sleep(self.pacing.search_delay).await;
                }
                first = false;

                let url = gnews_client::search_url(keyword);
                match self.reader.fetch(&url).await {
                    Ok(items) => {
                        for item in items {
                            if !passes_cutoff(item.published_at, cutoff) {
                                continue;
                            }
                            let (title, publisher) = split_publisher(&item.title);
                            collected.push(NewsItem {
                                link: item.link,
                                title,
                                snippet: item.snippet,
                                source_name: publisher,
                                source_url: None,
                                // Aggregator results carry no photo.
                                photo_url: None,
                                published_at: item.published_at,
                                source_type: SourceType::Aggregator,
                                matched_topic_ids: vec![topic.id],
                            });
                        }
                    }
                    Err(e) => {
                        warn!(topic = %topic.name, keyword = %keyword, error = %e, "aggregator search failed");
                        report.errors.push(format!("search '{keyword}': {e}"));
                    }
                }
            }
        }

        let (upserted, _) = self.upsert(user_id, collected).await;
        report.absorb(upserted);

        // Every searched topic was probed up to `now`, matches or not.
        if report.is_success() {
            if let Err(e) = self.store.touch_topics_fetched(user_id, &probed, now).await {
                report.errors.push(format!("update last_fetched_at: {e}"));
            }
        }

        info!(user_id = %user_id, inserted = report.inserted, skipped = report.skipped,
              errors = report.errors.len(), "aggregator ingest complete");
        report
    }

    /// RSS fan-out: fetch every enabled feed with bounded parallelism, keep
    /// items matching at least one topic, drop stale items by the earliest
    /// per-topic cutoff (feeds are not per-topic).
    pub async fn ingest_rss(&self, user_id: Uuid) -> IngestReport {
        let now = Utc::now();
        let mut report = IngestReport::default();

        let topics = match self.store.enabled_topics(user_id).await {
            Ok(t) => t,
            Err(e) => {
                report.errors.push(format!("load topics: {e}"));
                return report;
            }
        };
        let feeds = match self.store.enabled_feeds(user_id).await {
            Ok(f) => f,
            Err(e) => {
                report.errors.push(format!("load feeds: {e}"));
                return report;
            }
        };
        if feeds.is_empty() {
            return report;
        }

        let cutoff = topics
            .iter()
            .map(|t| cutoff_for(t.last_fetched_at, now))
            .min()
            .unwrap_or_else(|| cutoff_for(None, now));

        let semaphore = Arc::new(Semaphore::new(self.pacing.rss_concurrency.max(1)));
        let mut handles = Vec::with_capacity(feeds.len());
        for feed in feeds {
            let semaphore = semaphore.clone();
            let reader = self.reader.clone();
            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => return (feed, Err(anyhow!("fetch slot closed"))),
                };
                let result = reader.fetch(&feed.url).await;
                (feed, result)
            }));
        }

        let mut collected: Vec<NewsItem> = Vec::new();
        for handle in handles {
            let (feed, result) = match handle.await {
                Ok(pair) => pair,
                Err(e) => {
                    report.errors.push(format!("feed task failed: {e}"));
                    continue;
                }
            };
            match result {
                Ok(items) => {
                    for item in items {
                        let matched = matching_topics(&topics, &item.title, item.snippet.as_deref());
                        if matched.is_empty() || !passes_cutoff(item.published_at, cutoff) {
                            continue;
                        }
                        collected.push(NewsItem {
                            link: item.link,
                            title: item.title,
                            snippet: item.snippet,
                            source_name: Some(feed.name.clone()),
                            source_url: Some(feed.url.clone()),
                            photo_url: item.photo_url,
                            published_at: item.published_at,
                            source_type: SourceType::Rss,
                            matched_topic_ids: matched,
                        });
                    }
                }
                Err(e) => {
                    warn!(feed = %feed.name, error = %e, "feed fetch failed");
                    report.errors.push(format!("feed '{}': {e}", feed.name));
                }
            }
        }

        let (upserted, touched) = self.upsert(user_id, collected).await;
        report.absorb(upserted);

        if report.is_success() && !touched.is_empty() {
            if let Err(e) = self.store.touch_topics_fetched(user_id, &touched, now).await {
                report.errors.push(format!("update last_fetched_at: {e}"));
            }
        }

        info!(user_id = %user_id, inserted = report.inserted, skipped = report.skipped,
              errors = report.errors.len(), "rss ingest complete");
        report
    }

    /// Shared upsert step. Returns the report and the topics that caused
    /// written rows.
    async fn upsert(&self, user_id: Uuid, items: Vec<NewsItem>) -> (IngestReport, Vec<Uuid>) {
        let mut report = IngestReport::default();
        if items.is_empty() {
            return (report, Vec::new());
        }

        let deduped = dedupe_items(items);
        let links: Vec<String> = deduped.iter().map(|i| i.link.clone()).collect();

        let existing = match self.store.existing_topic_sets(user_id, &links).await {
            Ok(map) => map,
            Err(e) => {
                report.errors.push(format!("lookup existing articles: {e}"));
                return (report, Vec::new());
            }
        };

        let plan = plan_upsert(deduped, &existing);
        let planned_inserts = plan.inserts.len();

        match self.store.insert_articles(user_id, &plan.inserts).await {
            Ok(written) => {
                report.inserted = written;
                // A concurrent upsert won the race on the unique constraint.
                report.skipped += planned_inserts - written;
            }
            Err(e) => report.errors.push(format!("insert articles: {e}")),
        }

        for (link, merged) in &plan.updates {
            match self.store.set_matched_topics(user_id, link, merged).await {
                Ok(()) => report.skipped += 1,
                Err(e) => report.errors.push(format!("merge topics for {link}: {e}")),
            }
        }
        report.skipped += plan.unchanged;

        (report, plan.touched_topics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(link: &str, topics: &[Uuid]) -> NewsItem {
        NewsItem {
            link: link.to_string(),
            title: "judul".to_string(),
            snippet: None,
            source_name: None,
            source_url: None,
            photo_url: None,
            published_at: Some(Utc::now()),
            source_type: SourceType::Aggregator,
            matched_topic_ids: topics.to_vec(),
        }
    }

    #[test]
    fn cutoff_excludes_missing_and_stale_timestamps() {
        let now = Utc::now();
        let cutoff = now - Duration::days(1);
        assert!(!passes_cutoff(None, cutoff));
        assert!(!passes_cutoff(Some(cutoff), cutoff));
        assert!(!passes_cutoff(Some(cutoff - Duration::hours(1)), cutoff));
        assert!(passes_cutoff(Some(now), cutoff));
    }

    #[test]
    fn never_fetched_topic_gets_seven_day_lookback() {
        let now = Utc::now();
        assert_eq!(cutoff_for(None, now), now - Duration::days(7));
        let recent = now - Duration::hours(2);
        assert_eq!(cutoff_for(Some(recent), now), recent);
    }

    #[test]
    fn dedupe_merges_topic_sets_per_link() {
        let t1 = Uuid::new_v4();
        let t2 = Uuid::new_v4();
        let items = vec![
            item("https://x/a", &[t1]),
            item("https://x/b", &[t1]),
            item("https://x/a", &[t2, t1]),
        ];
        let deduped = dedupe_items(items);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].link, "https://x/a");
        assert_eq!(deduped[0].matched_topic_ids, vec![t1, t2]);
        assert_eq!(deduped[1].matched_topic_ids, vec![t1]);
    }

    #[test]
    fn plan_partitions_new_and_existing() {
        let t1 = Uuid::new_v4();
        let t2 = Uuid::new_v4();
        let mut existing = HashMap::new();
        existing.insert("https://x/a".to_string(), vec![t1]);

        let items = vec![item("https://x/a", &[t2]), item("https://x/b", &[t2])];
        let plan = plan_upsert(items, &existing);

        assert_eq!(plan.inserts.len(), 1);
        assert_eq!(plan.inserts[0].link, "https://x/b");
        assert_eq!(plan.updates, vec![("https://x/a".to_string(), vec![t1, t2])]);
        assert_eq!(plan.unchanged, 0);
        assert_eq!(plan.touched_topics, vec![t2]);
    }

    #[test]
    fn replaying_the_same_batch_plans_no_writes() {
        let t1 = Uuid::new_v4();
        let mut existing = HashMap::new();
        existing.insert("https://x/a".to_string(), vec![t1]);

        let plan = plan_upsert(vec![item("https://x/a", &[t1])], &existing);
        assert!(plan.inserts.is_empty());
        assert!(plan.updates.is_empty());
        assert_eq!(plan.unchanged, 1);
    }

    #[test]
    fn rss_rows_start_decoded_and_aggregator_rows_do_not() {
        let t1 = Uuid::new_v4();
        let mut rss = item("https://pub/a", &[t1]);
        rss.source_type = SourceType::Rss;
        let agg = item("https://news.google.com/rss/articles/abc", &[t1]);

        let plan = plan_upsert(vec![rss, agg], &HashMap::new());
        assert!(plan.inserts[0].url_decoded);
        assert!(!plan.inserts[1].url_decoded);
    }
}
