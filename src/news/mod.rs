//! Concurrent multi-feed news aggregation
//!
//! Preview mode fans out over a small set of fast sources and keeps only
//! the top few recent items per source. Full mode fans out over the whole
//! source set, merges everything by publish time, caps the result, and
//! serves pagination by slicing the cached merge - no refetch per page.
//! A source that cannot be fetched or parsed contributes zero items and
//! never fails the aggregation.

pub mod parser;

use crate::{
    constants::{
        NEWS_FULL_SOURCES, NEWS_MAX_ITEMS, NEWS_PAGE_SIZE, NEWS_PREVIEW_PER_SOURCE,
        NEWS_PREVIEW_SOURCES,
    },
    types::NewsArticle,
};
use futures::future::join_all;
use reqwest::Client;
use tokio::sync::RwLock;

/// A named feed endpoint
#[derive(Debug, Clone)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
}

impl FeedSource {
    fn from_pairs(pairs: &[(&str, &str)]) -> Vec<Self> {
        pairs
            .iter()
            .map(|(name, url)| Self {
                name: name.to_string(),
                url: url.to_string(),
            })
            .collect()
    }
}

/// Concurrent feed fetcher with an in-memory page cache
pub struct FeedAggregator {
    client: Client,
    preview_sources: Vec<FeedSource>,
    full_sources: Vec<FeedSource>,
    page_size: usize,
    max_items: usize,
    /// Merged superset backing pagination; replaced by `refresh_full`
    merged: RwLock<Vec<NewsArticle>>,
}

impl FeedAggregator {
    /// Creates an aggregator over the default source sets
    pub fn new(client: Client) -> Self {
        Self::with_sources(
            client,
            FeedSource::from_pairs(NEWS_PREVIEW_SOURCES),
            FeedSource::from_pairs(NEWS_FULL_SOURCES),
        )
    }

    /// Creates an aggregator over explicit source sets
    pub fn with_sources(
        client: Client,
        preview_sources: Vec<FeedSource>,
        full_sources: Vec<FeedSource>,
    ) -> Self {
        Self {
            client,
            preview_sources,
            full_sources,
            page_size: NEWS_PAGE_SIZE,
            max_items: NEWS_MAX_ITEMS,
            merged: RwLock::new(Vec::new()),
        }
    }

    /// Fast headline strip: fetches the preview sources concurrently,
    /// keeps the most recent few items per source, and merges them by
    /// publish time descending.
    pub async fn preview(&self) -> Vec<NewsArticle> {
        let per_source = join_all(
            self.preview_sources
                .iter()
                .map(|source| self.fetch_source(source)),
        )
        .await;

        let trimmed = per_source
            .into_iter()
            .map(|mut items| {
                sort_by_recency(&mut items);
                items.truncate(NEWS_PREVIEW_PER_SOURCE);
                items
            })
            .collect();

        merge_by_recency(trimmed)
    }

    /// Fetches the full source set, replaces the page cache with the
    /// merged, capped superset, and returns the first page.
    pub async fn refresh_full(&self) -> Vec<NewsArticle> {
        let per_source = join_all(
            self.full_sources
                .iter()
                .map(|source| self.fetch_source(source)),
        )
        .await;

        let mut merged = merge_by_recency(per_source);
        merged.truncate(self.max_items);

        tracing::info!(
            count = merged.len(),
            sources = self.full_sources.len(),
            "News superset refreshed"
        );

        *self.merged.write().await = merged;
        self.page(0).await
    }

    /// One fixed-size page sliced out of the cached merge. Empty past the
    /// end. Does not refetch.
    pub async fn page(&self, index: usize) -> Vec<NewsArticle> {
        let merged = self.merged.read().await;
        paginate(&merged, index, self.page_size).to_vec()
    }

    /// Number of pages currently in the cache
    pub async fn page_count(&self) -> usize {
        let merged = self.merged.read().await;
        merged.len().div_ceil(self.page_size)
    }

    /// Fetches and parses one source. Any failure is absorbed: the source
    /// simply contributes zero items this round.
    async fn fetch_source(&self, source: &FeedSource) -> Vec<NewsArticle> {
        let response = match self.client.get(&source.url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(source = %source.name, error = %e, "Feed fetch failed");
                return Vec::new();
            }
        };

        if !response.status().is_success() {
            tracing::warn!(
                source = %source.name,
                status = response.status().as_u16(),
                "Feed answered with an error status"
            );
            return Vec::new();
        }

        match response.text().await {
            Ok(body) => parser::parse_feed(&body, &source.name),
            Err(e) => {
                tracing::warn!(source = %source.name, error = %e, "Feed body read failed");
                Vec::new()
            }
        }
    }
}

fn sort_by_recency(items: &mut [NewsArticle]) {
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
}

/// Flattens per-source item lists into one list ordered newest first
fn merge_by_recency(per_source: Vec<Vec<NewsArticle>>) -> Vec<NewsArticle> {
    let mut merged: Vec<NewsArticle> = per_source.into_iter().flatten().collect();
    sort_by_recency(&mut merged);
    merged
}

fn paginate(items: &[NewsArticle], index: usize, page_size: usize) -> &[NewsArticle] {
    let start = index.saturating_mul(page_size);
    if start >= items.len() {
        return &[];
    }
    let end = (start + page_size).min(items.len());
    &items[start..end]
}
