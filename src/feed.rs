use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use tracing::warn;

use crate::catalog::Catalog;
use crate::error::MarqueeError;
use crate::types::{Category, MovieSummary, Page};

/// Receives per-category fetch failures. The aggregator never raises them
/// to its caller; a round with some categories failing is a normal outcome.
pub trait FeedObserver: Send + Sync {
    fn fetch_failed(&self, category: Category, page: u32, error: &MarqueeError);
}

/// Default observer: log and move on.
pub struct LogObserver;

impl FeedObserver for LogObserver {
    fn fetch_failed(&self, category: Category, page: u32, error: &MarqueeError) {
        warn!(%category, page, %error, "feed page fetch failed");
    }
}

struct FeedState {
    current_page: u32,
    items: Vec<MovieSummary>,
    // As last reported by the remote; informational only, never enforced
    total_pages: Option<u32>,
}

/// Owns one page cursor and item list per category and coordinates load
/// rounds across them.
///
/// A round (the initial load, or one `load_more`) fetches every category's
/// next page concurrently and settles them together. At most one round is
/// in flight at a time: `load_more` calls made while a round is running are
/// no-ops, so repeated scroll triggers cannot stack overlapping fetches.
/// Cursors advance when a round starts, not when a fetch succeeds, so a
/// failed page is skipped for that category rather than retried.
pub struct FeedAggregator {
    catalog: Arc<dyn Catalog>,
    observer: Arc<dyn FeedObserver>,
    categories: Vec<Category>,
    // One entry per category, same order as `categories`.
    feeds: Mutex<Vec<FeedState>>,
    load_in_flight: AtomicBool,
}

impl FeedAggregator {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self::with_categories(catalog, Category::ALL.to_vec())
    }

    pub fn with_categories(catalog: Arc<dyn Catalog>, categories: Vec<Category>) -> Self {
        let feeds = categories
            .iter()
            .map(|_| FeedState {
                // 0 = not yet initialized; the first round requests page 1
                current_page: 0,
                items: Vec::new(),
                total_pages: None,
            })
            .collect();

        Self {
            catalog,
            observer: Arc::new(LogObserver),
            categories,
            feeds: Mutex::new(feeds),
            load_in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn FeedObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// True while a load round's fetches have not all settled.
    pub fn is_loading(&self) -> bool {
        self.load_in_flight.load(Ordering::Acquire)
    }

    /// Load page 1 of every category, replacing whatever each feed holds.
    /// Each category's fetch is an isolated failure domain: one feed
    /// failing does not stop the others from populating.
    pub async fn initialize(&self) {
        if self.load_in_flight.swap(true, Ordering::AcqRel) {
            return;
        }

        {
            let mut feeds = self.feeds.lock();
            for feed in feeds.iter_mut() {
                feed.current_page = 1;
            }
        }

        let pages = vec![1; self.categories.len()];
        let results = self.fetch_round(&pages).await;

        {
            let mut feeds = self.feeds.lock();
            for (idx, result) in results.into_iter().enumerate() {
                match result {
                    Ok(page) => {
                        feeds[idx].items = page.items;
                        feeds[idx].total_pages = Some(page.total_pages);
                    }
                    Err(err) => self.observer.fetch_failed(self.categories[idx], 1, &err),
                }
            }
        }

        self.load_in_flight.store(false, Ordering::Release);
    }

    /// Fetch the next page of every category and append the results.
    ///
    /// Returns immediately if a round is already in flight. Cursors are
    /// advanced up front, so the round consumes its page numbers even for
    /// categories whose fetch then fails; those feeds are left unchanged
    /// for this round and the flag is cleared regardless, so a later call
    /// is never permanently blocked by a failed round.
    pub async fn load_more(&self) {
        if self.load_in_flight.swap(true, Ordering::AcqRel) {
            return;
        }

        let pages: Vec<u32> = {
            let mut feeds = self.feeds.lock();
            feeds
                .iter_mut()
                .map(|feed| {
                    feed.current_page += 1;
                    feed.current_page
                })
                .collect()
        };

        let results = self.fetch_round(&pages).await;

        {
            let mut feeds = self.feeds.lock();
            for (idx, result) in results.into_iter().enumerate() {
                match result {
                    Ok(page) => {
                        feeds[idx].items.extend(page.items);
                        feeds[idx].total_pages = Some(page.total_pages);
                    }
                    Err(err) => {
                        self.observer
                            .fetch_failed(self.categories[idx], pages[idx], &err)
                    }
                }
            }
        }

        self.load_in_flight.store(false, Ordering::Release);
    }

    /// Fan out one fetch per category and wait for all of them to settle.
    /// An empty page is a valid result; feeds past the end of the remote
    /// list simply stop growing.
    async fn fetch_round(&self, pages: &[u32]) -> Vec<Result<Page<MovieSummary>, MarqueeError>> {
        let fetches = self
            .categories
            .iter()
            .zip(pages)
            .map(|(&category, &page)| async move { self.catalog.fetch_page(category, page).await });
        join_all(fetches).await
    }

    /// All categories' items concatenated in category order, deduplicated
    /// by movie id with the first occurrence kept. Recomputed on every
    /// call so it always reflects the current feed contents.
    pub fn merged_view(&self) -> Vec<MovieSummary> {
        let feeds = self.feeds.lock();
        let mut seen = HashSet::new();
        let mut merged = Vec::new();
        for feed in feeds.iter() {
            for movie in &feed.items {
                if seen.insert(movie.id) {
                    merged.push(movie.clone());
                }
            }
        }
        merged
    }

    /// One category's items in arrival order. Empty if the category is not
    /// tracked by this aggregator.
    pub fn items_for(&self, category: Category) -> Vec<MovieSummary> {
        match self.index_of(category) {
            Some(idx) => self.feeds.lock()[idx].items.clone(),
            None => Vec::new(),
        }
    }

    /// The last page number requested for a category (0 before the initial
    /// load, or for an untracked category).
    pub fn current_page(&self, category: Category) -> u32 {
        match self.index_of(category) {
            Some(idx) => self.feeds.lock()[idx].current_page,
            None => 0,
        }
    }

    /// Total page count as last reported by the remote for a category.
    /// None until the category's first successful fetch. Informational:
    /// rounds past this bound are still issued and simply come back empty.
    pub fn total_pages(&self, category: Category) -> Option<u32> {
        self.index_of(category)
            .and_then(|idx| self.feeds.lock()[idx].total_pages)
    }

    fn index_of(&self, category: Category) -> Option<usize> {
        self.categories.iter().position(|&c| c == category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::types::{MovieDetail, Page};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::sync::Semaphore;

    fn movie(id: u64) -> MovieSummary {
        MovieSummary {
            id,
            title: format!("Movie {}", id),
            poster_path: Some(format!("/poster-{}.jpg", id)),
            release_date: None,
            vote_average: 7.0,
            overview: String::new(),
        }
    }

    fn movies(ids: std::ops::Range<u64>) -> Vec<MovieSummary> {
        ids.map(movie).collect()
    }

    fn ids(items: &[MovieSummary]) -> Vec<u64> {
        items.iter().map(|m| m.id).collect()
    }

    #[derive(Debug, Default)]
    struct ScriptedCatalog {
        pages: Mutex<HashMap<(Category, u32), Vec<MovieSummary>>>,
        failures: Mutex<HashSet<(Category, u32)>>,
        calls: Mutex<Vec<(Category, u32)>>,
        gate: Option<Arc<Semaphore>>,
    }

    impl ScriptedCatalog {
        fn page(self, category: Category, page: u32, items: Vec<MovieSummary>) -> Self {
            self.pages.lock().insert((category, page), items);
            self
        }

        fn failing(self, category: Category, page: u32) -> Self {
            self.failures.lock().insert((category, page));
            self
        }

        fn gated(mut self, gate: Arc<Semaphore>) -> Self {
            self.gate = Some(gate);
            self
        }

        fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl Catalog for ScriptedCatalog {
        async fn fetch_page(&self, category: Category, page: u32) -> Result<Page<MovieSummary>> {
            self.calls.lock().push((category, page));
            if let Some(gate) = &self.gate {
                // Consume the permit so a later round cannot reuse it
                gate.acquire().await.expect("gate closed").forget();
            }
            if self.failures.lock().contains(&(category, page)) {
                return Err(MarqueeError::Api("scripted failure".to_string()));
            }
            let items = self
                .pages
                .lock()
                .get(&(category, page))
                .cloned()
                .unwrap_or_default();
            Ok(Page {
                items,
                total_pages: 1000,
            })
        }

        async fn movie_detail(&self, _id: u64) -> Result<MovieDetail> {
            Err(MarqueeError::Api("not scripted".to_string()))
        }

        async fn search(&self, _query: &str) -> Result<Vec<MovieSummary>> {
            Ok(Vec::new())
        }
    }

    /// Three categories, five distinct items each, pages 1 and 2.
    fn full_catalog() -> ScriptedCatalog {
        let mut catalog = ScriptedCatalog::default();
        for (i, category) in Category::ALL.into_iter().enumerate() {
            let base = 100 * i as u64;
            catalog = catalog
                .page(category, 1, movies(base..base + 5))
                .page(category, 2, movies(base + 5..base + 10));
        }
        catalog
    }

    #[tokio::test]
    async fn initialize_populates_page_one_of_every_category() {
        let aggregator = FeedAggregator::new(Arc::new(full_catalog()));
        aggregator.initialize().await;

        for category in Category::ALL {
            assert_eq!(aggregator.current_page(category), 1);
            assert_eq!(aggregator.items_for(category).len(), 5);
            assert_eq!(aggregator.total_pages(category), Some(1000));
        }
        assert_eq!(aggregator.merged_view().len(), 15);
        assert!(!aggregator.is_loading());
    }

    #[tokio::test]
    async fn total_pages_is_unknown_before_the_first_fetch() {
        let aggregator = FeedAggregator::new(Arc::new(ScriptedCatalog::default()));
        assert_eq!(aggregator.total_pages(Category::Trending), None);
        assert_eq!(aggregator.current_page(Category::Trending), 0);
    }

    #[tokio::test]
    async fn load_more_appends_next_page_to_every_category() {
        let aggregator = FeedAggregator::new(Arc::new(full_catalog()));
        aggregator.initialize().await;
        aggregator.load_more().await;

        for category in Category::ALL {
            assert_eq!(aggregator.current_page(category), 2);
            assert_eq!(aggregator.items_for(category).len(), 10);
        }
        assert_eq!(aggregator.merged_view().len(), 30);
    }

    #[tokio::test]
    async fn load_more_preserves_existing_item_order() {
        let aggregator = FeedAggregator::new(Arc::new(full_catalog()));
        aggregator.initialize().await;
        let before = aggregator.items_for(Category::Upcoming);

        aggregator.load_more().await;

        let after = aggregator.items_for(Category::Upcoming);
        assert_eq!(ids(&after[..before.len()]), ids(&before));
    }

    #[tokio::test]
    async fn overlapping_load_more_is_a_noop() {
        let gate = Arc::new(Semaphore::new(0));
        let catalog = Arc::new(full_catalog().gated(Arc::clone(&gate)));
        let aggregator = Arc::new(FeedAggregator::new(
            Arc::clone(&catalog) as Arc<dyn Catalog>
        ));

        gate.add_permits(3);
        aggregator.initialize().await;
        assert_eq!(catalog.call_count(), 3);

        let first = tokio::spawn({
            let aggregator = Arc::clone(&aggregator);
            async move { aggregator.load_more().await }
        });

        // Wait until all three page-2 fetches are in flight behind the gate
        while catalog.call_count() < 6 {
            tokio::task::yield_now().await;
        }
        assert!(aggregator.is_loading());

        // Scroll-spam while the round is pending: must not issue fetches
        aggregator.load_more().await;
        aggregator.load_more().await;
        assert_eq!(catalog.call_count(), 6);

        gate.add_permits(3);
        first.await.unwrap();

        assert!(!aggregator.is_loading());
        assert_eq!(catalog.call_count(), 6);
        for category in Category::ALL {
            assert_eq!(aggregator.current_page(category), 2);
            assert_eq!(aggregator.items_for(category).len(), 10);
        }
    }

    #[tokio::test]
    async fn failed_category_is_skipped_but_round_completes() {
        let catalog = Arc::new(full_catalog().failing(Category::Trending, 2));
        let aggregator = FeedAggregator::new(Arc::clone(&catalog) as Arc<dyn Catalog>);
        aggregator.initialize().await;
        aggregator.load_more().await;

        // Failed feed: unchanged items, cursor still consumed
        assert_eq!(aggregator.items_for(Category::Trending).len(), 5);
        assert_eq!(aggregator.current_page(Category::Trending), 2);
        // The other feeds grew normally
        assert_eq!(aggregator.items_for(Category::Upcoming).len(), 10);
        assert_eq!(aggregator.items_for(Category::TopRated).len(), 10);
        assert!(!aggregator.is_loading());

        // No lockout: the next round runs and requests page 3, not a retry of 2
        aggregator.load_more().await;
        assert!(catalog
            .calls
            .lock()
            .contains(&(Category::Trending, 3)));
        assert_eq!(aggregator.current_page(Category::Trending), 3);
    }

    #[tokio::test]
    async fn failed_initial_fetch_does_not_block_other_categories() {
        let catalog = full_catalog().failing(Category::Upcoming, 1);
        let aggregator = FeedAggregator::new(Arc::new(catalog));
        aggregator.initialize().await;

        assert_eq!(aggregator.items_for(Category::Upcoming).len(), 0);
        assert_eq!(aggregator.items_for(Category::Trending).len(), 5);
        assert_eq!(aggregator.items_for(Category::TopRated).len(), 5);
        assert_eq!(aggregator.current_page(Category::Upcoming), 1);
    }

    #[tokio::test]
    async fn merged_view_dedups_by_id_keeping_first_occurrence() {
        let catalog = ScriptedCatalog::default()
            .page(Category::Trending, 1, vec![movie(1), movie(2)])
            .page(Category::Upcoming, 1, vec![movie(2), movie(3)]);
        let aggregator = FeedAggregator::with_categories(
            Arc::new(catalog),
            vec![Category::Trending, Category::Upcoming],
        );
        aggregator.initialize().await;

        assert_eq!(ids(&aggregator.merged_view()), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn merged_view_is_stable_between_reads() {
        let aggregator = FeedAggregator::new(Arc::new(full_catalog()));
        aggregator.initialize().await;

        assert_eq!(ids(&aggregator.merged_view()), ids(&aggregator.merged_view()));
    }

    #[tokio::test]
    async fn duplicates_within_one_category_stay_in_items_but_merge_once() {
        let catalog = ScriptedCatalog::default()
            .page(Category::Trending, 1, vec![movie(1), movie(2)])
            .page(Category::Trending, 2, vec![movie(2)]);
        let aggregator =
            FeedAggregator::with_categories(Arc::new(catalog), vec![Category::Trending]);
        aggregator.initialize().await;
        aggregator.load_more().await;

        assert_eq!(ids(&aggregator.items_for(Category::Trending)), vec![1, 2, 2]);
        assert_eq!(ids(&aggregator.merged_view()), vec![1, 2]);
    }

    #[tokio::test]
    async fn load_more_before_initialize_requests_page_one() {
        let catalog = Arc::new(full_catalog());
        let aggregator = FeedAggregator::new(Arc::clone(&catalog) as Arc<dyn Catalog>);
        aggregator.load_more().await;

        for category in Category::ALL {
            assert_eq!(aggregator.current_page(category), 1);
            assert_eq!(aggregator.items_for(category).len(), 5);
        }
        assert!(catalog.calls.lock().iter().all(|&(_, page)| page == 1));
    }

    #[tokio::test]
    async fn page_past_the_end_leaves_feed_unchanged() {
        // Page 2 is not scripted, so the remote returns an empty page
        let catalog = ScriptedCatalog::default().page(Category::Trending, 1, movies(0..5));
        let aggregator =
            FeedAggregator::with_categories(Arc::new(catalog), vec![Category::Trending]);
        aggregator.initialize().await;
        aggregator.load_more().await;

        assert_eq!(aggregator.items_for(Category::Trending).len(), 5);
        assert_eq!(aggregator.current_page(Category::Trending), 2);
    }

    #[tokio::test]
    async fn initialize_replaces_items_instead_of_appending() {
        let aggregator = FeedAggregator::new(Arc::new(full_catalog()));
        aggregator.initialize().await;
        aggregator.load_more().await;
        aggregator.initialize().await;

        for category in Category::ALL {
            assert_eq!(aggregator.current_page(category), 1);
            assert_eq!(aggregator.items_for(category).len(), 5);
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        failed: Mutex<Vec<(Category, u32)>>,
    }

    impl FeedObserver for RecordingObserver {
        fn fetch_failed(&self, category: Category, page: u32, _error: &MarqueeError) {
            self.failed.lock().push((category, page));
        }
    }

    #[tokio::test]
    async fn observer_sees_each_failed_fetch() {
        let observer = Arc::new(RecordingObserver::default());
        let catalog = full_catalog()
            .failing(Category::Trending, 2)
            .failing(Category::TopRated, 2);
        let aggregator = FeedAggregator::new(Arc::new(catalog))
            .with_observer(Arc::clone(&observer) as Arc<dyn FeedObserver>);

        aggregator.initialize().await;
        assert!(observer.failed.lock().is_empty());

        aggregator.load_more().await;
        let failed = observer.failed.lock().clone();
        assert_eq!(
            failed,
            vec![(Category::Trending, 2), (Category::TopRated, 2)]
        );
    }
}
