use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Category, MovieDetail, MovieSummary, Page};

/// Remote movie catalog. The feed aggregator and the CLI only talk to the
/// backend through this trait, so tests can script responses.
#[async_trait]
pub trait Catalog: Send + Sync + std::fmt::Debug {
    /// Fetch one page of a category's list. Pages are 1-based.
    async fn fetch_page(&self, category: Category, page: u32) -> Result<Page<MovieSummary>>;

    /// Fetch the full record for a single movie, cast included.
    async fn movie_detail(&self, id: u64) -> Result<MovieDetail>;

    /// Title search, first page of results.
    async fn search(&self, query: &str) -> Result<Vec<MovieSummary>>;
}
