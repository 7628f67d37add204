use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the independent paginated feeds on the home screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Trending,
    Upcoming,
    TopRated,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Trending, Category::Upcoming, Category::TopRated];

    /// API path for the feed's list endpoint, relative to the v3 base URL.
    pub fn as_api_path(&self) -> &'static str {
        match self {
            Category::Trending => "trending/movie/week",
            Category::Upcoming => "movie/upcoming",
            Category::TopRated => "movie/top_rated",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Trending => write!(f, "Trending"),
            Category::Upcoming => write!(f, "Upcoming"),
            Category::TopRated => write!(f, "Top Rated"),
        }
    }
}

/// Movie list entry. Ids are unique within one feed's API but may repeat
/// across feeds; the merged home view dedups on id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieSummary {
    pub id: u64,
    pub title: String,
    pub poster_path: Option<String>,
    pub release_date: Option<String>,
    pub vote_average: f64,
    pub overview: String,
}

/// One page of a paginated list endpoint.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_pages: u32,
}

/// Full movie record for the detail view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieDetail {
    pub id: u64,
    pub title: String,
    pub poster_path: Option<String>,
    pub release_year: Option<i32>,
    pub runtime_minutes: Option<u32>,
    pub genres: Vec<String>,
    pub vote_average: f64,
    pub overview: String,
    pub cast: Vec<CastMember>,
}

impl MovieDetail {
    /// Summary form of this record, for wishlist entries and list rows.
    /// The wire-format release date is not part of the detail record, so
    /// the summary carries no date.
    pub fn summary(&self) -> MovieSummary {
        MovieSummary {
            id: self.id,
            title: self.title.clone(),
            poster_path: self.poster_path.clone(),
            release_date: None,
            vote_average: self.vote_average,
            overview: self.overview.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastMember {
    pub id: u64,
    pub name: String,
    pub profile_path: Option<String>,
}
