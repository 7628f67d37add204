use async_trait::async_trait;
use chrono::Datelike;
use reqwest::Client;
use serde::Deserialize;

use crate::catalog::Catalog;
use crate::error::{MarqueeError, Result};
use crate::types::{CastMember, Category, MovieDetail, MovieSummary, Page};

/// How many cast members the detail view keeps.
const TOP_CAST: usize = 10;

pub struct Tmdb {
    client: Client,
    base_url: String,
    image_base_url: String,
    api_key: String,
}

impl std::fmt::Debug for Tmdb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tmdb").finish_non_exhaustive()
    }
}

impl Tmdb {
    pub fn new(base_url: String, image_base_url: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            image_base_url,
            api_key,
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}?api_key={}", self.base_url, path, self.api_key)
    }

    /// Full CDN URL for a poster image (w500 size), if the record has one.
    pub fn poster_url(&self, poster_path: &str) -> String {
        format!("{}/w500{}", self.image_base_url, poster_path)
    }

    /// Full CDN URL for a cast member's profile photo (w200 size).
    pub fn profile_url(&self, profile_path: &str) -> String {
        format!("{}/w200{}", self.image_base_url, profile_path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MarqueeError::Api(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(MarqueeError::Api(format!("TMDB API {}: {}", status, text)));
        }

        response
            .json()
            .await
            .map_err(|e| MarqueeError::Api(e.to_string()))
    }
}

// TMDB API response types

#[derive(Deserialize)]
struct TmdbPage {
    results: Vec<TmdbMovie>,
    total_pages: Option<u32>,
}

#[derive(Deserialize)]
struct TmdbMovie {
    id: u64,
    title: Option<String>,
    poster_path: Option<String>,
    release_date: Option<String>,
    vote_average: Option<f64>,
    overview: Option<String>,
}

#[derive(Deserialize)]
struct TmdbDetail {
    id: u64,
    title: Option<String>,
    poster_path: Option<String>,
    release_date: Option<String>,
    runtime: Option<u32>,
    genres: Vec<TmdbGenre>,
    vote_average: Option<f64>,
    overview: Option<String>,
}

#[derive(Deserialize)]
struct TmdbGenre {
    name: String,
}

#[derive(Deserialize)]
struct TmdbCredits {
    cast: Vec<TmdbCastMember>,
}

#[derive(Deserialize)]
struct TmdbCastMember {
    id: u64,
    name: String,
    profile_path: Option<String>,
}

fn to_summary(movie: TmdbMovie) -> MovieSummary {
    MovieSummary {
        id: movie.id,
        title: movie.title.unwrap_or_default(),
        poster_path: movie.poster_path,
        // TMDB sends "" for unreleased entries; treat it as absent
        release_date: movie.release_date.filter(|d| !d.is_empty()),
        vote_average: movie.vote_average.unwrap_or(0.0),
        overview: movie.overview.unwrap_or_default(),
    }
}

fn release_year(release_date: Option<&str>) -> Option<i32> {
    let date = release_date?;
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .map(|d| d.year())
}

#[async_trait]
impl Catalog for Tmdb {
    async fn fetch_page(&self, category: Category, page: u32) -> Result<Page<MovieSummary>> {
        let url = format!(
            "{}&page={}",
            self.api_url(category.as_api_path()),
            page
        );
        let body: TmdbPage = self.get_json(&url).await?;

        Ok(Page {
            items: body.results.into_iter().map(to_summary).collect(),
            total_pages: body.total_pages.unwrap_or(1),
        })
    }

    async fn movie_detail(&self, id: u64) -> Result<MovieDetail> {
        let detail_url = self.api_url(&format!("movie/{}", id));
        let credits_url = self.api_url(&format!("movie/{}/credits", id));

        // Detail and credits come from separate endpoints; fetch both at once.
        let (detail, credits) = tokio::join!(
            self.get_json::<TmdbDetail>(&detail_url),
            self.get_json::<TmdbCredits>(&credits_url),
        );
        let detail = detail?;
        let credits = credits?;

        Ok(MovieDetail {
            id: detail.id,
            title: detail.title.unwrap_or_default(),
            poster_path: detail.poster_path,
            release_year: release_year(detail.release_date.as_deref()),
            runtime_minutes: detail.runtime,
            genres: detail.genres.into_iter().map(|g| g.name).collect(),
            vote_average: detail.vote_average.unwrap_or(0.0),
            overview: detail.overview.unwrap_or_default(),
            cast: credits
                .cast
                .into_iter()
                .take(TOP_CAST)
                .map(|c| CastMember {
                    id: c.id,
                    name: c.name,
                    profile_path: c.profile_path,
                })
                .collect(),
        })
    }

    async fn search(&self, query: &str) -> Result<Vec<MovieSummary>> {
        let url = format!(
            "{}&query={}",
            self.api_url("search/movie"),
            urlencoding::encode(query)
        );
        let body: TmdbPage = self.get_json(&url).await?;
        Ok(body.results.into_iter().map(to_summary).collect())
    }
}
