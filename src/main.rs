mod catalog;
mod config;
mod error;
mod feed;
mod tmdb;
mod types;
mod wishlist;

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::MarqueeError;
use crate::feed::FeedAggregator;
use crate::tmdb::Tmdb;
use crate::types::MovieSummary;
use crate::wishlist::{FileStore, Wishlist};

#[derive(Parser)]
#[command(name = "marquee", version, about = "Browse The Movie Database from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the home feeds: trending, upcoming, and top rated
    Home {
        /// Pages to load per feed
        #[arg(long, default_value_t = 1)]
        pages: u32,
        /// Print one deduplicated list instead of per-feed rows
        #[arg(long)]
        merged: bool,
    },
    /// Search movies by title
    Search { query: String },
    /// Show one movie's details, cast included
    Movie { id: u64 },
    /// Show or edit the local wishlist
    Wishlist {
        #[command(subcommand)]
        action: Option<WishlistAction>,
    },
}

#[derive(Subcommand)]
enum WishlistAction {
    /// Print the wishlist
    List,
    /// Add the movie if absent, remove it if present
    Toggle { id: u64 },
    /// Add a movie by id
    Add { id: u64 },
    /// Remove a movie by id
    Remove { id: u64 },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load();
    let api_key = config::resolve_api_key(&config.api)?;
    let tmdb = Arc::new(Tmdb::new(
        config.api.base_url.clone(),
        config.api.image_base_url.clone(),
        api_key,
    ));

    match cli.command {
        Command::Home { pages, merged } => home(tmdb, pages, merged).await?,
        Command::Search { query } => search(tmdb, &query).await?,
        Command::Movie { id } => movie(tmdb, id).await?,
        Command::Wishlist { action } => wishlist_cmd(tmdb, action).await?,
    }

    Ok(())
}

async fn home(tmdb: Arc<Tmdb>, pages: u32, merged: bool) -> error::Result<()> {
    let aggregator = Arc::new(FeedAggregator::new(tmdb));

    // Stand-in for the screen's loading indicator
    let indicator = tokio::spawn({
        let aggregator = Arc::clone(&aggregator);
        async move {
            loop {
                tokio::time::sleep(Duration::from_millis(200)).await;
                if aggregator.is_loading() {
                    eprint!(".");
                }
            }
        }
    });

    aggregator.initialize().await;
    for _ in 1..pages {
        aggregator.load_more().await;
    }
    indicator.abort();

    if merged {
        let view = aggregator.merged_view();
        for movie in &view {
            print_row(movie);
        }
        println!("\n{} movies across all feeds", view.len());
    } else {
        for &category in aggregator.categories() {
            let pages_note = aggregator
                .total_pages(category)
                .map(|total| format!(" of {}", total))
                .unwrap_or_default();
            println!(
                "{} (page {}{})",
                category,
                aggregator.current_page(category),
                pages_note
            );
            for movie in aggregator.items_for(category) {
                print_row(&movie);
            }
            println!();
        }
    }
    Ok(())
}

async fn search(tmdb: Arc<Tmdb>, query: &str) -> error::Result<()> {
    let results = tmdb.search(query).await?;
    if results.is_empty() {
        println!("No results for \"{}\"", query);
        return Ok(());
    }
    for movie in &results {
        print_row(movie);
    }
    Ok(())
}

async fn movie(tmdb: Arc<Tmdb>, id: u64) -> error::Result<()> {
    let detail = tmdb.movie_detail(id).await?;
    let wishlisted = FileStore::new()
        .map(|store| Wishlist::new(Box::new(store)).contains(id))
        .unwrap_or(false);

    if wishlisted {
        println!("{}  \u{2665}", detail.title);
    } else {
        println!("{}", detail.title);
    }
    let year = detail
        .release_year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let runtime = detail
        .runtime_minutes
        .map(|m| format!("{} min", m))
        .unwrap_or_else(|| "unknown".to_string());
    println!("Released {} \u{2022} {} \u{2022} \u{2605} {:.1}", year, runtime, detail.vote_average);
    if !detail.genres.is_empty() {
        println!("{}", detail.genres.join(", "));
    }
    if let Some(poster) = &detail.poster_path {
        println!("Poster: {}", tmdb.poster_url(poster));
    }
    if !detail.overview.is_empty() {
        println!("\n{}", detail.overview);
    }
    if !detail.cast.is_empty() {
        println!("\nTop cast:");
        for member in &detail.cast {
            match &member.profile_path {
                Some(path) => println!("  {}  ({})", member.name, tmdb.profile_url(path)),
                None => println!("  {}", member.name),
            }
        }
    }
    Ok(())
}

async fn wishlist_cmd(tmdb: Arc<Tmdb>, action: Option<WishlistAction>) -> error::Result<()> {
    let store = FileStore::new()
        .ok_or_else(|| MarqueeError::Config("no data directory available".to_string()))?;
    let wishlist = Wishlist::new(Box::new(store));

    match action.unwrap_or(WishlistAction::List) {
        WishlistAction::List => {
            let entries = wishlist.entries();
            if entries.is_empty() {
                println!("Wishlist is empty");
            }
            for movie in &entries {
                print_row(movie);
            }
        }
        WishlistAction::Toggle { id } => {
            let detail = tmdb.movie_detail(id).await?;
            let title = detail.title.clone();
            if wishlist.toggle(&detail.summary())? {
                println!("Added \"{}\" to wishlist", title);
            } else {
                println!("Removed \"{}\" from wishlist", title);
            }
        }
        WishlistAction::Add { id } => {
            let detail = tmdb.movie_detail(id).await?;
            let title = detail.title.clone();
            wishlist.add(&detail.summary())?;
            println!("Added \"{}\" to wishlist", title);
        }
        WishlistAction::Remove { id } => {
            wishlist.remove(id)?;
            println!("Removed {} from wishlist", id);
        }
    }
    Ok(())
}

fn print_row(movie: &MovieSummary) {
    let year = movie
        .release_date
        .as_deref()
        .and_then(|d| d.get(..4))
        .unwrap_or("----");
    println!(
        "  {:>8}  \u{2605} {:>4.1}  {}  ({})",
        movie.id, movie.vote_average, movie.title, year
    );
}
