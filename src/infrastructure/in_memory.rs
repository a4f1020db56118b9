//! In-memory repository implementation.
//!
//! Mirrors the `PostgreSQL` semantics (sequential ids, version compare-and-swap,
//! word-based title matching, genre containment, sort then id tie-break, total
//! counted before paging) so the API behaves the same in development and tests
//! without a database. Operations share the store's query timeout.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::domain::{Movie, MovieId, SortDirection};
use crate::infrastructure::repository::with_timeout;
use crate::infrastructure::{MovieQuery, MovieRepository, PaginatedResult, RepositoryError};

#[derive(Debug, Default)]
struct Store {
    movies: BTreeMap<MovieId, Movie>,
    last_id: i64,
}

/// In-memory implementation of `MovieRepository`.
///
/// Thread-safe via `tokio::sync::RwLock`; clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMovieRepository {
    store: Arc<RwLock<Store>>,
}

impl InMemoryMovieRepository {
    /// Creates a new empty in-memory movie repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[allow(clippy::significant_drop_tightening)]
impl MovieRepository for InMemoryMovieRepository {
    fn insert(&self, movie: Movie) -> BoxFuture<'_, Result<Movie, RepositoryError>> {
        Box::pin(with_timeout(async move {
            let mut store = self.store.write().await;
            store.last_id += 1;

            let stored = Movie {
                id: MovieId::new(store.last_id),
                created_at: Utc::now(),
                version: 1,
                ..movie
            };
            store.movies.insert(stored.id, stored.clone());
            Ok(stored)
        }))
    }

    fn get(&self, id: MovieId) -> BoxFuture<'_, Result<Movie, RepositoryError>> {
        Box::pin(with_timeout(async move {
            if !id.is_valid() {
                return Err(RepositoryError::NotFound);
            }
            let store = self.store.read().await;
            store
                .movies
                .get(&id)
                .cloned()
                .ok_or(RepositoryError::NotFound)
        }))
    }

    fn update(&self, movie: Movie) -> BoxFuture<'_, Result<Movie, RepositoryError>> {
        Box::pin(with_timeout(async move {
            let mut store = self.store.write().await;
            let Some(existing) = store.movies.get_mut(&movie.id) else {
                return Err(RepositoryError::EditConflict);
            };
            if existing.version != movie.version {
                return Err(RepositoryError::EditConflict);
            }

            existing.title = movie.title;
            existing.year = movie.year;
            existing.runtime = movie.runtime;
            existing.genres = movie.genres;
            existing.version += 1;
            Ok(existing.clone())
        }))
    }

    fn delete(&self, id: MovieId) -> BoxFuture<'_, Result<(), RepositoryError>> {
        Box::pin(with_timeout(async move {
            if !id.is_valid() {
                return Err(RepositoryError::NotFound);
            }
            let mut store = self.store.write().await;
            store
                .movies
                .remove(&id)
                .map(|_| ())
                .ok_or(RepositoryError::NotFound)
        }))
    }

    fn get_all(
        &self,
        query: MovieQuery,
    ) -> BoxFuture<'_, Result<PaginatedResult<Movie>, RepositoryError>> {
        Box::pin(with_timeout(async move {
            let title_words = words(&query.title);
            let mut matching: Vec<Movie> = {
                let store = self.store.read().await;
                store
                    .movies
                    .values()
                    .filter(|movie| title_matches(&query.title, &title_words, &movie.title))
                    .filter(|movie| genres_match(&query.genres, &movie.genres))
                    .cloned()
                    .collect()
            };

            let filters = &query.filters;
            let column = filters.sort_column().to_string();
            let direction = filters.sort_direction();
            matching.sort_by(|left, right| {
                let primary = compare_by_column(&column, left, right);
                let primary = match direction {
                    SortDirection::Ascending => primary,
                    SortDirection::Descending => primary.reverse(),
                };
                primary.then_with(|| left.id.cmp(&right.id))
            });

            let total = i64::try_from(matching.len())
                .map_err(|error| RepositoryError::DatabaseError(error.to_string()))?;
            let offset = usize::try_from(filters.offset()).unwrap_or(usize::MAX);
            let limit = usize::try_from(filters.limit()).unwrap_or(0);
            let items = matching.into_iter().skip(offset).take(limit).collect();

            Ok(PaginatedResult::new(
                items,
                total,
                filters.page,
                filters.page_size,
            ))
        }))
    }
}

/// Lowercased alphanumeric words of `text`.
fn words(text: &str) -> HashSet<String> {
    text.split(|character: char| !character.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// An empty query matches everything; otherwise every query word must occur in the title.
fn title_matches(raw_query: &str, query_words: &HashSet<String>, title: &str) -> bool {
    if raw_query.is_empty() {
        return true;
    }
    if query_words.is_empty() {
        return false;
    }
    let title_words = words(title);
    query_words.is_subset(&title_words)
}

fn genres_match(wanted: &[String], genres: &[String]) -> bool {
    wanted.iter().all(|genre| genres.contains(genre))
}

fn compare_by_column(column: &str, left: &Movie, right: &Movie) -> Ordering {
    match column {
        "title" => left.title.cmp(&right.title),
        "year" => left.year.cmp(&right.year),
        "runtime" => left.runtime.cmp(&right.runtime),
        _ => left.id.cmp(&right.id),
    }
}
