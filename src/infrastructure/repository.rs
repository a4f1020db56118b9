//! Repository trait for movie records.
//!
//! Every method returns a boxed future so the trait stays object safe and
//! backends can be selected at runtime behind `Arc<dyn MovieRepository>`.

use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::domain::{Filters, Metadata, Movie, MovieId};

/// Upper bound on the time a single store operation may take.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(3);

// =============================================================================
// Repository Error
// =============================================================================

/// Errors that can occur during repository operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// No record with the requested id exists.
    #[error("record not found")]
    NotFound,

    /// The record changed (or vanished) since it was read.
    #[error("edit conflict")]
    EditConflict,

    /// The store did not answer within [`QUERY_TIMEOUT`].
    #[error("query timed out")]
    Timeout,

    /// Any other failure reported by the store.
    #[error("database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => Self::NotFound,
            other => Self::DatabaseError(other.to_string()),
        }
    }
}

/// Runs `operation` under [`QUERY_TIMEOUT`].
///
/// # Errors
///
/// Returns `RepositoryError::Timeout` if the deadline passes first, otherwise
/// whatever `operation` returned.
pub async fn with_timeout<T, F>(operation: F) -> Result<T, RepositoryError>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    tokio::time::timeout(QUERY_TIMEOUT, operation)
        .await
        .map_err(|_| RepositoryError::Timeout)?
}

// =============================================================================
// List Query
// =============================================================================

/// Filtering, sorting and paging for [`MovieRepository::get_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovieQuery {
    /// Words that must all appear in the title. Empty matches everything.
    pub title: String,
    /// Genres the movie must carry. Empty matches everything.
    pub genres: Vec<String>,
    /// Paging and sort key; validated before reaching the repository.
    pub filters: Filters,
}

/// One page of results plus the number of rows that matched overall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginatedResult<T> {
    /// The items in the current page.
    pub items: Vec<T>,
    /// Total number of matching items across all pages.
    pub total: i64,
    /// Current page (1-indexed).
    pub page: i64,
    /// Number of items per page.
    pub page_size: i64,
}

impl<T> PaginatedResult<T> {
    /// Creates a new paginated result.
    #[must_use]
    pub const fn new(items: Vec<T>, total: i64, page: i64, page_size: i64) -> Self {
        Self {
            items,
            total,
            page,
            page_size,
        }
    }

    /// Paging summary for clients.
    #[must_use]
    pub const fn metadata(&self) -> Metadata {
        Metadata::calculate(self.total, self.page, self.page_size)
    }
}

// =============================================================================
// Movie Repository
// =============================================================================

/// Persistence for movies.
///
/// Implementations guarantee that `update` is an atomic compare-and-swap on
/// the version: it only applies when the stored version equals the version
/// the caller read.
pub trait MovieRepository: Send + Sync {
    /// Stores a new movie, returning it with id, creation time and version 1.
    fn insert(&self, movie: Movie) -> BoxFuture<'_, Result<Movie, RepositoryError>>;

    /// Fetches a movie by id.
    ///
    /// Returns `RepositoryError::NotFound` for ids below 1 or unknown ids.
    fn get(&self, id: MovieId) -> BoxFuture<'_, Result<Movie, RepositoryError>>;

    /// Writes `movie` if its version still matches the stored one.
    ///
    /// On success the returned movie carries the incremented version.
    /// Returns `RepositoryError::EditConflict` if the row is gone or its version moved.
    fn update(&self, movie: Movie) -> BoxFuture<'_, Result<Movie, RepositoryError>>;

    /// Removes a movie by id.
    ///
    /// Returns `RepositoryError::NotFound` if nothing was removed.
    fn delete(&self, id: MovieId) -> BoxFuture<'_, Result<(), RepositoryError>>;

    /// Lists movies matching `query`, ordered by its sort key then by id.
    fn get_all(
        &self,
        query: MovieQuery,
    ) -> BoxFuture<'_, Result<PaginatedResult<Movie>, RepositoryError>>;
}
