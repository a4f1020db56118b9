//! `PostgreSQL` repository implementation.
//!
//! Uses `sqlx` with a shared `PgPool`. Every statement runs under
//! [`QUERY_TIMEOUT`](super::repository::QUERY_TIMEOUT).
//!
//! # Table Schema
//!
//! ```sql
//! CREATE TABLE movies (
//!     id bigserial PRIMARY KEY,
//!     created_at timestamp(0) with time zone NOT NULL DEFAULT NOW(),
//!     title text NOT NULL,
//!     year integer NOT NULL,
//!     runtime integer NOT NULL,
//!     genres text[] NOT NULL,
//!     version integer NOT NULL DEFAULT 1
//! );
//! ```
//!
//! See `migrations/` for constraints and indexes.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use sqlx::{FromRow, PgPool};

use crate::domain::{Movie, MovieId, Runtime};
use crate::infrastructure::repository::with_timeout;
use crate::infrastructure::{MovieQuery, MovieRepository, PaginatedResult, RepositoryError};

/// Row shape shared by every `SELECT` on `movies`.
#[derive(Debug, FromRow)]
struct MovieRow {
    id: i64,
    created_at: DateTime<Utc>,
    title: String,
    year: i32,
    runtime: i32,
    genres: Vec<String>,
    version: i32,
}

impl From<MovieRow> for Movie {
    fn from(row: MovieRow) -> Self {
        Self {
            id: MovieId::new(row.id),
            created_at: row.created_at,
            title: row.title,
            year: row.year,
            runtime: Runtime::from_minutes(row.runtime),
            genres: row.genres,
            version: row.version,
        }
    }
}

/// A movie row plus the window count of all rows matching the list query.
#[derive(Debug, FromRow)]
struct CountedMovieRow {
    total_records: i64,
    #[sqlx(flatten)]
    movie: MovieRow,
}

/// Title and genre filter shared by the list and count statements.
const MATCHING_MOVIES: &str = "FROM movies \
     WHERE (to_tsvector('simple', title) @@ plainto_tsquery('simple', $1) OR $1 = '') \
     AND (genres @> $2 OR $2 = '{}')";

/// Counts every matching row. Used when the requested page lies past the end,
/// where the window count in the list statement has no row to ride on.
fn count_statement() -> String {
    format!("SELECT count(*) {MATCHING_MOVIES}")
}

/// Builds the list statement for an already validated sort key.
///
/// The sort column and direction come from the safelist, never from raw input,
/// so interpolating them is safe. `id ASC` gives a stable order across pages.
fn list_statement(column: &str, direction: &str) -> String {
    format!(
        "SELECT count(*) OVER() AS total_records, id, created_at, title, year, runtime, genres, version \
         {MATCHING_MOVIES} \
         ORDER BY {column} {direction}, id ASC \
         LIMIT $3 OFFSET $4"
    )
}

/// `PostgreSQL` implementation of `MovieRepository`.
///
/// # Example
///
/// ```ignore
/// let pool = PgPool::connect("postgres://localhost/greenlight").await?;
/// let repository = PostgresMovieRepository::new(pool);
/// let movie = repository.get(MovieId::new(1)).await?;
/// ```
#[derive(Debug, Clone)]
pub struct PostgresMovieRepository {
    pool: PgPool,
}

impl PostgresMovieRepository {
    /// Creates a new `PostgreSQL` movie repository with the given connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

}

impl MovieRepository for PostgresMovieRepository {
    fn insert(&self, movie: Movie) -> BoxFuture<'_, Result<Movie, RepositoryError>> {
        Box::pin(with_timeout(async move {
            let (id, created_at, version): (i64, DateTime<Utc>, i32) = sqlx::query_as(
                "INSERT INTO movies (title, year, runtime, genres) \
                 VALUES ($1, $2, $3, $4) \
                 RETURNING id, created_at, version",
            )
            .bind(&movie.title)
            .bind(movie.year)
            .bind(movie.runtime.minutes())
            .bind(&movie.genres)
            .fetch_one(&self.pool)
            .await?;

            Ok(Movie {
                id: MovieId::new(id),
                created_at,
                version,
                ..movie
            })
        }))
    }

    fn get(&self, id: MovieId) -> BoxFuture<'_, Result<Movie, RepositoryError>> {
        Box::pin(with_timeout(async move {
            if !id.is_valid() {
                return Err(RepositoryError::NotFound);
            }

            let row: MovieRow = sqlx::query_as(
                "SELECT id, created_at, title, year, runtime, genres, version \
                 FROM movies \
                 WHERE id = $1",
            )
            .bind(id.get())
            .fetch_one(&self.pool)
            .await?;

            Ok(row.into())
        }))
    }

    fn update(&self, movie: Movie) -> BoxFuture<'_, Result<Movie, RepositoryError>> {
        Box::pin(with_timeout(async move {
            let row: Option<(i32,)> = sqlx::query_as(
                "UPDATE movies \
                 SET title = $1, year = $2, runtime = $3, genres = $4, version = version + 1 \
                 WHERE id = $5 AND version = $6 \
                 RETURNING version",
            )
            .bind(&movie.title)
            .bind(movie.year)
            .bind(movie.runtime.minutes())
            .bind(&movie.genres)
            .bind(movie.id.get())
            .bind(movie.version)
            .fetch_optional(&self.pool)
            .await?;

            match row {
                Some((version,)) => Ok(Movie { version, ..movie }),
                None => Err(RepositoryError::EditConflict),
            }
        }))
    }

    fn delete(&self, id: MovieId) -> BoxFuture<'_, Result<(), RepositoryError>> {
        Box::pin(with_timeout(async move {
            if !id.is_valid() {
                return Err(RepositoryError::NotFound);
            }

            let result = sqlx::query("DELETE FROM movies WHERE id = $1")
                .bind(id.get())
                .execute(&self.pool)
                .await?;

            if result.rows_affected() == 0 {
                return Err(RepositoryError::NotFound);
            }
            Ok(())
        }))
    }

    fn get_all(
        &self,
        query: MovieQuery,
    ) -> BoxFuture<'_, Result<PaginatedResult<Movie>, RepositoryError>> {
        Box::pin(with_timeout(async move {
            let filters = &query.filters;
            let statement = list_statement(filters.sort_column(), filters.sort_direction().as_sql());

            let rows: Vec<CountedMovieRow> = sqlx::query_as(&statement)
                .bind(&query.title)
                .bind(&query.genres)
                .bind(filters.limit())
                .bind(filters.offset())
                .fetch_all(&self.pool)
                .await?;

            let total = match rows.first() {
                Some(row) => row.total_records,
                None if filters.offset() > 0 => {
                    sqlx::query_scalar(&count_statement())
                        .bind(&query.title)
                        .bind(&query.genres)
                        .fetch_one(&self.pool)
                        .await?
                }
                None => 0,
            };
            tracing::debug!(
                total,
                page = filters.page,
                page_size = filters.page_size,
                sort = %filters.sort,
                "Listed movies"
            );

            let items = rows.into_iter().map(|row| row.movie.into()).collect();
            Ok(PaginatedResult::new(
                items,
                total,
                filters.page,
                filters.page_size,
            ))
        }))
    }
}
