//! Movie domain model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::validator::{Validator, unique};

// =============================================================================
// Value Objects
// =============================================================================

/// Store-assigned identifier of a movie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovieId(i64);

impl MovieId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Ids start at 1; anything lower can never refer to a stored movie.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 >= 1
    }
}

impl fmt::Display for MovieId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl FromStr for MovieId {
    type Err = std::num::ParseIntError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value.parse().map(Self)
    }
}

/// Returned when a runtime string is not of the form `"<n> mins"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid runtime format")]
pub struct InvalidRuntimeFormat;

/// Movie running time in minutes.
///
/// On the wire a runtime is the string `"<n> mins"` rather than a bare number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Runtime(i32);

impl Runtime {
    /// Creates a runtime of `minutes`.
    #[must_use]
    pub const fn from_minutes(minutes: i32) -> Self {
        Self(minutes)
    }

    /// Returns the runtime in minutes.
    #[must_use]
    pub const fn minutes(self) -> i32 {
        self.0
    }

    /// Returns true for the zero value (no runtime supplied).
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} mins", self.0)
    }
}

impl FromStr for Runtime {
    type Err = InvalidRuntimeFormat;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parts = value.split(' ');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(number), Some("mins"), None) => number
                .parse::<i32>()
                .map(Self)
                .map_err(|_| InvalidRuntimeFormat),
            _ => Err(InvalidRuntimeFormat),
        }
    }
}

impl Serialize for Runtime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Runtime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(text) => text.parse().map_err(serde::de::Error::custom),
            _ => Err(serde::de::Error::custom(InvalidRuntimeFormat)),
        }
    }
}

// =============================================================================
// Movie
// =============================================================================

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Movie {
    pub id: MovieId,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
    pub title: String,
    #[serde(skip_serializing_if = "is_zero_year")]
    pub year: i32,
    #[serde(skip_serializing_if = "Runtime::is_zero")]
    pub runtime: Runtime,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,
    pub version: i32,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero_year(year: &i32) -> bool {
    *year == 0
}

impl Movie {
    /// Creates an unsaved movie. The store assigns id, creation time and version.
    #[must_use]
    pub fn new(title: impl Into<String>, year: i32, runtime: Runtime, genres: Vec<String>) -> Self {
        Self {
            id: MovieId::default(),
            created_at: Utc::now(),
            title: title.into(),
            year,
            runtime,
            genres,
            version: 0,
        }
    }
}

/// Earliest year accepted for a movie.
pub const EARLIEST_YEAR: i32 = 1888;

/// Longest accepted title, in bytes.
pub const MAX_TITLE_BYTES: usize = 500;

/// Largest number of genres a movie may carry.
pub const MAX_GENRES: usize = 5;

/// Records every rule `movie` breaks into `validator`.
pub fn validate_movie(validator: &mut Validator, movie: &Movie) {
    validate_movie_at(validator, movie, Utc::now().year());
}

/// Same as [`validate_movie`] with an explicit current year.
pub fn validate_movie_at(validator: &mut Validator, movie: &Movie, current_year: i32) {
    validator.check(!movie.title.is_empty(), "title", "must be provided");
    validator.check(
        movie.title.len() <= MAX_TITLE_BYTES,
        "title",
        "must not be more than 500 bytes long",
    );

    validator.check(movie.year != 0, "year", "must be provided");
    validator.check(
        movie.year >= EARLIEST_YEAR,
        "year",
        "must be greater than 1888",
    );
    validator.check(
        movie.year <= current_year,
        "year",
        "must not be in the future",
    );

    validator.check(!movie.runtime.is_zero(), "runtime", "must be provided");
    validator.check(
        movie.runtime.minutes() > 0,
        "runtime",
        "must be a positive integer",
    );

    validator.check(
        !movie.genres.is_empty(),
        "genres",
        "must contain at least 1 genre",
    );
    validator.check(
        movie.genres.len() <= MAX_GENRES,
        "genres",
        "must not contain more than 5 genres",
    );
    validator.check(
        unique(&movie.genres),
        "genres",
        "must not contain duplicate values",
    );
}
