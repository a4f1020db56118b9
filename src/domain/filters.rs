//! Paging and sorting parameters for list queries.

use serde::Serialize;

use super::validator::{Validator, permitted_value};

/// Sort keys accepted by the movie list. A leading `-` sorts descending.
pub const MOVIE_SORT_SAFELIST: &[&str] = &[
    "id", "title", "year", "runtime", "-id", "-title", "-year", "-runtime",
];

/// Largest page number a client may request.
pub const MAX_PAGE: i64 = 10_000_000;

/// Largest page size a client may request.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Default page size when the client does not supply one.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Sort direction derived from the sort key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    /// SQL keyword for this direction.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// Page, page size and sort key of a list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filters {
    pub page: i64,
    pub page_size: i64,
    pub sort: String,
    pub sort_safelist: &'static [&'static str],
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort: "id".to_string(),
            sort_safelist: MOVIE_SORT_SAFELIST,
        }
    }
}

impl Filters {
    /// Number of rows per page.
    #[must_use]
    pub const fn limit(&self) -> i64 {
        self.page_size
    }

    /// Number of rows skipped before the current page.
    #[must_use]
    pub const fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    /// Column named by the sort key, without its direction prefix.
    ///
    /// # Panics
    ///
    /// Panics if the sort key is not in the safelist. Handlers validate the
    /// filters first, so reaching the panic means a caller skipped validation;
    /// the sort key is interpolated into SQL and must never be trusted.
    #[must_use]
    pub fn sort_column(&self) -> &str {
        if permitted_value(self.sort.as_str(), self.sort_safelist) {
            return self.sort.trim_start_matches('-');
        }
        panic!("unsafe sort parameter: {}", self.sort);
    }

    /// Direction encoded by the sort key.
    #[must_use]
    pub fn sort_direction(&self) -> SortDirection {
        if self.sort.starts_with('-') {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        }
    }
}

/// Records every rule `filters` breaks into `validator`.
pub fn validate_filters(validator: &mut Validator, filters: &Filters) {
    validator.check(filters.page > 0, "page", "must be greater than zero");
    validator.check(
        filters.page <= MAX_PAGE,
        "page",
        "must be a maximum of 10 million",
    );
    validator.check(
        filters.page_size > 0,
        "page_size",
        "must be greater than zero",
    );
    validator.check(
        filters.page_size <= MAX_PAGE_SIZE,
        "page_size",
        "must be a maximum of 100",
    );
    validator.check(
        permitted_value(filters.sort.as_str(), filters.sort_safelist),
        "sort",
        "invalid sort value",
    );
}

/// Paging summary returned alongside a page of results.
///
/// All fields are zero (and omitted from JSON) when nothing matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "is_zero")]
    pub current_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub page_size: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub first_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub last_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub total_records: i64,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(value: &i64) -> bool {
    *value == 0
}

impl Metadata {
    /// Builds paging metadata for `total_records` matching rows.
    #[must_use]
    pub const fn calculate(total_records: i64, page: i64, page_size: i64) -> Self {
        if total_records == 0 || page_size <= 0 {
            return Self {
                current_page: 0,
                page_size: 0,
                first_page: 0,
                last_page: 0,
                total_records: 0,
            };
        }

        Self {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: (total_records + page_size - 1) / page_size,
            total_records,
        }
    }
}
