//! Domain module for the movie catalog.
//!
//! This module contains the movie model, list filters and the validation
//! rules applied to both.

pub mod filters;
pub mod movie;
pub mod validator;

pub use filters::{
    DEFAULT_PAGE_SIZE, Filters, MOVIE_SORT_SAFELIST, Metadata, SortDirection, validate_filters,
};
pub use movie::{InvalidRuntimeFormat, Movie, MovieId, Runtime, validate_movie};
pub use validator::Validator;
