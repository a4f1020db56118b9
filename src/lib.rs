//! Movie catalog JSON API.
//!
//! CRUD over movies with pagination, filtering, sorting, optimistic locking
//! and rate limiting. Storage is either in memory or `PostgreSQL`, chosen at
//! startup.

pub mod api;
pub mod config;
pub mod domain;
pub mod infrastructure;
