//! Infrastructure module for external services.
//!
//! This module contains the movie repositories and the factory that picks one
//! at startup.

pub mod factory;
pub mod in_memory;
pub mod postgres;
pub mod repository;

pub use factory::{
    ConfigurationError, FactoryError, PoolSettings, RepositoryConfig, RepositoryFactory,
    StorageMode,
};
pub use in_memory::InMemoryMovieRepository;
pub use postgres::PostgresMovieRepository;
pub use repository::{
    MovieQuery, MovieRepository, PaginatedResult, QUERY_TIMEOUT, RepositoryError,
};
