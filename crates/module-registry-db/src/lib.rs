//! Persistence layer for the module registry
//!
//! This crate provides the three external stores the registry talks to:
//! - The version registry, behind the [`VersionRepository`] trait, with a
//!   PostgreSQL implementation and an in-memory one
//! - The artifact blob store, behind [`BlobStore`], which also issues signed
//!   time-limited retrieval handles
//! - The secret store, behind [`SecretStore`]
//!
//! # Example
//!
//! ```rust,no_run
//! use module_registry_db::{create_pool, PoolConfig, PostgresVersionRepository};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PoolConfig::new("postgres://localhost/module_registry");
//! let pool = create_pool(&config).await?;
//! let versions = PostgresVersionRepository::new(pool);
//! # Ok(())
//! # }
//! ```

// Re-export core domain types for convenience
pub use module_registry_core;

pub mod blob;
pub mod error;
pub mod memory;
pub mod pool;
pub mod postgres;
pub mod repository;
pub mod secrets;
pub mod signer;

pub use blob::{BlobStore, FileSystemBlobStore, InMemoryBlobStore};
pub use error::{DbError, DbResult};
pub use memory::InMemoryVersionRepository;
pub use pool::{close_pool, create_pool, run_migrations, verify_pool_health, PoolConfig};
pub use postgres::PostgresVersionRepository;
pub use repository::VersionRepository;
pub use secrets::{qualified_name, EnvSecretStore, SecretStore, StaticSecretStore};
pub use signer::{HandleSigner, ARTIFACT_ROUTE_PREFIX};

// Re-export sqlx types that users may need
pub use sqlx::postgres::PgPool;

/// Persistence layer version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Database URL that selects the in-memory version registry
pub const IN_MEMORY_DATABASE_URL: &str = "memory";
