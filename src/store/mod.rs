//! Persistence layer: row types, a `SqlDialect` abstraction, repositories
//! per entity, and the `CertStore` trait the rest of the core programs
//! against (so CRL generation, revocation, and the OCSP responder can be
//! tested with an in-memory double instead of a live Postgres instance).

pub mod cert_store;
pub mod dialect;
pub mod models;
pub mod repositories;

use std::sync::Arc;

use sqlx::PgPool;

use crate::errors::CaError;
pub use cert_store::CertStore;
pub use dialect::{PostgresDialect, SqlDialect};
pub use repositories::{
 CaRepository, CertRepository, CrlRepository, ProfileRepository, PublishQueueRepository,
};

/// Connection pool plus the dialect-specific SQL builder. Cloning is cheap
/// (the pool is internally reference counted, and the dialect is shared
/// behind an `Arc`).
#[derive(Clone)]
pub struct Database {
 pool: PgPool,
 dialect: Arc<dyn SqlDialect>,
}

impl Database {
 pub async fn connect(database_url: &str) -> Result<Self, CaError> {
 Self::connect_with_dialect(database_url, Arc::new(PostgresDialect)).await
 }

 pub async fn connect_with_dialect(
 database_url: &str,
 dialect: Arc<dyn SqlDialect>,
 ) -> Result<Self, CaError> {
 let pool = PgPool::connect(database_url)
.await
.map_err(|e| CaError::database_failure(format!("failed to connect: {e}")))?;
 Ok(Self { pool, dialect })
 }

 pub fn pool(&self) -> &PgPool {
 &self.pool
 }

 pub async fn health_check(&self) -> Result<(), CaError> {
 sqlx::query("SELECT 1")
.fetch_one(&self.pool)
.await
.map_err(|e| CaError::database_failure(format!("health check failed: {e}")))?;
 Ok(())
 }

 pub fn ca_repository(&self) -> CaRepository {
 CaRepository::new(self.pool.clone(), self.dialect.clone())
 }

 pub fn cert_repository(&self) -> CertRepository {
 CertRepository::new(self.pool.clone(), self.dialect.clone())
 }

 pub fn crl_repository(&self) -> CrlRepository {
 CrlRepository::new(self.pool.clone(), self.dialect.clone())
 }

 pub fn publish_queue_repository(&self) -> PublishQueueRepository {
 PublishQueueRepository::new(self.pool.clone(), self.dialect.clone())
 }

 pub fn profile_repository(&self) -> ProfileRepository {
 ProfileRepository::new(self.pool.clone(), self.dialect.clone())
 }
}
