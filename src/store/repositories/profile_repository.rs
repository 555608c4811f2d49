//! Profile repository: admin-managed issuance policy, names unique and
//! always lower-cased.

use std::sync::Arc;

use sqlx::PgPool;

use crate::errors::CaError;
use crate::store::dialect::SqlDialect;
use crate::store::models::ProfileRow;

pub struct ProfileRepository {
 pool: PgPool,
 dialect: Arc<dyn SqlDialect>,
}

impl ProfileRepository {
 pub fn new(pool: PgPool, dialect: Arc<dyn SqlDialect>) -> Self {
 Self { pool, dialect }
 }

 pub async fn get_by_name(&self, name: &str) -> Result<ProfileRow, CaError> {
 let lower = name.to_lowercase();
 sqlx::query_as::<_, ProfileRow>(&self.dialect.translate("SELECT * FROM profile WHERE name = $1"))
.bind(&lower)
.fetch_one(&self.pool)
.await
.map_err(|e| match e {
 sqlx::Error::RowNotFound => CaError::BadCertTemplate(format!("no profile named {lower}")),
 other => CaError::database_failure(format!("failed to load profile {lower}: {other}")),
 })
 }

 pub async fn list(&self) -> Result<Vec<ProfileRow>, CaError> {
 sqlx::query_as::<_, ProfileRow>(&self.dialect.translate("SELECT * FROM profile ORDER BY name"))
.fetch_all(&self.pool)
.await
.map_err(|e| CaError::database_failure(format!("failed to list profiles: {e}")))
 }
}
