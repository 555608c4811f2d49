//! CA repository: admin-managed rows, children never outlive the parent.

use std::sync::Arc;

use sqlx::PgPool;

use crate::errors::CaError;
use crate::store::dialect::SqlDialect;
use crate::store::models::CaRow;

pub struct CaRepository {
 pool: PgPool,
 dialect: Arc<dyn SqlDialect>,
}

impl CaRepository {
 pub fn new(pool: PgPool, dialect: Arc<dyn SqlDialect>) -> Self {
 Self { pool, dialect }
 }

 pub async fn get_by_id(&self, ca_id: i32) -> Result<CaRow, CaError> {
 sqlx::query_as::<_, CaRow>(&self.dialect.translate("SELECT * FROM ca WHERE id = $1"))
.bind(ca_id)
.fetch_one(&self.pool)
.await
.map_err(|e| match e {
 sqlx::Error::RowNotFound => CaError::BadRequest(format!("no CA with id {ca_id}")),
 other => CaError::database_failure(format!("failed to load CA {ca_id}: {other}")),
 })
 }

 pub async fn get_by_name(&self, name: &str) -> Result<CaRow, CaError> {
 sqlx::query_as::<_, CaRow>(&self.dialect.translate("SELECT * FROM ca WHERE name = $1"))
.bind(name)
.fetch_one(&self.pool)
.await
.map_err(|e| match e {
 sqlx::Error::RowNotFound => CaError::BadRequest(format!("no CA named {name}")),
 other => CaError::database_failure(format!("failed to load CA {name}: {other}")),
 })
 }

 pub async fn list_active(&self) -> Result<Vec<CaRow>, CaError> {
 sqlx::query_as::<_, CaRow>(
 &self.dialect.translate("SELECT * FROM ca WHERE status = 'active' ORDER BY id"),
 )
.fetch_all(&self.pool)
.await
.map_err(|e| CaError::database_failure(format!("failed to list active CAs: {e}")))
 }

 /// Atomically claims and advances `next_crl_number`, returning the
 /// number this caller must use. Per-CA CRL numbers are strictly
 /// increasing.
 pub async fn claim_next_crl_number(&self, ca_id: i32) -> Result<i64, CaError> {
 let row: (i64,) = sqlx::query_as(
 "UPDATE ca SET next_crl_number = next_crl_number + 1 WHERE id = $1 RETURNING next_crl_number - 1",
 )
.bind(ca_id)
.fetch_one(&self.pool)
.await
.map_err(|e| CaError::database_failure(format!("failed to claim CRL number for CA {ca_id}: {e}")))?;
 Ok(row.0)
 }

 pub async fn set_status(&self, ca_id: i32, status: &str) -> Result<(), CaError> {
 let result = sqlx::query("UPDATE ca SET status = $1 WHERE id = $2")
.bind(status)
.bind(ca_id)
.execute(&self.pool)
.await
.map_err(|e| CaError::database_failure(format!("failed to update CA {ca_id} status: {e}")))?;

 if result.rows_affected() == 0 {
 return Err(CaError::BadRequest(format!("no CA with id {ca_id}")));
 }
 Ok(())
 }
}
