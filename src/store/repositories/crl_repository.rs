//! CRL repository: appended by the CRL generator, pruned by retention
//! policy.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::errors::CaError;
use crate::store::dialect::SqlDialect;
use crate::store::models::CrlRow;

pub struct CrlRepository {
 pool: PgPool,
 dialect: Arc<dyn SqlDialect>,
}

impl CrlRepository {
 pub fn new(pool: PgPool, dialect: Arc<dyn SqlDialect>) -> Self {
 Self { pool, dialect }
 }

 pub async fn add_crl(&self, row: &CrlRow) -> Result<(), CaError> {
 sqlx::query(
 r#"
 INSERT INTO crl (id, ca_id, crl_number, this_update, next_update, is_delta, base_crl_number, der)
 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
 "#,
 )
.bind(row.id)
.bind(row.ca_id)
.bind(row.crl_number)
.bind(row.this_update)
.bind(row.next_update)
.bind(row.is_delta)
.bind(row.base_crl_number)
.bind(&row.der)
.execute(&self.pool)
.await
.map_err(|e| CaError::database_failure(format!("failed to persist CRL {}: {e}", row.crl_number)))?;
 Ok(())
 }

 pub async fn get_encoded_crl(&self, ca_id: i32, crl_number: Option<i64>) -> Result<CrlRow, CaError> {
 let row = match crl_number {
 Some(number) => {
 sqlx::query_as::<_, CrlRow>(
 &self.dialect.translate("SELECT * FROM crl WHERE ca_id = $1 AND crl_number = $2"),
 )
.bind(ca_id)
.bind(number)
.fetch_one(&self.pool)
.await
 }
 None => {
 let base = "SELECT * FROM crl WHERE ca_id = $1 AND is_delta = false ORDER BY crl_number DESC";
 sqlx::query_as::<_, CrlRow>(&self.dialect.translate(&self.dialect.build_select_first_sql(base)))
.bind(ca_id)
.fetch_one(&self.pool)
.await
 }
 };
 row.map_err(|e| match e {
 sqlx::Error::RowNotFound => CaError::BadRequest(format!("no CRL for CA {ca_id}")),
 other => CaError::database_failure(format!("failed to load CRL: {other}")),
 })
 }

 pub async fn get_max_crl_number(&self, ca_id: i32, full_only: bool) -> Result<i64, CaError> {
 let query = if full_only {
 "SELECT COALESCE(MAX(crl_number), 0) FROM crl WHERE ca_id = $1 AND is_delta = false"
 } else {
 "SELECT COALESCE(MAX(crl_number), 0) FROM crl WHERE ca_id = $1"
 };
 let row: (i64,) = sqlx::query_as(&self.dialect.translate(query))
.bind(ca_id)
.fetch_one(&self.pool)
.await
.map_err(|e| CaError::database_failure(format!("failed to read max CRL number: {e}")))?;
 Ok(row.0)
 }

 /// The `thisUpdate` timestamp of the CA's current CRL: the most recent
 /// full CRL if `delta` is false, otherwise the most recent delta (or its
 /// base full CRL, if no delta has been issued yet).
 pub async fn get_this_update_of_current_crl(&self, ca_id: i32, delta: bool) -> Result<DateTime<Utc>, CaError> {
 let base = if delta {
 "SELECT this_update FROM crl WHERE ca_id = $1 ORDER BY crl_number DESC"
 } else {
 "SELECT this_update FROM crl WHERE ca_id = $1 AND is_delta = false ORDER BY crl_number DESC"
 };
 let row: (DateTime<Utc>,) = sqlx::query_as(&self.dialect.translate(&self.dialect.build_select_first_sql(base)))
.bind(ca_id)
.fetch_one(&self.pool)
.await
.map_err(|e| match e {
 sqlx::Error::RowNotFound => CaError::BadRequest(format!("no CRL for CA {ca_id}")),
 other => CaError::database_failure(format!("failed to read current CRL thisUpdate: {other}")),
 })?;
 Ok(row.0)
 }

 /// Deletes all full CRLs older than the newest `keep` (Open Question
 /// (b): delta CRLs are pruned along with the base CRL they reference,
 /// not counted independently).
 pub async fn cleanup_crls(&self, ca_id: i32, keep: i64) -> Result<u64, CaError> {
 let result = sqlx::query(&self.dialect.translate(
 r#"
 DELETE FROM crl
 WHERE ca_id = $1
 AND (
 is_delta = false AND crl_number NOT IN (
 SELECT crl_number FROM crl WHERE ca_id = $1 AND is_delta = false
 ORDER BY crl_number DESC LIMIT $2
 )
 OR (is_delta = true AND base_crl_number NOT IN (
 SELECT crl_number FROM crl WHERE ca_id = $1 AND is_delta = false
 ORDER BY crl_number DESC LIMIT $2
 ))
 )
 "#,
 ))
.bind(ca_id)
.bind(keep)
.execute(&self.pool)
.await
.map_err(|e| CaError::database_failure(format!("failed to clean up CRLs: {e}")))?;
 Ok(result.rows_affected())
 }
}
