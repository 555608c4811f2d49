//! Certificate repository: the append-mostly store addressed by monotonic
//! id, by (CA, serial), and by revocation state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::errors::CaError;
use crate::store::dialect::SqlDialect;
use crate::store::models::CertRow;

pub struct CertRepository {
 pool: PgPool,
 dialect: Arc<dyn SqlDialect>,
}

impl CertRepository {
 pub fn new(pool: PgPool, dialect: Arc<dyn SqlDialect>) -> Self {
 Self { pool, dialect }
 }

 /// Persists one row with the caller-allocated id. Atomic with respect
 /// to failure: either fully visible or not written at all.
 #[allow(clippy::too_many_arguments)]
 pub async fn add_cert(&self, row: &CertRow) -> Result<(), CaError> {
 sqlx::query(
 r#"
 INSERT INTO cert (
 id, ca_id, serial_hex, subject_text, subject_fingerprint,
 requested_subject_fingerprint, not_before, not_after, is_end_entity,
 profile_id, requestor_id, transaction_id, der, sha1_fingerprint,
 revoked, revocation_time, invalidity_time, revocation_reason, last_updated
 ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
 "#,
 )
.bind(row.id)
.bind(row.ca_id)
.bind(&row.serial_hex)
.bind(&row.subject_text)
.bind(row.subject_fingerprint)
.bind(row.requested_subject_fingerprint)
.bind(row.not_before)
.bind(row.not_after)
.bind(row.is_end_entity)
.bind(row.profile_id)
.bind(row.requestor_id)
.bind(&row.transaction_id)
.bind(&row.der)
.bind(&row.sha1_fingerprint)
.bind(row.revoked)
.bind(row.revocation_time)
.bind(row.invalidity_time)
.bind(row.revocation_reason)
.bind(row.last_updated)
.execute(&self.pool)
.await
.map_err(|e| CaError::database_failure(format!("failed to persist certificate {}: {e}", row.id)))?;
 Ok(())
 }

 pub async fn get_cert_with_rev_info(&self, ca_id: i32, serial_hex: &str) -> Result<CertRow, CaError> {
 sqlx::query_as::<_, CertRow>(
 &self.dialect.translate("SELECT * FROM cert WHERE ca_id = $1 AND serial_hex = $2"),
 )
.bind(ca_id)
.bind(serial_hex)
.fetch_one(&self.pool)
.await
.map_err(|e| match e {
 sqlx::Error::RowNotFound => {
 CaError::BadRequest(format!("no certificate ca={ca_id} serial={serial_hex}"))
 }
 other => CaError::database_failure(format!("failed to load certificate: {other}")),
 })
 }

 pub async fn get_cert_for_id(&self, id: i64) -> Result<CertRow, CaError> {
 sqlx::query_as::<_, CertRow>(&self.dialect.translate("SELECT * FROM cert WHERE id = $1"))
.bind(id)
.fetch_one(&self.pool)
.await
.map_err(|e| match e {
 sqlx::Error::RowNotFound => CaError::BadRequest(format!("no certificate with id {id}")),
 other => CaError::database_failure(format!("failed to load certificate {id}: {other}")),
 })
 }

 /// Same row shape as `get_cert_with_rev_info`, named separately so
 /// callers that only need the non-revocation fields document that
 /// intent at the call site.
 pub async fn get_cert_info(&self, ca_id: i32, serial_hex: &str) -> Result<CertRow, CaError> {
 self.get_cert_with_rev_info(ca_id, serial_hex).await
 }

 /// Hard-deletes the row matching `(ca_id, serial_hex)`. Rejects if more
 /// than one row matches — this store indexes on the pair but does not
 /// rely on a unique constraint to guard against it.
 pub async fn remove_cert(&self, ca_id: i32, serial_hex: &str) -> Result<(), CaError> {
 let existing = sqlx::query_as::<_, (i64,)>(
 &self.dialect.translate("SELECT id FROM cert WHERE ca_id = $1 AND serial_hex = $2"),
 )
.bind(ca_id)
.bind(serial_hex)
.fetch_all(&self.pool)
.await
.map_err(|e| CaError::database_failure(format!("failed to look up certificate for removal: {e}")))?;

 if existing.len() > 1 {
 return Err(CaError::SystemFailure(format!(
 "ca={ca_id} serial={serial_hex} matches {} rows, refusing to remove_cert",
 existing.len()
 )));
 }
 if existing.is_empty() {
 return Err(CaError::BadRequest(format!("no certificate ca={ca_id} serial={serial_hex}")));
 }

 sqlx::query(&self.dialect.translate("DELETE FROM cert WHERE ca_id = $1 AND serial_hex = $2"))
.bind(ca_id)
.bind(serial_hex)
.execute(&self.pool)
.await
.map_err(|e| CaError::database_failure(format!("failed to remove certificate: {e}")))?;
 Ok(())
 }

 /// Applies a revocation-state-machine transition. Returns an error if
 /// the row update count is not exactly 1.
 pub async fn apply_revocation(
 &self,
 ca_id: i32,
 serial_hex: &str,
 revocation_time: DateTime<Utc>,
 invalidity_time: Option<DateTime<Utc>>,
 reason: i32,
 ) -> Result<(), CaError> {
 let result = sqlx::query(&self.dialect.translate(
 r#"
 UPDATE cert
 SET revoked = true, revocation_time = $1, invalidity_time = $2,
 revocation_reason = $3, last_updated = $1
 WHERE ca_id = $4 AND serial_hex = $5
 "#,
 ))
.bind(revocation_time)
.bind(invalidity_time)
.bind(reason)
.bind(ca_id)
.bind(serial_hex)
.execute(&self.pool)
.await
.map_err(|e| CaError::database_failure(format!("failed to apply revocation: {e}")))?;

 if result.rows_affected() != 1 {
 return Err(CaError::SystemFailure(format!(
 "revocation update affected {} rows for ca={ca_id} serial={serial_hex}",
 result.rows_affected()
 )));
 }
 Ok(())
 }

 pub async fn apply_unrevocation(&self, ca_id: i32, serial_hex: &str, now: DateTime<Utc>) -> Result<(), CaError> {
 let result = sqlx::query(&self.dialect.translate(
 r#"
 UPDATE cert
 SET revoked = false, revocation_time = NULL, invalidity_time = NULL,
 revocation_reason = NULL, last_updated = $1
 WHERE ca_id = $2 AND serial_hex = $3
 "#,
 ))
.bind(now)
.bind(ca_id)
.bind(serial_hex)
.execute(&self.pool)
.await
.map_err(|e| CaError::database_failure(format!("failed to apply unrevocation: {e}")))?;

 if result.rows_affected() != 1 {
 return Err(CaError::SystemFailure(format!(
 "unrevocation update affected {} rows for ca={ca_id} serial={serial_hex}",
 result.rows_affected()
 )));
 }
 Ok(())
 }

 /// Paginated scan of revoked, unexpired certificates in ascending id
 /// order, the source for full CRL generation.
 pub async fn get_revoked_certs(
 &self,
 ca_id: i32,
 not_expired_at: DateTime<Utc>,
 from_id: i64,
 limit: i64,
 ) -> Result<Vec<CertRow>, CaError> {
 sqlx::query_as::<_, CertRow>(&self.dialect.translate(
 r#"
 SELECT * FROM cert
 WHERE ca_id = $1 AND revoked = true AND not_after > $2 AND id > $3
 ORDER BY id
 LIMIT $4
 "#,
 ))
.bind(ca_id)
.bind(not_expired_at)
.bind(from_id)
.bind(limit)
.fetch_all(&self.pool)
.await
.map_err(|e| CaError::database_failure(format!("failed to scan revoked certificates: {e}")))
 }

 /// Certificates updated since `since` (inclusive), for delta CRL
 /// computation.
 pub async fn get_certs_updated_since(
 &self,
 ca_id: i32,
 since: DateTime<Utc>,
 not_expired_at: DateTime<Utc>,
 ) -> Result<Vec<CertRow>, CaError> {
 sqlx::query_as::<_, CertRow>(&self.dialect.translate(
 r#"
 SELECT * FROM cert
 WHERE ca_id = $1 AND last_updated >= $2 AND revoked = true AND not_after > $3
 ORDER BY id
 "#,
 ))
.bind(ca_id)
.bind(since)
.bind(not_expired_at)
.fetch_all(&self.pool)
.await
.map_err(|e| CaError::database_failure(format!("failed to scan updated certificates: {e}")))
 }

 /// Paginated scan of serial numbers in ascending id order, optionally
 /// narrowed to revoked-only, unexpired, or CA-vs-end-entity rows.
 #[allow(clippy::too_many_arguments)]
 pub async fn get_serial_numbers(
 &self,
 ca_id: i32,
 from_id: i64,
 limit: i64,
 only_revoked: bool,
 not_expired_at: Option<DateTime<Utc>>,
 is_end_entity: Option<bool>,
 ) -> Result<Vec<String>, CaError> {
 let rows: Vec<(String,)> = sqlx::query_as(&self.dialect.translate(
 r#"
 SELECT serial_hex FROM cert
 WHERE ca_id = $1 AND id > $2
 AND (NOT $3 OR revoked = true)
 AND ($4::timestamptz IS NULL OR not_after > $4)
 AND ($5::bool IS NULL OR is_end_entity = $5)
 ORDER BY id
 LIMIT $6
 "#,
 ))
.bind(ca_id)
.bind(from_id)
.bind(only_revoked)
.bind(not_expired_at)
.bind(is_end_entity)
.bind(limit)
.fetch_all(&self.pool)
.await
.map_err(|e| CaError::database_failure(format!("failed to scan serial numbers: {e}")))?;
 Ok(rows.into_iter().map(|(s,)| s).collect())
 }

 /// Serials that expired at or before `expired_at`, for archival/cleanup
 /// sweeps.
 pub async fn get_expired_serial_numbers(
 &self,
 ca_id: i32,
 expired_at: DateTime<Utc>,
 limit: i64,
 ) -> Result<Vec<String>, CaError> {
 let rows: Vec<(String,)> = sqlx::query_as(&self.dialect.translate(
 r#"
 SELECT serial_hex FROM cert
 WHERE ca_id = $1 AND not_after <= $2
 ORDER BY id
 LIMIT $3
 "#,
 ))
.bind(ca_id)
.bind(expired_at)
.bind(limit)
.fetch_all(&self.pool)
.await
.map_err(|e| CaError::database_failure(format!("failed to scan expired serial numbers: {e}")))?;
 Ok(rows.into_iter().map(|(s,)| s).collect())
 }

 /// Serials currently on `certificateHold`, updated at or after
 /// `latest_update` — the source for hold-expiry sweeps that decide
 /// whether a hold should lapse back to `good` or convert to a firm
 /// revocation.
 pub async fn get_suspended_cert_serials(
 &self,
 ca_id: i32,
 latest_update: DateTime<Utc>,
 limit: i64,
 ) -> Result<Vec<String>, CaError> {
 let rows: Vec<(String,)> = sqlx::query_as(&self.dialect.translate(
 r#"
 SELECT serial_hex FROM cert
 WHERE ca_id = $1 AND revoked = true AND revocation_reason = $2 AND last_updated >= $3
 ORDER BY last_updated
 LIMIT $4
 "#,
 ))
.bind(ca_id)
.bind(crate::revocation::REASON_CERTIFICATE_HOLD)
.bind(latest_update)
.bind(limit)
.fetch_all(&self.pool)
.await
.map_err(|e| CaError::database_failure(format!("failed to scan suspended certificates: {e}")))?;
 Ok(rows.into_iter().map(|(s,)| s).collect())
 }

 /// Delta-CRL source rows relative to `base_crl_number`: looks up that
 /// CRL's `thisUpdate` and decodes its revoked-entry serials, then
 /// returns every row revoked since that timestamp (newly revoked,
 /// unexpired) plus every base-CRL serial that has since been
 /// un-revoked (reported so the caller can emit a `removeFromCRL`
 /// entry).
 pub async fn get_certs_for_delta_crl(
 &self,
 ca_id: i32,
 base_crl_number: i64,
 not_expired_at: DateTime<Utc>,
 ) -> Result<Vec<CertRow>, CaError> {
 let base: (DateTime<Utc>, Vec<u8>) = sqlx::query_as(
 &self.dialect.translate("SELECT this_update, der FROM crl WHERE ca_id = $1 AND crl_number = $2"),
 )
.bind(ca_id)
.bind(base_crl_number)
.fetch_one(&self.pool)
.await
.map_err(|e| match e {
 sqlx::Error::RowNotFound => {
 CaError::BadRequest(format!("no CRL numbered {base_crl_number} for ca={ca_id}"))
 }
 other => CaError::database_failure(format!("failed to load base CRL: {other}")),
 })?;
 let (since, base_der) = base;
 let base_serials: Vec<String> = crate::asn1::crl::decode_revoked_entries(&base_der)?
.into_iter()
.map(|entry| entry.serial_hex)
.collect();

 if self.dialect.supports_in_array() {
 sqlx::query_as::<_, CertRow>(&self.dialect.translate(
 r#"
 SELECT * FROM cert
 WHERE ca_id = $1 AND (
 (revoked = true AND last_updated >= $2 AND not_after > $3)
 OR (revoked = false AND serial_hex = ANY($4))
 )
 ORDER BY id
 "#,
 ))
.bind(ca_id)
.bind(since)
.bind(not_expired_at)
.bind(&base_serials)
.fetch_all(&self.pool)
.await
.map_err(|e| CaError::database_failure(format!("failed to scan delta CRL source rows: {e}")))
 } else {
 let revoked_since = sqlx::query_as::<_, CertRow>(&self.dialect.translate(
 "SELECT * FROM cert WHERE ca_id = $1 AND revoked = true AND last_updated >= $2 AND not_after > $3 ORDER BY id",
 ))
.bind(ca_id)
.bind(since)
.bind(not_expired_at)
.fetch_all(&self.pool)
.await
.map_err(|e| CaError::database_failure(format!("failed to scan delta CRL source rows: {e}")))?;

 let mut un_revoked = Vec::new();
 for serial in &base_serials {
 let row = sqlx::query_as::<_, CertRow>(
 &self.dialect.translate("SELECT * FROM cert WHERE ca_id = $1 AND serial_hex = $2 AND revoked = false"),
 )
.bind(ca_id)
.bind(serial)
.fetch_optional(&self.pool)
.await
.map_err(|e| CaError::database_failure(format!("failed to scan delta CRL source rows: {e}")))?;
 un_revoked.extend(row);
 }

 let mut combined = revoked_since;
 combined.extend(un_revoked);
 Ok(combined)
 }
 }

 /// For subjects that encode a serial number into a DN component: the
 /// most recent (by notBefore) serial among subjects matching
 /// `name_pattern` (a SQL `LIKE` pattern), across every CA.
 pub async fn get_latest_serial_for_subject_like(&self, name_pattern: &str) -> Result<Option<String>, CaError> {
 let row: Option<(String,)> = sqlx::query_as(&self.dialect.translate(
 &self.dialect.build_select_first_sql("SELECT serial_hex FROM cert WHERE subject_text LIKE $1 ORDER BY not_before DESC"),
 ))
.bind(name_pattern)
.fetch_optional(&self.pool)
.await
.map_err(|e| CaError::database_failure(format!("failed to look up serial by subject pattern: {e}")))?;
 Ok(row.map(|(s,)| s))
 }
}
