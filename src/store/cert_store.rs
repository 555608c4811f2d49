//! `CertStore`: the persistence seam the revocation state machine, CRL
//! generator, and OCSP responder program against. `CertRepository` is the
//! Postgres implementation; tests substitute [`mock::MockCertStore`]
//! so those components run without a live database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::CaError;
use crate::store::models::CertRow;
use crate::store::repositories::CertRepository;

#[async_trait]
pub trait CertStore: Send + Sync {
 async fn add_cert(&self, row: &CertRow) -> Result<(), CaError>;
 async fn get_cert_with_rev_info(&self, ca_id: i32, serial_hex: &str) -> Result<CertRow, CaError>;
 /// A view over the same row shape as `get_cert_with_rev_info`, named
 /// separately since callers that only need the non-revocation fields
 /// document that intent at the call site.
 async fn get_cert_info(&self, ca_id: i32, serial_hex: &str) -> Result<CertRow, CaError>;
 async fn get_cert_for_id(&self, id: i64) -> Result<CertRow, CaError>;
 /// Hard-delete. Rejects with `SystemFailure` if more than one row
 /// matches `(ca_id, serial_hex)`.
 async fn remove_cert(&self, ca_id: i32, serial_hex: &str) -> Result<(), CaError>;
 async fn apply_revocation(
 &self,
 ca_id: i32,
 serial_hex: &str,
 revocation_time: DateTime<Utc>,
 invalidity_time: Option<DateTime<Utc>>,
 reason: i32,
 ) -> Result<(), CaError>;
 async fn apply_unrevocation(&self, ca_id: i32, serial_hex: &str, now: DateTime<Utc>) -> Result<(), CaError>;
 async fn get_revoked_certs(
 &self,
 ca_id: i32,
 not_expired_at: DateTime<Utc>,
 from_id: i64,
 limit: i64,
 ) -> Result<Vec<CertRow>, CaError>;
 async fn get_certs_updated_since(
 &self,
 ca_id: i32,
 since: DateTime<Utc>,
 not_expired_at: DateTime<Utc>,
 ) -> Result<Vec<CertRow>, CaError>;
 /// Paginated scan of serial numbers in ascending id order, optionally
 /// narrowed to revoked-only, unexpired, or CA-vs-end-entity rows.
 #[allow(clippy::too_many_arguments)]
 async fn get_serial_numbers(
 &self,
 ca_id: i32,
 from_id: i64,
 limit: i64,
 only_revoked: bool,
 not_expired_at: Option<DateTime<Utc>>,
 is_end_entity: Option<bool>,
 ) -> Result<Vec<String>, CaError>;
 async fn get_expired_serial_numbers(
 &self,
 ca_id: i32,
 expired_at: DateTime<Utc>,
 limit: i64,
 ) -> Result<Vec<String>, CaError>;
 /// Serials currently on `certificateHold`, updated at or after
 /// `latest_update`.
 async fn get_suspended_cert_serials(
 &self,
 ca_id: i32,
 latest_update: DateTime<Utc>,
 limit: i64,
 ) -> Result<Vec<String>, CaError>;
 /// Delta-CRL source rows: certificates revoked since `base_crl_number`'s
 /// thisUpdate and still unexpired (`revoked = true`), plus certificates
 /// that were revoked in that base CRL but have since been un-revoked
 /// (`revoked = false`) — the caller reports the latter with reason
 /// `removeFromCRL`.
 async fn get_certs_for_delta_crl(
 &self,
 ca_id: i32,
 base_crl_number: i64,
 not_expired_at: DateTime<Utc>,
 ) -> Result<Vec<CertRow>, CaError>;
 /// For subjects that encode a serial number into a DN component: the
 /// most recent (by notBefore) serial among subjects matching `name_pattern`
 /// (a SQL `LIKE` pattern), across every CA.
 async fn get_latest_serial_for_subject_like(&self, name_pattern: &str) -> Result<Option<String>, CaError>;
}

#[async_trait]
impl CertStore for CertRepository {
 async fn add_cert(&self, row: &CertRow) -> Result<(), CaError> {
 CertRepository::add_cert(self, row).await
 }

 async fn get_cert_with_rev_info(&self, ca_id: i32, serial_hex: &str) -> Result<CertRow, CaError> {
 CertRepository::get_cert_with_rev_info(self, ca_id, serial_hex).await
 }

 async fn get_cert_info(&self, ca_id: i32, serial_hex: &str) -> Result<CertRow, CaError> {
 CertRepository::get_cert_info(self, ca_id, serial_hex).await
 }

 async fn get_cert_for_id(&self, id: i64) -> Result<CertRow, CaError> {
 CertRepository::get_cert_for_id(self, id).await
 }

 async fn remove_cert(&self, ca_id: i32, serial_hex: &str) -> Result<(), CaError> {
 CertRepository::remove_cert(self, ca_id, serial_hex).await
 }

 async fn apply_revocation(
 &self,
 ca_id: i32,
 serial_hex: &str,
 revocation_time: DateTime<Utc>,
 invalidity_time: Option<DateTime<Utc>>,
 reason: i32,
 ) -> Result<(), CaError> {
 CertRepository::apply_revocation(self, ca_id, serial_hex, revocation_time, invalidity_time, reason).await
 }

 async fn apply_unrevocation(&self, ca_id: i32, serial_hex: &str, now: DateTime<Utc>) -> Result<(), CaError> {
 CertRepository::apply_unrevocation(self, ca_id, serial_hex, now).await
 }

 async fn get_revoked_certs(
 &self,
 ca_id: i32,
 not_expired_at: DateTime<Utc>,
 from_id: i64,
 limit: i64,
 ) -> Result<Vec<CertRow>, CaError> {
 CertRepository::get_revoked_certs(self, ca_id, not_expired_at, from_id, limit).await
 }

 async fn get_certs_updated_since(
 &self,
 ca_id: i32,
 since: DateTime<Utc>,
 not_expired_at: DateTime<Utc>,
 ) -> Result<Vec<CertRow>, CaError> {
 CertRepository::get_certs_updated_since(self, ca_id, since, not_expired_at).await
 }

 async fn get_serial_numbers(
 &self,
 ca_id: i32,
 from_id: i64,
 limit: i64,
 only_revoked: bool,
 not_expired_at: Option<DateTime<Utc>>,
 is_end_entity: Option<bool>,
 ) -> Result<Vec<String>, CaError> {
 CertRepository::get_serial_numbers(self, ca_id, from_id, limit, only_revoked, not_expired_at, is_end_entity).await
 }

 async fn get_expired_serial_numbers(
 &self,
 ca_id: i32,
 expired_at: DateTime<Utc>,
 limit: i64,
 ) -> Result<Vec<String>, CaError> {
 CertRepository::get_expired_serial_numbers(self, ca_id, expired_at, limit).await
 }

 async fn get_suspended_cert_serials(
 &self,
 ca_id: i32,
 latest_update: DateTime<Utc>,
 limit: i64,
 ) -> Result<Vec<String>, CaError> {
 CertRepository::get_suspended_cert_serials(self, ca_id, latest_update, limit).await
 }

 async fn get_certs_for_delta_crl(
 &self,
 ca_id: i32,
 base_crl_number: i64,
 not_expired_at: DateTime<Utc>,
 ) -> Result<Vec<CertRow>, CaError> {
 CertRepository::get_certs_for_delta_crl(self, ca_id, base_crl_number, not_expired_at).await
 }

 async fn get_latest_serial_for_subject_like(&self, name_pattern: &str) -> Result<Option<String>, CaError> {
 CertRepository::get_latest_serial_for_subject_like(self, name_pattern).await
 }
}

/// An in-memory [`CertStore`], used by tests for the revocation state
/// machine, CRL generator, and OCSP responder without a live Postgres
/// instance.
pub mod mock {
 use std::sync::Mutex;

 use super::*;

 #[derive(Default)]
 pub struct MockCertStore {
 rows: Mutex<Vec<CertRow>>,
 }

 impl MockCertStore {
 pub fn new(rows: Vec<CertRow>) -> Self {
 Self { rows: Mutex::new(rows) }
 }
 }

 #[async_trait]
 impl CertStore for MockCertStore {
 async fn add_cert(&self, row: &CertRow) -> Result<(), CaError> {
 self.rows.lock().unwrap().push(row.clone());
 Ok(())
 }

 async fn get_cert_with_rev_info(&self, ca_id: i32, serial_hex: &str) -> Result<CertRow, CaError> {
 self.rows
.lock()
.unwrap()
.iter()
.find(|r| r.ca_id == ca_id && r.serial_hex == serial_hex)
.cloned()
.ok_or_else(|| CaError::BadRequest(format!("no certificate ca={ca_id} serial={serial_hex}")))
 }

 async fn get_cert_info(&self, ca_id: i32, serial_hex: &str) -> Result<CertRow, CaError> {
 self.get_cert_with_rev_info(ca_id, serial_hex).await
 }

 async fn get_cert_for_id(&self, id: i64) -> Result<CertRow, CaError> {
 self.rows
.lock()
.unwrap()
.iter()
.find(|r| r.id == id)
.cloned()
.ok_or_else(|| CaError::BadRequest(format!("no certificate with id {id}")))
 }

 async fn remove_cert(&self, ca_id: i32, serial_hex: &str) -> Result<(), CaError> {
 let mut rows = self.rows.lock().unwrap();
 let matches: Vec<usize> = rows
.iter()
.enumerate()
.filter(|(_, r)| r.ca_id == ca_id && r.serial_hex == serial_hex)
.map(|(i, _)| i)
.collect();
 if matches.len() > 1 {
 return Err(CaError::SystemFailure(format!(
 "ca={ca_id} serial={serial_hex} matches {} rows, refusing to remove_cert",
 matches.len()
 )));
 }
 let Some(&idx) = matches.first() else {
 return Err(CaError::BadRequest(format!("no certificate ca={ca_id} serial={serial_hex}")));
 };
 rows.remove(idx);
 Ok(())
 }

 async fn apply_revocation(
 &self,
 ca_id: i32,
 serial_hex: &str,
 revocation_time: DateTime<Utc>,
 invalidity_time: Option<DateTime<Utc>>,
 reason: i32,
 ) -> Result<(), CaError> {
 let mut rows = self.rows.lock().unwrap();
 let row = rows
.iter_mut()
.find(|r| r.ca_id == ca_id && r.serial_hex == serial_hex)
.ok_or_else(|| CaError::BadRequest(format!("no certificate ca={ca_id} serial={serial_hex}")))?;
 row.revoked = true;
 row.revocation_time = Some(revocation_time);
 row.invalidity_time = invalidity_time;
 row.revocation_reason = Some(reason);
 row.last_updated = revocation_time;
 Ok(())
 }

 async fn apply_unrevocation(&self, ca_id: i32, serial_hex: &str, now: DateTime<Utc>) -> Result<(), CaError> {
 let mut rows = self.rows.lock().unwrap();
 let row = rows
.iter_mut()
.find(|r| r.ca_id == ca_id && r.serial_hex == serial_hex)
.ok_or_else(|| CaError::BadRequest(format!("no certificate ca={ca_id} serial={serial_hex}")))?;
 row.revoked = false;
 row.revocation_time = None;
 row.invalidity_time = None;
 row.revocation_reason = None;
 row.last_updated = now;
 Ok(())
 }

 async fn get_revoked_certs(
 &self,
 ca_id: i32,
 not_expired_at: DateTime<Utc>,
 from_id: i64,
 limit: i64,
 ) -> Result<Vec<CertRow>, CaError> {
 let mut out: Vec<CertRow> = self
.rows
.lock()
.unwrap()
.iter()
.filter(|r| r.ca_id == ca_id && r.revoked && r.not_after > not_expired_at && r.id > from_id)
.cloned()
.collect();
 out.sort_by_key(|r| r.id);
 out.truncate(limit as usize);
 Ok(out)
 }

 async fn get_certs_updated_since(
 &self,
 ca_id: i32,
 since: DateTime<Utc>,
 not_expired_at: DateTime<Utc>,
 ) -> Result<Vec<CertRow>, CaError> {
 let mut out: Vec<CertRow> = self
.rows
.lock()
.unwrap()
.iter()
.filter(|r| r.ca_id == ca_id && r.last_updated >= since && r.revoked && r.not_after > not_expired_at)
.cloned()
.collect();
 out.sort_by_key(|r| r.id);
 Ok(out)
 }

 async fn get_serial_numbers(
 &self,
 ca_id: i32,
 from_id: i64,
 limit: i64,
 only_revoked: bool,
 not_expired_at: Option<DateTime<Utc>>,
 is_end_entity: Option<bool>,
 ) -> Result<Vec<String>, CaError> {
 let mut rows: Vec<CertRow> = self
.rows
.lock()
.unwrap()
.iter()
.filter(|r| {
 r.ca_id == ca_id
&& r.id > from_id
&& (!only_revoked || r.revoked)
&& not_expired_at.is_none_or(|at| r.not_after > at)
&& is_end_entity.is_none_or(|ee| r.is_end_entity == ee)
 })
.cloned()
.collect();
 rows.sort_by_key(|r| r.id);
 rows.truncate(limit as usize);
 Ok(rows.into_iter().map(|r| r.serial_hex).collect())
 }

 async fn get_expired_serial_numbers(
 &self,
 ca_id: i32,
 expired_at: DateTime<Utc>,
 limit: i64,
 ) -> Result<Vec<String>, CaError> {
 let mut rows: Vec<CertRow> = self
.rows
.lock()
.unwrap()
.iter()
.filter(|r| r.ca_id == ca_id && r.not_after <= expired_at)
.cloned()
.collect();
 rows.sort_by_key(|r| r.id);
 rows.truncate(limit as usize);
 Ok(rows.into_iter().map(|r| r.serial_hex).collect())
 }

 async fn get_suspended_cert_serials(
 &self,
 ca_id: i32,
 latest_update: DateTime<Utc>,
 limit: i64,
 ) -> Result<Vec<String>, CaError> {
 let mut rows: Vec<CertRow> = self
.rows
.lock()
.unwrap()
.iter()
.filter(|r| {
 r.ca_id == ca_id
&& r.revoked
&& r.revocation_reason == Some(crate::revocation::REASON_CERTIFICATE_HOLD)
&& r.last_updated >= latest_update
 })
.cloned()
.collect();
 rows.sort_by_key(|r| r.last_updated);
 rows.truncate(limit as usize);
 Ok(rows.into_iter().map(|r| r.serial_hex).collect())
 }

 /// The mock has no CRL table to resolve `base_crl_number` against, so
 /// every currently-revoked, unexpired row is reported as a delta entry
 /// regardless of the base number passed in. Tests that need precise
 /// add/remove delta semantics assemble the expectation directly from
 /// `get_revoked_certs`/`get_certs_updated_since` instead of this method.
 async fn get_certs_for_delta_crl(
 &self,
 ca_id: i32,
 _base_crl_number: i64,
 not_expired_at: DateTime<Utc>,
 ) -> Result<Vec<CertRow>, CaError> {
 let mut out: Vec<CertRow> = self
.rows
.lock()
.unwrap()
.iter()
.filter(|r| r.ca_id == ca_id && r.revoked && r.not_after > not_expired_at)
.cloned()
.collect();
 out.sort_by_key(|r| r.id);
 Ok(out)
 }

 async fn get_latest_serial_for_subject_like(&self, name_pattern: &str) -> Result<Option<String>, CaError> {
 let pattern = name_pattern.replace('%', "");
 let mut matches: Vec<CertRow> = self
.rows
.lock()
.unwrap()
.iter()
.filter(|r| r.subject_text.contains(&pattern))
.cloned()
.collect();
 matches.sort_by_key(|r| r.not_before);
 Ok(matches.pop().map(|r| r.serial_hex))
 }
 }
}
