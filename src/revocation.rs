//! Revocation state machine: transitions among `Good`, `Hold`
//! (reason=certificateHold), `Revoked` (reason≠certificateHold), and the
//! implicit, non-transitioning `Expired` observation.

use chrono::{DateTime, Utc};

use crate::errors::CaError;
use crate::publish::PublishSink;
use crate::store::models::CertRow;
use crate::store::CertStore;

/// `CRLReason` values this core assigns (RFC 5280 §5.3.1); `CertificateHold`
/// is the only reversible one.
pub const REASON_UNSPECIFIED: i32 = 0;
pub const REASON_KEY_COMPROMISE: i32 = 1;
pub const REASON_CA_COMPROMISE: i32 = 2;
pub const REASON_AFFILIATION_CHANGED: i32 = 3;
pub const REASON_SUPERSEDED: i32 = 4;
pub const REASON_CESSATION_OF_OPERATION: i32 = 5;
pub const REASON_CERTIFICATE_HOLD: i32 = 6;
pub const REASON_REMOVE_FROM_CRL: i32 = 8;
pub const REASON_PRIVILEGE_WITHDRAWN: i32 = 9;
pub const REASON_AA_COMPROMISE: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationState {
 Good,
 Hold,
 Revoked,
}

pub fn state_of(cert: &CertRow) -> RevocationState {
 if !cert.revoked {
 RevocationState::Good
 } else if cert.revocation_reason == Some(REASON_CERTIFICATE_HOLD) {
 RevocationState::Hold
 } else {
 RevocationState::Revoked
 }
}

/// Information supplied by the caller requesting a revocation.
#[derive(Debug, Clone)]
pub struct RevocationInfo {
 pub reason: i32,
 pub revocation_time: DateTime<Utc>,
 pub invalidity_time: Option<DateTime<Utc>>,
}

/// Applies `revoke_cert`. `force` bypasses
/// the conflict guards on `Revoked → anything` and `Hold → Hold` (same
/// reason).
pub async fn revoke_cert(
 repo: &dyn CertStore,
 publish: &dyn PublishSink,
 ca_id: i32,
 serial_hex: &str,
 info: RevocationInfo,
 force: bool,
) -> Result<CertRow, CaError> {
 let current = repo.get_cert_with_rev_info(ca_id, serial_hex).await?;
 let state = state_of(&current);

 match state {
 RevocationState::Good => {}
 RevocationState::Hold => {
 if info.reason == REASON_CERTIFICATE_HOLD && !force {
 return Err(CaError::CertRevoked(format!(
 "ca={ca_id} serial={serial_hex} already revoked with same reason"
 )));
 }
 }
 RevocationState::Revoked => {
 if !force {
 return Err(CaError::CertRevoked(format!(
 "ca={ca_id} serial={serial_hex} is already revoked"
 )));
 }
 }
 }

 // Hold → Revoked(reason≠hold) inherits the original revocationTime/invalidityTime.
 let (revocation_time, invalidity_time) = if state == RevocationState::Hold && info.reason != REASON_CERTIFICATE_HOLD {
 (
 current.revocation_time.unwrap_or(info.revocation_time),
 current.invalidity_time,
 )
 } else {
 (info.revocation_time, info.invalidity_time)
 };

 repo.apply_revocation(ca_id, serial_hex, revocation_time, invalidity_time, info.reason)
.await?;
 let row = repo.get_cert_with_rev_info(ca_id, serial_hex).await?;
 publish.enqueue(ca_id, row.id, false).await?;
 tracing::info!(ca_id, serial_hex, reason = info.reason, "certificate revoked");
 Ok(row)
}

/// Applies `unrevoke_cert`. Only permitted from `Hold` unless `force`.
pub async fn unrevoke_cert(
 repo: &dyn CertStore,
 publish: &dyn PublishSink,
 ca_id: i32,
 serial_hex: &str,
 force: bool,
) -> Result<CertRow, CaError> {
 let current = repo.get_cert_with_rev_info(ca_id, serial_hex).await?;
 let state = state_of(&current);

 if state != RevocationState::Hold && !force {
 return Err(CaError::NotPermitted(format!(
 "ca={ca_id} serial={serial_hex} is not on hold"
 )));
 }
 if state == RevocationState::Good {
 return Err(CaError::CertUnrevoked(format!(
 "ca={ca_id} serial={serial_hex} is not revoked"
 )));
 }

 repo.apply_unrevocation(ca_id, serial_hex, Utc::now()).await?;
 let row = repo.get_cert_with_rev_info(ca_id, serial_hex).await?;
 publish.enqueue(ca_id, row.id, true).await?;
 tracing::info!(ca_id, serial_hex, "certificate unrevoked");
 Ok(row)
}

/// Atomically advances a `Hold` entry to `Revoked(reason)`, rejecting if
/// the current state is not `Hold`.
pub async fn revoke_suspended(
 repo: &dyn CertStore,
 publish: &dyn PublishSink,
 ca_id: i32,
 serial_hex: &str,
 reason: i32,
) -> Result<CertRow, CaError> {
 let current = repo.get_cert_with_rev_info(ca_id, serial_hex).await?;
 if state_of(&current) != RevocationState::Hold {
 return Err(CaError::NotPermitted(format!(
 "ca={ca_id} serial={serial_hex} is not on hold"
 )));
 }
 let revocation_time = current.revocation_time.unwrap_or_else(Utc::now);
 repo.apply_revocation(ca_id, serial_hex, revocation_time, current.invalidity_time, reason)
.await?;
 let row = repo.get_cert_with_rev_info(ca_id, serial_hex).await?;
 publish.enqueue(ca_id, row.id, false).await?;
 tracing::info!(ca_id, serial_hex, reason, "certificate revoked");
 Ok(row)
}

pub fn is_expired(cert: &CertRow, at: DateTime<Utc>) -> bool {
 cert.not_after <= at
}

#[cfg(test)]
mod tests {
 use super::*;
 use crate::store::cert_store::mock::MockCertStore;

 fn good_cert(ca_id: i32, serial_hex: &str) -> CertRow {
 let now = Utc::now();
 CertRow {
 id: 1,
 ca_id,
 serial_hex: serial_hex.to_string(),
 subject_text: "CN=host1.example.org".to_string(),
 subject_fingerprint: 0,
 requested_subject_fingerprint: None,
 not_before: now,
 not_after: now + chrono::Duration::days(365),
 is_end_entity: true,
 profile_id: 1,
 requestor_id: None,
 transaction_id: None,
 der: vec![],
 sha1_fingerprint: "deadbeef".to_string(),
 revoked: false,
 revocation_time: None,
 invalidity_time: None,
 revocation_reason: None,
 last_updated: now,
 }
 }

 #[tokio::test]
 async fn revocation_round_trip_preserves_hold_time() {
 let store = MockCertStore::new(vec![good_cert(1, "2a")]);
 let t_hold = Utc::now();

 let held = revoke_cert(
 &store,
 &crate::publish::NoopPublishSink,
 1,
 "2a",
 RevocationInfo { reason: REASON_CERTIFICATE_HOLD, revocation_time: t_hold, invalidity_time: None },
 false,
 )
.await
.unwrap();
 assert_eq!(state_of(&held), RevocationState::Hold);

 let t_key_compromise = t_hold + chrono::Duration::seconds(30);
 let revoked = revoke_cert(
 &store,
 &crate::publish::NoopPublishSink,
 1,
 "2a",
 RevocationInfo {
 reason: REASON_KEY_COMPROMISE,
 revocation_time: t_key_compromise,
 invalidity_time: None,
 },
 false,
 )
.await
.unwrap();

 assert_eq!(state_of(&revoked), RevocationState::Revoked);
 assert_eq!(revoked.revocation_reason, Some(REASON_KEY_COMPROMISE));
 // revocationTime is preserved from the hold step, not overwritten by the new request.
 assert_eq!(revoked.revocation_time.unwrap().timestamp(), t_hold.timestamp());
 }

 #[tokio::test]
 async fn unrevoke_guard_respects_force() {
 let store = MockCertStore::new(vec![good_cert(1, "2a")]);
 revoke_cert(
 &store,
 &crate::publish::NoopPublishSink,
 1,
 "2a",
 RevocationInfo { reason: REASON_KEY_COMPROMISE, revocation_time: Utc::now(), invalidity_time: None },
 false,
 )
.await
.unwrap();

 let err = unrevoke_cert(&store, &crate::publish::NoopPublishSink, 1, "2a", false).await.unwrap_err();
 assert_eq!(err.kind(), crate::errors::CaErrorKind::NotPermitted);

 let unrevoked = unrevoke_cert(&store, &crate::publish::NoopPublishSink, 1, "2a", true).await.unwrap();
 assert_eq!(state_of(&unrevoked), RevocationState::Good);
 }

 #[tokio::test]
 async fn double_hold_is_rejected_without_force() {
 let store = MockCertStore::new(vec![good_cert(1, "2a")]);
 revoke_cert(
 &store,
 &crate::publish::NoopPublishSink,
 1,
 "2a",
 RevocationInfo { reason: REASON_CERTIFICATE_HOLD, revocation_time: Utc::now(), invalidity_time: None },
 false,
 )
.await
.unwrap();

 let err = revoke_cert(
 &store,
 &crate::publish::NoopPublishSink,
 1,
 "2a",
 RevocationInfo { reason: REASON_CERTIFICATE_HOLD, revocation_time: Utc::now(), invalidity_time: None },
 false,
 )
.await
.unwrap_err();
 assert_eq!(err.kind(), crate::errors::CaErrorKind::CertRevoked);
 }

 #[tokio::test]
 async fn revoke_suspended_requires_hold_state() {
 let store = MockCertStore::new(vec![good_cert(1, "2a")]);
 let err = revoke_suspended(&store, &crate::publish::NoopPublishSink, 1, "2a", REASON_KEY_COMPROMISE)
.await
.unwrap_err();
 assert_eq!(err.kind(), crate::errors::CaErrorKind::NotPermitted);

 revoke_cert(
 &store,
 &crate::publish::NoopPublishSink,
 1,
 "2a",
 RevocationInfo { reason: REASON_CERTIFICATE_HOLD, revocation_time: Utc::now(), invalidity_time: None },
 false,
 )
.await
.unwrap();
 let revoked = revoke_suspended(&store, &crate::publish::NoopPublishSink, 1, "2a", REASON_KEY_COMPROMISE)
.await
.unwrap();
 assert_eq!(state_of(&revoked), RevocationState::Revoked);
 }
}
