//! CRL generator: produces full and delta CRLs from the
//! store, respecting a monotonic CRL number and thisUpdate/nextUpdate
//! windows, and folding entries unrevoked since the base CRL into the
//! delta's `removeFromCRL` set.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::asn1::crl::{decode_revoked_entries, encode_certificate_list, encode_tbs_cert_list, RevokedEntry};
use crate::asn1::name::Name;
use crate::errors::CaError;
use crate::revocation::{state_of, RevocationState, REASON_REMOVE_FROM_CRL};
use crate::signer::{Signer, SignerPool};
use crate::store::models::CrlRow;
use crate::store::repositories::{CaRepository, CrlRepository};
use crate::store::CertStore;

const SCAN_PAGE_SIZE: i64 = 500;
const BORROW_DEADLINE: Duration = Duration::from_secs(5);

fn cert_to_revoked_entry(cert: &crate::store::models::CertRow) -> RevokedEntry {
 RevokedEntry {
 serial_hex: cert.serial_hex.clone(),
 revocation_time: cert.revocation_time.expect("revoked cert without revocation_time"),
 reason: cert.revocation_reason,
 invalidity_date: cert.invalidity_time,
 }
}

/// Generate and persist a full CRL for CA `ca_id` at `this_update`.
pub async fn generate_full_crl(
 ca_repo: &CaRepository,
 crl_repo: &CrlRepository,
 cert_store: &dyn CertStore,
 signer_pool: &SignerPool<Box<dyn Signer>>,
 uid: &crate::uid::UniqueIdGenerator,
 ca_id: i32,
 issuer: &Name,
 this_update: DateTime<Utc>,
 next_update: Option<DateTime<Utc>>,
 signature_algorithm_oid: &str,
 keep: i64,
) -> Result<CrlRow, CaError> {
 let crl_number = ca_repo.claim_next_crl_number(ca_id).await?;

 let mut revoked = Vec::new();
 let mut from_id = 0i64;
 loop {
 let page = cert_store
.get_revoked_certs(ca_id, this_update, from_id, SCAN_PAGE_SIZE)
.await?;
 if page.is_empty() {
 break;
 }
 from_id = page.last().map(|c| c.id).unwrap_or(from_id);
 revoked.extend(page.iter().map(cert_to_revoked_entry));
 if (revoked.len() as i64) % SCAN_PAGE_SIZE != 0 {
 break;
 }
 }
 // CRL idempotence (testable property #4): stable ordering by serial ascending.
 revoked.sort_by(|a, b| a.serial_hex.cmp(&b.serial_hex));

 let tbs = encode_tbs_cert_list(
 issuer,
 signature_algorithm_oid,
 this_update,
 next_update,
 &revoked,
 crl_number as u64,
 None,
 );

 let mut signer = signer_pool.borrow(Some(BORROW_DEADLINE))?;
 let signature = signer.sign(&tbs)?;
 drop(signer);

 let der = encode_certificate_list(&tbs, signature_algorithm_oid, &signature);

 let row = CrlRow {
 id: uid.next_id(),
 ca_id,
 crl_number,
 this_update,
 next_update,
 is_delta: false,
 base_crl_number: None,
 der,
 };
 crl_repo.add_crl(&row).await?;
 crl_repo.cleanup_crls(ca_id, keep).await?;
 tracing::info!(ca_id, crl_number, revoked = revoked.len(), "full crl signed");
 Ok(row)
}

/// Generate and persist a delta CRL relative to `base`.
pub async fn generate_delta_crl(
 crl_repo: &CrlRepository,
 cert_store: &dyn CertStore,
 signer_pool: &SignerPool<Box<dyn Signer>>,
 uid: &crate::uid::UniqueIdGenerator,
 ca_id: i32,
 issuer: &Name,
 base: &CrlRow,
 this_update: DateTime<Utc>,
 next_update: Option<DateTime<Utc>>,
 signature_algorithm_oid: &str,
) -> Result<CrlRow, CaError> {
 let base_entries = decode_revoked_entries(&base.der)?;
 let base_serials: std::collections::HashSet<String> =
 base_entries.iter().map(|e| e.serial_hex.clone()).collect();

 let mut entries = Vec::new();

 // Step 2: for each base entry, check the current store; unrevoked or
 // expired members leave the CRL via removeFromCRL.
 for base_entry in &base_entries {
 let current = cert_store.get_cert_with_rev_info(ca_id, &base_entry.serial_hex).await?;
 let still_in_force = matches!(state_of(&current), RevocationState::Revoked | RevocationState::Hold)
 && !crate::revocation::is_expired(&current, this_update);
 if !still_in_force {
 entries.push(RevokedEntry {
 serial_hex: base_entry.serial_hex.clone(),
 revocation_time: this_update,
 reason: Some(REASON_REMOVE_FROM_CRL),
 invalidity_date: None,
 });
 }
 }

 // Step 3: certificates revoked since the base CRL and still unexpired,
 // skipping base entries that are unchanged.
 let since = base.this_update - chrono::Duration::seconds(1);
 let updated = cert_store
.get_certs_updated_since(ca_id, since, this_update)
.await?;
 for cert in &updated {
 if base_serials.contains(&cert.serial_hex) {
 continue;
 }
 entries.push(cert_to_revoked_entry(cert));
 }

 entries.sort_by(|a, b| a.serial_hex.cmp(&b.serial_hex));

 let crl_number = base.crl_number + 1;
 let tbs = encode_tbs_cert_list(
 issuer,
 signature_algorithm_oid,
 this_update,
 next_update,
 &entries,
 crl_number as u64,
 Some(base.crl_number as u64),
 );

 let mut signer = signer_pool.borrow(Some(BORROW_DEADLINE))?;
 let signature = signer.sign(&tbs)?;
 drop(signer);

 let der = encode_certificate_list(&tbs, signature_algorithm_oid, &signature);

 let row = CrlRow {
 id: uid.next_id(),
 ca_id,
 crl_number,
 this_update,
 next_update,
 is_delta: true,
 base_crl_number: Some(base.crl_number),
 der,
 };
 crl_repo.add_crl(&row).await?;
 tracing::info!(ca_id, crl_number, base = base.crl_number, entries = entries.len(), "delta crl signed");
 Ok(row)
}

#[cfg(test)]
mod tests {
 use super::*;
 use crate::asn1::name::{AttributeTypeAndValue, OID_O};

 fn row(serial_hex: &str, revoked: bool, reason: Option<i32>, not_after_days: i64, last_updated_offset_secs: i64) -> crate::store::models::CertRow {
 let now = Utc::now();
 crate::store::models::CertRow {
 id: 1,
 ca_id: 1,
 serial_hex: serial_hex.to_string(),
 subject_text: "CN=host".to_string(),
 subject_fingerprint: 0,
 requested_subject_fingerprint: None,
 not_before: now,
 not_after: now + chrono::Duration::days(not_after_days),
 is_end_entity: true,
 profile_id: 1,
 requestor_id: None,
 transaction_id: None,
 der: vec![],
 sha1_fingerprint: "abc".to_string(),
 revoked,
 revocation_time: if revoked { Some(now) } else { None },
 invalidity_time: None,
 revocation_reason: reason,
 last_updated: now + chrono::Duration::seconds(last_updated_offset_secs),
 }
 }

 #[test]
 fn full_crl_idempotence_same_input_same_der() {
 let issuer = Name {
 rdns: vec![vec![AttributeTypeAndValue { oid: OID_O.into(), value: "Acme Root".into() }]],
 };
 let t0 = Utc::now();
 let entries = vec![
 cert_to_revoked_entry(&row("2a", true, Some(1), 365, 0)),
 cert_to_revoked_entry(&row("01", true, Some(4), 365, 0)),
 ];
 let mut sorted = entries.clone();
 sorted.sort_by(|a, b| a.serial_hex.cmp(&b.serial_hex));

 let tbs_a = encode_tbs_cert_list(&issuer, "1.2.840.10045.4.3.2", t0, None, &sorted, 5, None);
 let tbs_b = encode_tbs_cert_list(&issuer, "1.2.840.10045.4.3.2", t0, None, &sorted, 5, None);
 assert_eq!(tbs_a, tbs_b);
 assert_eq!(sorted[0].serial_hex, "01");
 assert_eq!(sorted[1].serial_hex, "2a");
 }
}
