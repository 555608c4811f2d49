//! Row types, one per entity. `FromRow` lets sqlx map a query
//! result directly into these structs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CaRow {
 pub id: i32,
 pub name: String,
 pub subject: String,
 pub signing_key_handle: String,
 pub certificate_der: Vec<u8>,
 pub cert_chain_der: Vec<Vec<u8>>,
 /// `"active"` or `"inactive"`.
 pub status: String,
 pub next_crl_number: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CertRow {
 /// 63-bit id minted by [`crate::uid::UniqueIdGenerator`].
 pub id: i64,
 pub ca_id: i32,
 /// Canonical lowercase hex, see `der::integer_bytes_to_hex`.
 pub serial_hex: String,
 pub subject_text: String,
 /// 64-bit canonicalized subject fingerprint.
 pub subject_fingerprint: i64,
 pub requested_subject_fingerprint: Option<i64>,
 pub not_before: DateTime<Utc>,
 pub not_after: DateTime<Utc>,
 pub is_end_entity: bool,
 pub profile_id: i32,
 pub requestor_id: Option<i32>,
 pub transaction_id: Option<String>,
 pub der: Vec<u8>,
 pub sha1_fingerprint: String,
 pub revoked: bool,
 pub revocation_time: Option<DateTime<Utc>>,
 pub invalidity_time: Option<DateTime<Utc>>,
 /// `CRLReason` numeric value, present iff `revoked`.
 pub revocation_reason: Option<i32>,
 pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CrlRow {
 pub id: i64,
 pub ca_id: i32,
 pub crl_number: i64,
 pub this_update: DateTime<Utc>,
 pub next_update: Option<DateTime<Utc>>,
 pub is_delta: bool,
 pub base_crl_number: Option<i64>,
 pub der: Vec<u8>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PublishQueueRow {
 pub publisher_id: i32,
 pub ca_id: i32,
 pub cert_id: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProfileRow {
 pub id: i32,
 /// Always lower-cased, enforced at the repository boundary.
 pub name: String,
 pub profile_type: String,
 pub validity_seconds: i64,
 pub subject_dn_spec: serde_json::Value,
 pub allowed_signature_algorithms: Vec<String>,
 pub not_before_policy: String,
}
