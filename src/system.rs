//! `CaSystem`: the top-level harness wiring persistence, signer pools,
//! issuer identity, and configuration into the operations the CLI drives.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ed25519_dalek::SigningKey;

use crate::asn1::cert::decode as decode_certificate;
use crate::asn1::name::Name;
use crate::config::{CaConfig, CaEntryConfig};
use crate::crl_generator;
use crate::errors::CaError;
use crate::issuance::pipeline::{self, CaContext, IssuanceRequest};
use crate::issuance::profile::{Profile, ValidityMode};
use crate::issuer_identity::{IssuerIdentityEntry, IssuerIdentityTable};
use crate::ocsp_responder::OcspCache;
use crate::publish::Publishers;
use crate::revocation::{self, RevocationInfo};
use crate::signer::{Ed25519Signer, Signer, SignerPool};
use crate::store::models::{CertRow, CrlRow};
use crate::store::{CaRepository, CertStore, Database};
use crate::uid::UniqueIdGenerator;

const BORROW_DEADLINE: Duration = Duration::from_secs(5);
const CRL_KEEP: i64 = 5;

/// One loaded CA: its database row, issuer `Name`, and signer pool.
struct LoadedCa {
 ca_id: i32,
 issuer: Name,
 issuer_key_ski: Vec<u8>,
 not_after: DateTime<Utc>,
 signer_pool: SignerPool<Box<dyn Signer>>,
 signature_algorithm_oid: String,
}

/// Decode a hex-encoded 32-byte Ed25519 seed from a CA entry's
/// `signing_key_handle`. A real deployment resolves this handle against an
/// HSM or KMS; this core's demo wiring treats it as the seed directly.
fn load_ed25519_seed(handle: &str) -> Result<SigningKey, CaError> {
 let bytes = hex::decode(handle)
.map_err(|e| CaError::SystemFailure(format!("signing_key_handle is not valid hex: {e}")))?;
 let seed: [u8; 32] = bytes
.try_into()
.map_err(|_| CaError::SystemFailure("signing_key_handle must decode to 32 bytes".into()))?;
 Ok(SigningKey::from_bytes(&seed))
}

pub struct CaSystem {
 pub config: CaConfig,
 db: Database,
 uid: UniqueIdGenerator,
 issuer_table: IssuerIdentityTable,
 ocsp_cache: OcspCache,
 cas: HashMap<String, LoadedCa>,
 publishers: Publishers,
}

impl CaSystem {
 /// Connect to the database, load every configured CA's certificate and
 /// build its signer pool and issuer-identity entry.
 pub async fn new(config: CaConfig) -> Result<Self, CaError> {
 config.validate()?;
 let db = Database::connect(&config.database.url).await?;
 let uid = UniqueIdGenerator::new(config.uid.clone().into());

 let mut issuer_table = IssuerIdentityTable::new();
 let mut cas = HashMap::new();
 let ca_repo: CaRepository = db.ca_repository();

 for entry in &config.cas {
 let loaded = Self::load_ca(&ca_repo, entry).await?;
 issuer_table.insert(IssuerIdentityEntry::from_certificate(
 loaded.ca_id,
 &decode_certificate(&ca_repo.get_by_id(loaded.ca_id).await?.certificate_der)?,
 ));
 tracing::info!(ca_name = %entry.name, ca_id = loaded.ca_id, "ca loaded");
 cas.insert(entry.name.clone(), loaded);
 }

 let publishers = Publishers::new(db.publish_queue_repository(), config.publishers.clone());

 Ok(Self {
 config,
 db,
 uid,
 issuer_table,
 ocsp_cache: OcspCache::new(),
 cas,
 publishers,
 })
 }

 async fn load_ca(ca_repo: &CaRepository, entry: &CaEntryConfig) -> Result<LoadedCa, CaError> {
 let row = ca_repo.get_by_name(&entry.name).await?;
 let cert = decode_certificate(&row.certificate_der)?;
 let signing_key = load_ed25519_seed(&entry.signing_key_handle)?;
 let issuer_key_ski = crate::hash::HashAlgorithm::Sha1.digest(&cert.spki.public_key);

 let signers: Vec<Box<dyn Signer>> = (0..entry.signer_pool_size.max(1))
.map(|_| Box::new(Ed25519Signer::new(signing_key.clone())) as Box<dyn Signer>)
.collect();

 Ok(LoadedCa {
 ca_id: row.id,
 issuer: cert.subject,
 issuer_key_ski,
 not_after: cert.validity.not_after,
 signer_pool: SignerPool::new(entry.name.clone(), signers),
 signature_algorithm_oid: "1.3.101.112".to_string(),
 })
 }

 fn ca(&self, name: &str) -> Result<&LoadedCa, CaError> {
 self.cas
.get(name)
.ok_or_else(|| CaError::BadRequest(format!("unknown CA '{name}'")))
 }

 pub async fn health_check(&self) -> Result<(), CaError> {
 self.db.health_check().await
 }

 /// `enroll-cert`: issue a certificate against a named CA and profile.
 pub async fn enroll_cert(
 &self,
 ca_name: &str,
 profile_name: &str,
 csr_der: Vec<u8>,
 requestor_id: Option<i32>,
 transaction_id: Option<String>,
 is_end_entity: bool,
 ) -> Result<CertRow, CaError> {
 let ca = self.ca(ca_name)?;
 let profile_row = self.db.profile_repository().get_by_name(profile_name).await?;
 let profile = Profile::from_row(&profile_row, ValidityMode::Strict)?;

 let cert_repo = self.db.cert_repository();
 let serial_hex = format!("{:x}", self.uid.next_id());

 let ctx = CaContext {
 ca_id: ca.ca_id,
 ca_not_after: ca.not_after,
 issuer: &ca.issuer,
 issuer_key_ski: Some(&ca.issuer_key_ski),
 is_self_signed_root: false,
 };

 let result = pipeline::issue_certificate(
 &cert_repo,
 &ca.signer_pool,
 &self.uid,
 &self.publishers,
 &profile,
 &ctx,
 &serial_hex,
 &ca.signature_algorithm_oid,
 255,
 IssuanceRequest {
 csr_der,
 requested_not_before: None,
 requested_not_after: None,
 requestor_id,
 transaction_id,
 is_end_entity,
 },
 )
.await;
 if let Err(e) = &result {
 tracing::warn!(ca_name, error = %e, "enroll-cert failed");
 }
 result
 }

 /// `revoke-cert`.
 pub async fn revoke_cert(
 &self,
 ca_name: &str,
 serial_hex: &str,
 reason: i32,
 invalidity_time: Option<DateTime<Utc>>,
 force: bool,
 ) -> Result<CertRow, CaError> {
 let ca = self.ca(ca_name)?;
 let cert_repo = self.db.cert_repository();
 let result = revocation::revoke_cert(
 &cert_repo,
 &self.publishers,
 ca.ca_id,
 serial_hex,
 RevocationInfo { reason, revocation_time: Utc::now(), invalidity_time },
 force,
 )
.await;
 if let Err(e) = &result {
 tracing::warn!(ca_name, serial_hex, error = %e, "revoke-cert failed");
 }
 result
 }

 /// `unsuspend-cert`.
 pub async fn unsuspend_cert(&self, ca_name: &str, serial_hex: &str, force: bool) -> Result<CertRow, CaError> {
 let ca = self.ca(ca_name)?;
 let cert_repo = self.db.cert_repository();
 let result = revocation::unrevoke_cert(&cert_repo, &self.publishers, ca.ca_id, serial_hex, force).await;
 if let Err(e) = &result {
 tracing::warn!(ca_name, serial_hex, error = %e, "unsuspend-cert failed");
 }
 result
 }

 /// `new-crl`: generate and persist a fresh full CRL for a CA.
 pub async fn new_crl(&self, ca_name: &str, next_update: Option<DateTime<Utc>>) -> Result<CrlRow, CaError> {
 let ca = self.ca(ca_name)?;
 let ca_repo = self.db.ca_repository();
 let crl_repo = self.db.crl_repository();
 let cert_repo = self.db.cert_repository();
 let this_update = Utc::now();

 tracing::info!(ca_name, "new-crl requested");
 crl_generator::generate_full_crl(
 &ca_repo,
 &crl_repo,
 &cert_repo,
 &ca.signer_pool,
 &self.uid,
 ca.ca_id,
 &ca.issuer,
 this_update,
 next_update,
 &ca.signature_algorithm_oid,
 CRL_KEEP,
 )
.await
 }

 /// `crl`: fetch the most recently issued CRL for a CA (full or latest delta).
 pub async fn crl(&self, ca_name: &str) -> Result<CrlRow, CaError> {
 let ca = self.ca(ca_name)?;
 self.db.crl_repository().get_encoded_crl(ca.ca_id, None).await
 }

 /// `cacerts`: the DER of every configured CA's own certificate.
 pub async fn cacerts(&self) -> Result<Vec<(String, Vec<u8>)>, CaError> {
 let ca_repo = self.db.ca_repository();
 let mut out = Vec::with_capacity(self.cas.len());
 for (name, loaded) in &self.cas {
 let row = ca_repo.get_by_id(loaded.ca_id).await?;
 out.push((name.clone(), row.certificate_der));
 }
 Ok(out)
 }

 pub fn issuer_table(&self) -> &IssuerIdentityTable {
 &self.issuer_table
 }

 pub fn ocsp_cache(&self) -> &OcspCache {
 &self.ocsp_cache
 }

 pub fn borrow_deadline() -> Duration {
 BORROW_DEADLINE
 }
}
