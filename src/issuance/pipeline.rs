//! Certificate issuance pipeline: CSR in, signed + persisted
//! certificate out. Each step is a pure validator except the final
//! sign/persist pair, so POP failures, template failures, and validity
//! failures all surface before any I/O happens.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::asn1::cert::{encode_certificate, encode_tbs_certificate};
use crate::asn1::csr::{self, CertificationRequest, OID_DH_SIG_STATIC};
use crate::asn1::name::Name;
use crate::errors::CaError;
use crate::hash::SignatureAlgorithm;
use crate::issuance::profile::{IssuanceExtensionContext, Profile};
use crate::publish::PublishSink;
use crate::signer::verify::verify_standard;
use crate::signer::{Signer, SignerPool};
use crate::store::models::CertRow;
use crate::store::CertStore;

const BORROW_DEADLINE: Duration = Duration::from_secs(5);

/// Everything the caller knows about one issuance request.
pub struct IssuanceRequest {
 pub csr_der: Vec<u8>,
 pub requested_not_before: Option<DateTime<Utc>>,
 pub requested_not_after: Option<DateTime<Utc>>,
 pub requestor_id: Option<i32>,
 pub transaction_id: Option<String>,
 pub is_end_entity: bool,
}

/// CA-side context the pipeline needs but does not own: its subject (for
/// self-signed-root equality checks), its own notAfter (validity cutoff),
/// its subject-key-identifier (for the AKI extension), and the CSR signature
/// algorithm OID → `SignatureAlgorithm` map.
pub struct CaContext<'a> {
 pub ca_id: i32,
 pub ca_not_after: DateTime<Utc>,
 pub issuer: &'a Name,
 pub issuer_key_ski: Option<&'a [u8]>,
 pub is_self_signed_root: bool,
}

fn signature_algorithm_for_oid(oid: &str) -> Result<SignatureAlgorithm, CaError> {
 SignatureAlgorithm::from_oid(oid)
.ok_or_else(|| CaError::BadCertTemplate(format!("unrecognized signature algorithm OID {oid}")))
}

/// The 64-bit canonicalized subject fingerprint: the first 8
/// bytes of SHA-256 over the rendered subject text, big-endian.
fn fingerprint64(text: &str) -> i64 {
 let digest = crate::hash::HashAlgorithm::Sha256.digest(text.as_bytes());
 let mut buf = [0u8; 8];
 buf.copy_from_slice(&digest[..8]);
 i64::from_be_bytes(buf)
}

/// Step 2: verify proof-of-possession. Standard algorithms verify the CSR's
/// self-signature; DH-POP algorithms are rejected here (no key-agreement
/// resolver is wired into this entry point — see `verify_dh_pop_x25519` for
/// callers that have resolved the CA's static-DH key).
fn verify_pop(csr: &CertificationRequest) -> Result<(), CaError> {
 let alg = signature_algorithm_for_oid(&csr.signature_algorithm_oid)?;
 match alg {
 SignatureAlgorithm::DhPopX25519Sha256 | SignatureAlgorithm::DhPopX448Sha512 => {
 if csr.attributes.dh_sig_static.is_none() {
 return Err(CaError::BadPop("DH proof-of-possession algorithm without a DhSigStatic attribute".into()));
 }
 Err(CaError::BadPop(
 "DH proof-of-possession requires resolving the referenced key-agreement key; use verify_dh_pop_* directly".into(),
 ))
 }
 _ => verify_standard(alg, &csr.spki.public_key, &csr.tbs_der, &csr.signature),
 }
}

/// Step 3: canonicalize the SPKI to RFC 3279 style. EC keys must carry
/// named-curve parameters; Ed25519/X25519 keys carry none.
fn canonicalize_spki(csr: &CertificationRequest) -> Result<(), CaError> {
 match csr.spki.algorithm_oid.as_str() {
 "1.2.840.10045.2.1" => {
 // id-ecPublicKey: EC keys must declare a named curve.
 if csr.spki.algorithm_params.is_none() {
 return Err(CaError::BadCertTemplate("EC public key is missing named-curve parameters".into()));
 }
 Ok(())
 }
 "1.3.101.112" | "1.3.101.110" | "1.3.101.111" => {
 // Ed25519 / X25519 / X448: parameters MUST be absent.
 if csr.spki.algorithm_params.is_some() {
 return Err(CaError::BadCertTemplate("EdDSA/XDH public key must not carry AlgorithmIdentifier parameters".into()));
 }
 Ok(())
 }
 _ => Ok(()),
 }
}

/// Run the full issuance pipeline and persist the
/// result. Allocates the certificate's unique id from `uid`; the caller
/// supplies the serial (profile-dependent allocation, or the fixed serial a
/// self-signed root issuer uses).
#[allow(clippy::too_many_arguments)]
pub async fn issue_certificate(
 cert_store: &dyn CertStore,
 signer_pool: &SignerPool<Box<dyn Signer>>,
 uid: &crate::uid::UniqueIdGenerator,
 publish: &dyn PublishSink,
 profile: &Profile,
 ca: &CaContext<'_>,
 serial_hex: &str,
 signature_algorithm_oid: &str,
 subject_max_len: usize,
 request: IssuanceRequest,
) -> Result<CertRow, CaError> {
 // Step 1: parse and decode.
 let csr = csr::decode(&request.csr_der)?;
 tracing::info!(ca_id = ca.ca_id, serial_hex, "csr accepted");

 // Step 2: POP.
 if let Err(err) = verify_pop(&csr) {
 tracing::warn!(ca_id = ca.ca_id, serial_hex, error = %err, "proof-of-possession failed");
 return Err(err);
 }

 // Step 3: canonicalize SPKI.
 canonicalize_spki(&csr)?;

 // Step 4: profile validates the CSR's self-signature algorithm.
 profile.validate_public_key(&csr.signature_algorithm_oid)?;

 // Self-signed root issuance: the signer's public key must equal the
 // CSR's public key, so that the certificate really is self-signed
 // rather than merely issued by the root CA over some other key.
 let mut signer = signer_pool.borrow(Some(BORROW_DEADLINE))?;
 if ca.is_self_signed_root {
 let signer_key = signer.public_key();
 if signer_key != csr.spki.public_key {
 return Err(CaError::BadRequest(
 "self-signed-root issuance requires the signer's public key to equal the CSR public key".into(),
 ));
 }
 }

 // Step 5: derive the granted subject.
 let granted_subject = profile.subject_dn_spec.derive(&csr.subject)?;
 let subject_text = granted_subject.truncated_display_string(subject_max_len);
 let requested_subject_fingerprint = if granted_subject != csr.subject {
 Some(fingerprint64(&csr.subject.to_display_string()))
 } else {
 None
 };
 let subject_fingerprint = fingerprint64(&subject_text);

 // Step 6: validity window.
 let now = Utc::now();
 let (not_before, not_after) = profile.compute_validity(
 now,
 request.requested_not_before,
 request.requested_not_after,
 ca.ca_not_after,
 )?;

 // Step 7: extensions.
 let ctx = IssuanceExtensionContext {
 is_ca: profile.is_ca,
 subject_public_key: &csr.spki.public_key,
 issuer_key_ski: ca.issuer_key_ski,
 };
 let extensions = profile
.extension_producers
.iter()
.flat_map(|p| p.produce(&ctx))
.collect::<Vec<_>>();

 let tbs = encode_tbs_certificate(
 serial_hex,
 signature_algorithm_oid,
 ca.issuer,
 not_before,
 not_after,
 &granted_subject,
 &csr.spki.der,
 &extensions,
 );

 // Step 8: sign.
 let signature = signer.sign(&tbs)?;
 drop(signer);
 let der = encode_certificate(&tbs, signature_algorithm_oid, &signature);

 // Step 9: persist.
 let row = CertRow {
 id: uid.next_id(),
 ca_id: ca.ca_id,
 serial_hex: serial_hex.to_string(),
 subject_text,
 subject_fingerprint,
 requested_subject_fingerprint,
 not_before,
 not_after,
 is_end_entity: request.is_end_entity,
 profile_id: 0,
 requestor_id: request.requestor_id,
 transaction_id: request.transaction_id,
 der,
 sha1_fingerprint: hex::encode(crate::hash::HashAlgorithm::Sha1.digest(&tbs)),
 revoked: false,
 revocation_time: None,
 invalidity_time: None,
 revocation_reason: None,
 last_updated: now,
 };
 cert_store.add_cert(&row).await?;
 publish.enqueue(ca.ca_id, row.id, true).await?;
 tracing::info!(ca_id = ca.ca_id, serial_hex, cert_id = row.id, "certificate persisted");
 cert_store.get_cert_with_rev_info(ca.ca_id, serial_hex).await
}

#[cfg(test)]
mod tests {
 use super::*;
 use crate::asn1::der::tag as dtag;
 use crate::asn1::encode::{encode_integer, encode_sequence, encode_tlv};
 use crate::asn1::name::{encode_name, encode_oid, AttributeTypeAndValue, OID_CN, OID_O};
 use crate::issuance::profile::ValidityMode;
 use crate::store::cert_store::mock::MockCertStore;
 use crate::store::models::ProfileRow;
 use ed25519_dalek::{Signer as _, SigningKey};

 fn build_signed_csr(signing_key: &SigningKey, cn: &str) -> Vec<u8> {
 let subject = Name {
 rdns: vec![vec![AttributeTypeAndValue { oid: OID_CN.into(), value: cn.into() }]],
 };
 let subject_der = encode_name(&subject);

 let mut alg = encode_oid("1.3.101.112");
 alg.extend(encode_tlv(dtag::NULL, &[]));
 let alg_der = encode_sequence(&alg);

 let verifying_key = signing_key.verifying_key();
 let mut bit_string_content = vec![0u8];
 bit_string_content.extend_from_slice(verifying_key.as_bytes());
 let spki_der = encode_sequence(&[alg_der.clone(), encode_tlv(dtag::BIT_STRING, &bit_string_content)].concat());

 let version = encode_integer(&[0]);
 let attrs_der = encode_tlv(dtag::context(0), &[]);
 let tbs_body = [version, subject_der, spki_der, attrs_der].concat();
 let tbs_der = encode_sequence(&tbs_body);

 let signature = signing_key.sign(&tbs_der);
 let mut sig_content = vec![0u8];
 sig_content.extend_from_slice(&signature.to_bytes());
 let sig_bit_string = encode_tlv(dtag::BIT_STRING, &sig_content);

 encode_sequence(&[tbs_der, alg_der, sig_bit_string].concat())
 }

 fn profile_row() -> ProfileRow {
 ProfileRow {
 id: 1,
 name: "server".to_string(),
 profile_type: "end-entity".to_string(),
 validity_seconds: 86_400 * 90,
 subject_dn_spec: serde_json::json!({
 "rdns": [{"oid": "2.5.4.3", "allow_from_request": true}]
 }),
 allowed_signature_algorithms: vec!["1.3.101.112".to_string()],
 not_before_policy: "now".to_string(),
 }
 }

 struct TestSigner(SigningKey);
 impl Signer for TestSigner {
 fn algorithm(&self) -> SignatureAlgorithm {
 SignatureAlgorithm::Ed25519
 }
 fn sign(&mut self, message: &[u8]) -> Result<Vec<u8>, CaError> {
 Ok(self.0.sign(message).to_bytes().to_vec())
 }
 fn public_key(&self) -> Vec<u8> {
 self.0.verifying_key().as_bytes().to_vec()
 }
 }

 #[tokio::test]
 async fn issues_a_certificate_preserving_rdn_order_and_pop() {
 let csr_key = SigningKey::from_bytes(&[0x41; 32]);
 let ca_key = SigningKey::from_bytes(&[0x42; 32]);
 let csr_der = build_signed_csr(&csr_key, "host1.example.org");

 let profile = Profile::from_row(&profile_row(), ValidityMode::Strict).unwrap();
 let issuer = Name {
 rdns: vec![vec![AttributeTypeAndValue { oid: OID_O.into(), value: "Acme Root".into() }]],
 };
 let store = MockCertStore::new(vec![]);
 let pool: SignerPool<Box<dyn Signer>> =
 SignerPool::new("test-ca", vec![Box::new(TestSigner(ca_key)) as Box<dyn Signer>]);
 let uid = crate::uid::UniqueIdGenerator::new(crate::uid::UniqueIdConfig::default());

 let ca_ctx = CaContext {
 ca_id: 1,
 ca_not_after: Utc::now() + chrono::Duration::days(3650),
 issuer: &issuer,
 issuer_key_ski: None,
 is_self_signed_root: false,
 };

 let row = issue_certificate(
 &store,
 &pool,
 &uid,
 &crate::publish::NoopPublishSink,
 &profile,
 &ca_ctx,
 "01",
 "1.3.101.112",
 350,
 IssuanceRequest {
 csr_der,
 requested_not_before: None,
 requested_not_after: None,
 requestor_id: None,
 transaction_id: None,
 is_end_entity: true,
 },
 )
.await
.unwrap();

 assert_eq!(row.subject_text, "CN=host1.example.org");
 assert_eq!(row.serial_hex, "01");
 assert!(!row.revoked);

 let decoded = crate::asn1::cert::decode(&row.der).unwrap();
 assert_eq!(decoded.subject.to_display_string(), "CN=host1.example.org");
 assert_eq!(decoded.issuer.to_display_string(), "O=Acme Root");
 }

 #[tokio::test]
 async fn rejects_csr_with_tampered_signature() {
 let csr_key = SigningKey::from_bytes(&[0x41; 32]);
 let other_key = SigningKey::from_bytes(&[0x99; 32]);
 let mut csr_der = build_signed_csr(&csr_key, "host1.example.org");
 // Corrupt the last byte of the signature to break POP.
 let len = csr_der.len();
 csr_der[len - 1] ^= 0xFF;

 let profile = Profile::from_row(&profile_row(), ValidityMode::Strict).unwrap();
 let issuer = Name {
 rdns: vec![vec![AttributeTypeAndValue { oid: OID_O.into(), value: "Acme Root".into() }]],
 };
 let store = MockCertStore::new(vec![]);
 let pool: SignerPool<Box<dyn Signer>> =
 SignerPool::new("test-ca", vec![Box::new(TestSigner(other_key)) as Box<dyn Signer>]);
 let uid = crate::uid::UniqueIdGenerator::new(crate::uid::UniqueIdConfig::default());
 let ca_ctx = CaContext {
 ca_id: 1,
 ca_not_after: Utc::now() + chrono::Duration::days(3650),
 issuer: &issuer,
 issuer_key_ski: None,
 is_self_signed_root: false,
 };

 let err = issue_certificate(
 &store,
 &pool,
 &uid,
 &crate::publish::NoopPublishSink,
 &profile,
 &ca_ctx,
 "02",
 "1.3.101.112",
 350,
 IssuanceRequest {
 csr_der,
 requested_not_before: None,
 requested_not_after: None,
 requestor_id: None,
 transaction_id: None,
 is_end_entity: true,
 },
 )
.await
.unwrap_err();
 assert_eq!(err.kind(), crate::errors::CaErrorKind::BadPop);
 }
}
