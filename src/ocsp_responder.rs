//! OCSP responder: request-bound checks, issuer-identity
//! matching, a three-way certificate status lookup, response assembly in
//! request order, and a response cache keyed by request fingerprint.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::asn1::cert::decode as decode_certificate;
use crate::asn1::ocsp::{
 decode_request, encode_error_response, encode_response_data, encode_responder_id_by_key_hash,
 encode_successful_response, CertId, CertStatus, OcspRequest, ResponseStatus, SingleResponse,
};
use crate::config::OcspConfig;
use crate::errors::CaError;
use crate::hash::{HashAlgorithm, SignatureAlgorithm};
use crate::issuer_identity::IssuerIdentityTable;
use crate::revocation::state_of;
use crate::signer::verify::verify_standard;
use crate::signer::{Signer, SignerPool};
use crate::store::CertStore;

const BORROW_DEADLINE: Duration = Duration::from_secs(5);

/// An OCSP response outcome: either a signed `successful` response or a
/// terminal error status, both already DER-encoded ( mapping to
/// standard `OCSPResponseStatus` values).
pub struct OcspOutcome {
 pub der: Vec<u8>,
 pub status: ResponseStatus,
}

fn error_outcome(status: ResponseStatus) -> OcspOutcome {
 OcspOutcome { der: encode_error_response(status), status }
}

struct CacheEntry {
 der: Vec<u8>,
 expires_at: DateTime<Utc>,
}

/// Response cache keyed by a fingerprint of the request body plus the
/// responder key id. A plain `Mutex<HashMap>` is
/// sufficient here: entries are small and lookups are not on as hot a path
/// as the signer pool.
#[derive(Default)]
pub struct OcspCache {
 entries: Mutex<HashMap<Vec<u8>, CacheEntry>>,
}

impl OcspCache {
 pub fn new() -> Self {
 Self::default()
 }

 fn key(request_der: &[u8], responder_key_id: &[u8]) -> Vec<u8> {
 let mut buf = HashAlgorithm::Sha256.digest(request_der);
 buf.extend_from_slice(responder_key_id);
 buf
 }

 fn get(&self, request_der: &[u8], responder_key_id: &[u8], now: DateTime<Utc>) -> Option<Vec<u8>> {
 let key = Self::key(request_der, responder_key_id);
 let entries = self.entries.lock().expect("ocsp cache mutex poisoned");
 entries.get(&key).filter(|e| e.expires_at > now).map(|e| e.der.clone())
 }

 fn put(&self, request_der: &[u8], responder_key_id: &[u8], der: Vec<u8>, expires_at: DateTime<Utc>) {
 let key = Self::key(request_der, responder_key_id);
 self.entries
.lock()
.expect("ocsp cache mutex poisoned")
.insert(key, CacheEntry { der, expires_at });
 }
}

/// One nonce extension's content, already isolated from
/// the raw `[2] EXPLICIT Extensions` blob by the caller's extension parser.
/// Kept as raw bytes since this core's ASN.1 layer does not build a generic
/// extensions-list decoder for requests (only the nonce extension is read).
pub struct RequestNonce {
 pub value: Vec<u8>,
}

fn encode_nonce_extension(nonce: &[u8]) -> Vec<u8> {
 use crate::asn1::encode::{encode_sequence, encode_tlv};
 use crate::asn1::name::encode_oid;
 let mut body = encode_oid("1.3.6.1.5.5.7.48.1.2"); // id-pkix-ocsp-nonce
 body.extend(encode_tlv(crate::asn1::der::tag::OCTET_STRING, nonce));
 encode_sequence(&body)
}

/// Verify a request's `optionalSignature` against the certificate it
/// carries. RFC 6960 lets a responder validate the signing certificate
/// against its own trust anchors (a CA cert, a delegated OCSP-signing
/// cert, whatever policy the deployment chooses); this core has no
/// requestor trust-anchor store, so it verifies the cryptographic
/// signature against the embedded certificate's own key but does not
/// chain-validate that certificate. A deployment that needs the latter
/// must add that check before honoring `require_signed_request`.
fn verify_request_signature(request: &OcspRequest) -> Result<(), CaError> {
 let Some(sig) = &request.signature else {
 return Err(CaError::NotPermitted("request requires a signature but none was provided".into()));
 };
 let Some(cert_der) = sig.certs_der.first() else {
 return Err(CaError::NotPermitted("signed request carried no certificate to verify against".into()));
 };
 let cert = decode_certificate(cert_der)
.map_err(|e| CaError::NotPermitted(format!("signed request's certificate is malformed: {e}")))?;
 let Some(alg) = SignatureAlgorithm::from_oid(&sig.signature_algorithm_oid) else {
 return Err(CaError::NotPermitted(format!(
 "unsupported request signature algorithm {}",
 sig.signature_algorithm_oid
 )));
 };
 verify_standard(alg, &cert.spki.public_key, &sig.tbs_request_der, &sig.signature)
.map_err(|e| CaError::NotPermitted(format!("request signature verification failed: {e}")))
}

/// Resolve a single `CertID` to its `SingleResponse`.
async fn resolve_single(
 cert_id: &CertId,
 issuer_table: &IssuerIdentityTable,
 cert_store: &dyn CertStore,
 config: &OcspConfig,
 this_update: DateTime<Utc>,
 next_update: Option<DateTime<Utc>>,
) -> Result<SingleResponse, CaError> {
 let Some(alg) = HashAlgorithm::from_oid(&cert_id.hash_algorithm_oid) else {
 return Err(CaError::BadRequest(format!(
 "unsupported CertID hash algorithm {}",
 cert_id.hash_algorithm_oid
 )));
 };

 let mut combined = cert_id.issuer_name_hash.clone();
 combined.extend_from_slice(&cert_id.issuer_key_hash);

 let Some(ca_id) = issuer_table.find_matching_ca(alg, &combined) else {
 return if config.unknown_issuer_returns_unauthorized {
 Err(CaError::NotPermitted("no issuer matches the request's CertID".into()))
 } else {
 Ok(SingleResponse {
 cert_id_der: cert_id.der.clone(),
 status: CertStatus::Unknown,
 this_update,
 next_update,
 })
 };
 };

 let status = match cert_store.get_cert_with_rev_info(ca_id, &cert_id.serial_hex).await {
 Ok(cert) => match state_of(&cert) {
 crate::revocation::RevocationState::Good => CertStatus::Good,
 _ => CertStatus::Revoked {
 revocation_time: cert.revocation_time.expect("revoked cert without revocation_time"),
 reason: cert.revocation_reason,
 },
 },
 Err(_) if config.non_issued_is_good => CertStatus::Good,
 Err(_) => CertStatus::Unknown,
 };

 Ok(SingleResponse { cert_id_der: cert_id.der.clone(), status, this_update, next_update })
}

/// Handle one OCSP request end to end. `responder_id_der`
/// is the already-encoded `ResponderID` CHOICE (see
/// [`encode_responder_id_by_key_hash`]); `responder_key_id` is the raw bytes
/// used for cache-key disambiguation between responders.
#[allow(clippy::too_many_arguments)]
pub async fn handle_request(
 request_der: &[u8],
 config: &OcspConfig,
 issuer_table: &IssuerIdentityTable,
 cert_store: &dyn CertStore,
 signer_pool: &SignerPool<Box<dyn Signer>>,
 cache: &OcspCache,
 responder_id_der: &[u8],
 responder_key_id: &[u8],
 signature_algorithm_oid: &str,
 next_update: Option<DateTime<Utc>>,
 request_nonce: Option<RequestNonce>,
 honor_nonce: bool,
) -> OcspOutcome {
 // Step 1: size bound.
 if request_der.len() > config.max_request_size_bytes {
 return error_outcome(ResponseStatus::MalformedRequest);
 }

 let now = Utc::now();
 if let Some(cached) = cache.get(request_der, responder_key_id, now) {
 return OcspOutcome { der: cached, status: ResponseStatus::Successful };
 }

 // Step 2: decode.
 let request = match decode_request(request_der) {
 Ok(r) => r,
 Err(_) => return error_outcome(ResponseStatus::MalformedRequest),
 };

 // Step 1 (list-length bound) and step 3 (version).
 if request.requests.len() > config.max_request_list_length {
 return error_outcome(ResponseStatus::MalformedRequest);
 }
 if request.version != 0 {
 return error_outcome(ResponseStatus::MalformedRequest);
 }

 // Step 4: signed-request verification.
 if config.require_signed_request {
 if let Err(err) = verify_request_signature(&request) {
 tracing::warn!(error = %err, "ocsp request signature check failed");
 return error_outcome(ResponseStatus::SigRequired);
 }
 }

 // Steps 5-7: resolve each CertID in request order.
 let this_update = now;
 let mut responses = Vec::with_capacity(request.requests.len());
 for cert_id in &request.requests {
 match resolve_single(cert_id, issuer_table, cert_store, config, this_update, next_update).await {
 Ok(single) => responses.push(single),
 Err(e) if e.kind() == crate::errors::CaErrorKind::NotPermitted => {
 return error_outcome(ResponseStatus::Unauthorized)
 }
 Err(_) => return error_outcome(ResponseStatus::InternalError),
 }
 }

 // Step 8: nonce.
 let mut response_extensions_der = None;
 if honor_nonce {
 if let Some(nonce) = &request_nonce {
 if nonce.value.len() < config.nonce_min_len || nonce.value.len() > config.nonce_max_len {
 return error_outcome(ResponseStatus::MalformedRequest);
 }
 response_extensions_der = Some(encode_nonce_extension(&nonce.value));
 }
 }

 let tbs = encode_response_data(responder_id_der, now, &responses, response_extensions_der.as_deref());

 // Step 9: sign.
 let signature = match signer_pool.borrow(Some(BORROW_DEADLINE)) {
 Ok(mut signer) => match signer.sign(&tbs) {
 Ok(sig) => sig,
 Err(_) => return error_outcome(ResponseStatus::InternalError),
 },
 Err(e) if e.kind() == crate::errors::CaErrorKind::NoIdleSigner => {
 return error_outcome(ResponseStatus::TryLater)
 }
 Err(_) => return error_outcome(ResponseStatus::InternalError),
 };

 let der = encode_successful_response(&tbs, signature_algorithm_oid, &signature);

 let ttl_cap = now + chrono::Duration::seconds(config.responder_max_cache_age_seconds);
 let expires_at = next_update.map(|n| n.min(ttl_cap)).unwrap_or(ttl_cap);
 cache.put(request_der, responder_key_id, der.clone(), expires_at);

 tracing::info!(responses = responses.len(), "ocsp response served");
 OcspOutcome { der, status: ResponseStatus::Successful }
}

/// Helper for callers that already have the responder's raw public-key
/// bytes: build the `[2] KeyHash` `ResponderID` this responder always uses.
pub fn responder_id_for_key(public_key: &[u8]) -> (Vec<u8>, Vec<u8>) {
 let key_hash = HashAlgorithm::Sha1.digest(public_key);
 (encode_responder_id_by_key_hash(&key_hash), key_hash)
}

#[cfg(test)]
mod tests {
 use super::*;
 use crate::asn1::cert::decode as decode_cert;
 use crate::asn1::der::tag as dtag;
 use crate::asn1::encode::{encode_integer, encode_sequence, encode_tlv};
 use crate::asn1::name::{encode_name, encode_oid, AttributeTypeAndValue, OID_O};
 use crate::issuer_identity::IssuerIdentityEntry;
 use crate::store::cert_store::mock::MockCertStore;
 use crate::store::models::CertRow;
 use ed25519_dalek::{Signer as _, SigningKey};

 fn build_ca_cert(pubkey: &[u8; 32]) -> Vec<u8> {
 let issuer = crate::asn1::name::Name {
 rdns: vec![vec![AttributeTypeAndValue { oid: OID_O.into(), value: "Acme Root".into() }]],
 };
 let mut alg = encode_oid("1.3.101.112");
 alg.extend(encode_tlv(dtag::NULL, &[]));
 let alg_der = encode_sequence(&alg);
 let mut bit_string_content = vec![0u8];
 bit_string_content.extend_from_slice(pubkey);
 let spki_der = encode_sequence(&[alg_der.clone(), encode_tlv(dtag::BIT_STRING, &bit_string_content)].concat());
 let validity_der = encode_sequence(
 &[
 encode_tlv(dtag::GENERALIZED_TIME, b"20260101000000Z"),
 encode_tlv(dtag::GENERALIZED_TIME, b"20270101000000Z"),
 ]
.concat(),
 );
 let tbs_body = [
 encode_integer(&[0x01]),
 alg_der.clone(),
 encode_name(&issuer),
 validity_der,
 encode_name(&issuer),
 spki_der,
 ]
.concat();
 let tbs_der = encode_sequence(&tbs_body);
 let mut sig_content = vec![0u8];
 sig_content.extend_from_slice(&[0xEE; 64]);
 let sig_bit_string = encode_tlv(dtag::BIT_STRING, &sig_content);
 encode_sequence(&[tbs_der, alg_der, sig_bit_string].concat())
 }

 fn build_request(alg_oid: &str, name_hash: &[u8], key_hash: &[u8], serial: &[u8]) -> Vec<u8> {
 let mut alg = encode_oid(alg_oid);
 alg.extend(encode_tlv(dtag::NULL, &[]));
 let alg_der = encode_sequence(&alg);
 let cert_id = encode_sequence(
 &[
 alg_der,
 encode_tlv(dtag::OCTET_STRING, name_hash),
 encode_tlv(dtag::OCTET_STRING, key_hash),
 encode_integer(serial),
 ]
.concat(),
 );
 let request_list = encode_sequence(&encode_sequence(&cert_id));
 let tbs = encode_sequence(&request_list);
 encode_sequence(&tbs)
 }

 fn good_cert_row(ca_id: i32, serial_hex: &str) -> CertRow {
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

 struct TestSigner(SigningKey);
 impl Signer for TestSigner {
 fn algorithm(&self) -> crate::hash::SignatureAlgorithm {
 crate::hash::SignatureAlgorithm::Ed25519
 }
 fn sign(&mut self, message: &[u8]) -> Result<Vec<u8>, CaError> {
 Ok(self.0.sign(message).to_bytes().to_vec())
 }
 fn public_key(&self) -> Vec<u8> {
 self.0.verifying_key().as_bytes().to_vec()
 }
 }

 #[tokio::test]
 async fn good_cert_yields_successful_response_s2() {
 let pubkey = [0x11u8; 32];
 let cert_der = build_ca_cert(&pubkey);
 let cert = decode_cert(&cert_der).unwrap();

 let mut table = IssuerIdentityTable::new();
 table.insert(IssuerIdentityEntry::from_certificate(1, &cert));

 let name_hash = HashAlgorithm::Sha256.digest(&cert.issuer_der);
 let key_hash = HashAlgorithm::Sha256.digest(&cert.spki.public_key);
 let request_der = build_request("2.16.840.1.101.3.4.2.1", &name_hash, &key_hash, &[0x2a]);

 let store = MockCertStore::new(vec![good_cert_row(1, "2a")]);
 let signing_key = SigningKey::from_bytes(&[0x09; 32]);
 let responder_key = signing_key.verifying_key().to_bytes().to_vec();
 let pool: SignerPool<Box<dyn Signer>> = SignerPool::new("ocsp", vec![Box::new(TestSigner(signing_key)) as Box<dyn Signer>]);
 let (responder_id_der, responder_key_id) = responder_id_for_key(&responder_key);
 let cache = OcspCache::new();

 let outcome = handle_request(
 &request_der,
 &OcspConfig::default(),
 &table,
 &store,
 &pool,
 &cache,
 &responder_id_der,
 &responder_key_id,
 "1.3.101.112",
 None,
 None,
 false,
 )
.await;

 assert_eq!(outcome.status, ResponseStatus::Successful);
 assert_eq!(outcome.der[0], dtag::SEQUENCE);
 }

 #[tokio::test]
 async fn unknown_issuer_returns_unauthorized_status() {
 let table = IssuerIdentityTable::new();
 let request_der = build_request("1.3.14.3.2.26", &[0xAA; 20], &[0xBB; 20], &[0x2a]);
 let store = MockCertStore::new(vec![]);
 let signing_key = SigningKey::from_bytes(&[0x0A; 32]);
 let pool: SignerPool<Box<dyn Signer>> = SignerPool::new("ocsp", vec![Box::new(TestSigner(signing_key)) as Box<dyn Signer>]);
 let cache = OcspCache::new();

 let outcome = handle_request(
 &request_der,
 &OcspConfig::default(),
 &table,
 &store,
 &pool,
 &cache,
 &[],
 &[],
 "1.3.101.112",
 None,
 None,
 false,
 )
.await;

 assert_eq!(outcome.status, ResponseStatus::Unauthorized);
 }

 #[tokio::test]
 async fn oversized_request_is_rejected_as_malformed() {
 let table = IssuerIdentityTable::new();
 let store = MockCertStore::new(vec![]);
 let signing_key = SigningKey::from_bytes(&[0x0B; 32]);
 let pool: SignerPool<Box<dyn Signer>> = SignerPool::new("ocsp", vec![Box::new(TestSigner(signing_key)) as Box<dyn Signer>]);
 let cache = OcspCache::new();
 let mut config = OcspConfig::default();
 config.max_request_size_bytes = 4;

 let outcome = handle_request(
 &[0u8; 64],
 &config,
 &table,
 &store,
 &pool,
 &cache,
 &[],
 &[],
 "1.3.101.112",
 None,
 None,
 false,
 )
.await;

 assert_eq!(outcome.status, ResponseStatus::MalformedRequest);
 }

 #[tokio::test]
 async fn second_identical_request_is_served_from_cache() {
 let pubkey = [0x33u8; 32];
 let cert_der = build_ca_cert(&pubkey);
 let cert = decode_cert(&cert_der).unwrap();
 let mut table = IssuerIdentityTable::new();
 table.insert(IssuerIdentityEntry::from_certificate(1, &cert));

 let name_hash = HashAlgorithm::Sha1.digest(&cert.issuer_der);
 let key_hash = HashAlgorithm::Sha1.digest(&cert.spki.public_key);
 let request_der = build_request("1.3.14.3.2.26", &name_hash, &key_hash, &[0x2a]);

 let store = MockCertStore::new(vec![good_cert_row(1, "2a")]);
 let signing_key = SigningKey::from_bytes(&[0x0C; 32]);
 // Only one signer: if the cache is not hit, the second call would
 // still succeed (signer returned after first call), so instead we
 // assert the two responses are byte-identical, which would not
 // hold if produced_at differed between two independent signings.
 let pool: SignerPool<Box<dyn Signer>> = SignerPool::new("ocsp", vec![Box::new(TestSigner(signing_key)) as Box<dyn Signer>]);
 let cache = OcspCache::new();

 let first = handle_request(
 &request_der,
 &OcspConfig::default(),
 &table,
 &store,
 &pool,
 &cache,
 &[],
 &[],
 "1.3.101.112",
 None,
 None,
 false,
 )
.await;
 let second = handle_request(
 &request_der,
 &OcspConfig::default(),
 &table,
 &store,
 &pool,
 &cache,
 &[],
 &[],
 "1.3.101.112",
 None,
 None,
 false,
 )
.await;

 assert_eq!(first.der, second.der);
 }
}
