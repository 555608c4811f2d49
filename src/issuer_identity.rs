//! In-memory issuer-identity table: for each known CA,
//! pre-encoded `(nameHash || keyHash)` bytes per supported hash algorithm,
//! built once when the CA certificate is loaded and consulted read-only by
//! the OCSP responder on every request.

use std::collections::HashMap;

use crate::asn1::cert::Certificate;
use crate::hash::HashAlgorithm;

const SUPPORTED_HASH_ALGORITHMS: &[HashAlgorithm] = &[
 HashAlgorithm::Sha1,
 HashAlgorithm::Sha224,
 HashAlgorithm::Sha256,
 HashAlgorithm::Sha384,
 HashAlgorithm::Sha512,
 HashAlgorithm::Sha3_224,
 HashAlgorithm::Sha3_256,
 HashAlgorithm::Sha3_384,
 HashAlgorithm::Sha3_512,
 HashAlgorithm::Shake128,
 HashAlgorithm::Shake256,
 HashAlgorithm::Sm3,
];

/// One CA's precomputed `(nameHash || keyHash)` bytes, per hash algorithm.
#[derive(Debug, Clone)]
pub struct IssuerIdentityEntry {
 pub ca_id: i32,
 hashes: HashMap<HashAlgorithm, Vec<u8>>,
}

impl IssuerIdentityEntry {
 /// Build the entry from a decoded CA certificate: hashes the raw
 /// encoded issuer `Name` and the SPKI's BIT STRING content for every
 /// supported algorithm.
 pub fn from_certificate(ca_id: i32, cert: &Certificate) -> Self {
 let mut hashes = HashMap::new();
 for &alg in SUPPORTED_HASH_ALGORITHMS {
 let name_hash = alg.digest(&cert.issuer_der);
 let key_hash = alg.digest(&cert.spki.public_key);
 let mut combined = Vec::with_capacity(name_hash.len() + key_hash.len());
 combined.extend_from_slice(&name_hash);
 combined.extend_from_slice(&key_hash);
 hashes.insert(alg, combined);
 }
 Self { ca_id, hashes }
 }

 /// True iff `combined` (the request's `nameHash || keyHash`) matches
 /// this entry's precomputed bytes for `alg` byte-for-byte. An
 /// unsupported algorithm for this issuer returns false, never an error.
 pub fn match_hash(&self, alg: HashAlgorithm, combined: &[u8]) -> bool {
 self.hashes.get(&alg).map(|stored| stored.as_slice() == combined).unwrap_or(false)
 }
}

/// Maps every loaded CA's identity entry, keyed by CA id. Immutable once
/// built for a CA until its certificate changes.
#[derive(Debug, Clone, Default)]
pub struct IssuerIdentityTable {
 entries: HashMap<i32, IssuerIdentityEntry>,
}

impl IssuerIdentityTable {
 pub fn new() -> Self {
 Self::default()
 }

 pub fn insert(&mut self, entry: IssuerIdentityEntry) {
 self.entries.insert(entry.ca_id, entry);
 }

 /// Finds the (at most one) CA whose identity entry matches the
 /// request's declared hash algorithm and combined hash bytes.
 pub fn find_matching_ca(&self, alg: HashAlgorithm, combined: &[u8]) -> Option<i32> {
 self.entries
.values()
.find(|entry| entry.match_hash(alg, combined))
.map(|entry| entry.ca_id)
 }

 pub fn get(&self, ca_id: i32) -> Option<&IssuerIdentityEntry> {
 self.entries.get(&ca_id)
 }
}

#[cfg(test)]
mod tests {
 use super::*;
 use crate::asn1::cert::decode;
 use crate::asn1::encode::{encode_sequence, encode_tlv};
 use crate::asn1::name::{encode_name, encode_oid, AttributeTypeAndValue, OID_O};

 fn build_cert(pubkey: &[u8; 32]) -> Vec<u8> {
 use crate::asn1::der::tag as dtag;
 use crate::asn1::encode::encode_integer;

 let issuer = crate::asn1::name::Name {
 rdns: vec![vec![AttributeTypeAndValue { oid: OID_O.into(), value: "Acme Root".into() }]],
 };

 let mut alg = encode_oid("1.3.101.112");
 alg.extend(encode_tlv(dtag::NULL, &[]));
 let alg_der = encode_sequence(&alg);

 let mut bit_string_content = vec![0u8];
 bit_string_content.extend_from_slice(pubkey);
 let spki_body = [alg_der.clone(), encode_tlv(dtag::BIT_STRING, &bit_string_content)].concat();
 let spki_der = encode_sequence(&spki_body);

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
 sig_content.extend_from_slice(&[0xCC; 64]);
 let sig_bit_string = encode_tlv(dtag::BIT_STRING, &sig_content);
 encode_sequence(&[tbs_der, alg_der, sig_bit_string].concat())
 }

 #[test]
 fn match_hash_matches_sha256_and_rejects_wrong_bytes() {
 let pubkey = [0x42u8; 32];
 let cert = decode(&build_cert(&pubkey)).unwrap();
 let entry = IssuerIdentityEntry::from_certificate(1, &cert);

 let name_hash = HashAlgorithm::Sha256.digest(&cert.issuer_der);
 let key_hash = HashAlgorithm::Sha256.digest(&cert.spki.public_key);
 let combined = [name_hash, key_hash].concat();
 assert!(entry.match_hash(HashAlgorithm::Sha256, &combined));

 let mut wrong = combined.clone();
 wrong[0] ^= 0xFF;
 assert!(!entry.match_hash(HashAlgorithm::Sha256, &wrong));
 }

 #[test]
 fn table_finds_the_right_ca_among_several() {
 let cert_a = decode(&build_cert(&[0x11u8; 32])).unwrap();
 let cert_b = decode(&build_cert(&[0x22u8; 32])).unwrap();
 let mut table = IssuerIdentityTable::new();
 table.insert(IssuerIdentityEntry::from_certificate(1, &cert_a));
 table.insert(IssuerIdentityEntry::from_certificate(2, &cert_b));

 let name_hash = HashAlgorithm::Sha1.digest(&cert_b.issuer_der);
 let key_hash = HashAlgorithm::Sha1.digest(&cert_b.spki.public_key);
 let combined = [name_hash, key_hash].concat();
 assert_eq!(table.find_matching_ca(HashAlgorithm::Sha1, &combined), Some(2));
 }
}
