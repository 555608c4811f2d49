//! Named hash algorithms and signature algorithm identifiers.
//!
//! Mirrors the spirit of `security::crypto::hash_data` in shape (thin
//! wrappers over RustCrypto digests) but is keyed by OID so the rest of the
//! core can go from wire bytes to an algorithm and back.

use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use sha3::{Sha3_224, Sha3_256, Sha3_384, Sha3_512, Shake128, Shake256};
use sha3::digest::{ExtendableOutput, Update, XofReader};
use sm3::Sm3;

/// A hash algorithm recognized by CertID matching and signature verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
 Sha1,
 Sha224,
 Sha256,
 Sha384,
 Sha512,
 Sha3_224,
 Sha3_256,
 Sha3_384,
 Sha3_512,
 Shake128,
 Shake256,
 Sm3,
}

impl HashAlgorithm {
 /// Output length in bytes. SHAKE128/256 are used at their conventional
 /// security-matching output lengths (32 / 64 bytes) for CertID hashing.
 pub fn output_len(self) -> usize {
 match self {
 HashAlgorithm::Sha1 => 20,
 HashAlgorithm::Sha224 => 28,
 HashAlgorithm::Sha256 => 32,
 HashAlgorithm::Sha384 => 48,
 HashAlgorithm::Sha512 => 64,
 HashAlgorithm::Sha3_224 => 28,
 HashAlgorithm::Sha3_256 => 32,
 HashAlgorithm::Sha3_384 => 48,
 HashAlgorithm::Sha3_512 => 64,
 HashAlgorithm::Shake128 => 32,
 HashAlgorithm::Shake256 => 64,
 HashAlgorithm::Sm3 => 32,
 }
 }

 /// Dotted-decimal OID string for this hash algorithm.
 pub fn oid(self) -> &'static str {
 match self {
 HashAlgorithm::Sha1 => "1.3.14.3.2.26",
 HashAlgorithm::Sha224 => "2.16.840.1.101.3.4.2.4",
 HashAlgorithm::Sha256 => "2.16.840.1.101.3.4.2.1",
 HashAlgorithm::Sha384 => "2.16.840.1.101.3.4.2.2",
 HashAlgorithm::Sha512 => "2.16.840.1.101.3.4.2.3",
 HashAlgorithm::Sha3_224 => "2.16.840.1.101.3.4.2.7",
 HashAlgorithm::Sha3_256 => "2.16.840.1.101.3.4.2.8",
 HashAlgorithm::Sha3_384 => "2.16.840.1.101.3.4.2.9",
 HashAlgorithm::Sha3_512 => "2.16.840.1.101.3.4.2.10",
 HashAlgorithm::Shake128 => "2.16.840.1.101.3.4.2.11",
 HashAlgorithm::Shake256 => "2.16.840.1.101.3.4.2.12",
 HashAlgorithm::Sm3 => "1.2.156.10197.1.401",
 }
 }

 pub fn from_oid(oid: &str) -> Option<Self> {
 [
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
 ]
.into_iter()
.find(|alg| alg.oid() == oid)
 }

 /// Digest `data`, returning exactly `output_len()` bytes.
 pub fn digest(self, data: &[u8]) -> Vec<u8> {
 match self {
 HashAlgorithm::Sha1 => {
 use sha1::{Digest as _, Sha1};
 Sha1::digest(data).to_vec()
 }
 HashAlgorithm::Sha224 => Sha224::digest(data).to_vec(),
 HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
 HashAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
 HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
 HashAlgorithm::Sha3_224 => Sha3_224::digest(data).to_vec(),
 HashAlgorithm::Sha3_256 => Sha3_256::digest(data).to_vec(),
 HashAlgorithm::Sha3_384 => Sha3_384::digest(data).to_vec(),
 HashAlgorithm::Sha3_512 => Sha3_512::digest(data).to_vec(),
 HashAlgorithm::Shake128 => {
 let mut hasher = Shake128::default();
 hasher.update(data);
 let mut out = vec![0u8; self.output_len()];
 hasher.finalize_xof().read(&mut out);
 out
 }
 HashAlgorithm::Shake256 => {
 let mut hasher = Shake256::default();
 hasher.update(data);
 let mut out = vec![0u8; self.output_len()];
 hasher.finalize_xof().read(&mut out);
 out
 }
 HashAlgorithm::Sm3 => Sm3::digest(data).to_vec(),
 }
 }
}

/// A signature algorithm, keyed by OID, used both for CSR/POP verification
/// and for the CA's issuance/CRL/OCSP signers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
 Ed25519,
 RsaPkcs1(HashAlgorithm),
 EcdsaP256(HashAlgorithm),
 EcdsaP384(HashAlgorithm),
 /// Diffie-Hellman proof-of-possession per RFC 6955 static-DH.
 DhPopX25519Sha256,
 DhPopX448Sha512,
}

impl SignatureAlgorithm {
 pub fn oid(self) -> &'static str {
 match self {
 SignatureAlgorithm::Ed25519 => "1.3.101.112",
 SignatureAlgorithm::RsaPkcs1(HashAlgorithm::Sha256) => "1.2.840.113549.1.1.11",
 SignatureAlgorithm::RsaPkcs1(HashAlgorithm::Sha384) => "1.2.840.113549.1.1.12",
 SignatureAlgorithm::RsaPkcs1(HashAlgorithm::Sha512) => "1.2.840.113549.1.1.13",
 SignatureAlgorithm::RsaPkcs1(_) => "1.2.840.113549.1.1.11",
 SignatureAlgorithm::EcdsaP256(_) => "1.2.840.10045.4.3.2",
 SignatureAlgorithm::EcdsaP384(_) => "1.2.840.10045.4.3.3",
 SignatureAlgorithm::DhPopX25519Sha256 => "1.3.101.110",
 SignatureAlgorithm::DhPopX448Sha512 => "1.3.101.111",
 }
 }

 /// Map a signature-algorithm OID (as carried by a CSR or a stored
 /// profile row) back to a `SignatureAlgorithm`. RSA OIDs resolve to
 /// their matching hash; OIDs with no RSA-hash correspondence fall back
 /// to SHA-256.
 pub fn from_oid(oid: &str) -> Option<Self> {
 Some(match oid {
 "1.3.101.112" => SignatureAlgorithm::Ed25519,
 "1.2.840.113549.1.1.11" => SignatureAlgorithm::RsaPkcs1(HashAlgorithm::Sha256),
 "1.2.840.113549.1.1.12" => SignatureAlgorithm::RsaPkcs1(HashAlgorithm::Sha384),
 "1.2.840.113549.1.1.13" => SignatureAlgorithm::RsaPkcs1(HashAlgorithm::Sha512),
 "1.2.840.10045.4.3.2" => SignatureAlgorithm::EcdsaP256(HashAlgorithm::Sha256),
 "1.2.840.10045.4.3.3" => SignatureAlgorithm::EcdsaP384(HashAlgorithm::Sha384),
 "1.3.101.110" => SignatureAlgorithm::DhPopX25519Sha256,
 "1.3.101.111" => SignatureAlgorithm::DhPopX448Sha512,
 _ => return None,
 })
 }
}

#[cfg(test)]
mod tests {
 use super::*;

 #[test]
 fn signature_alg_round_trips_through_oid() {
 for alg in [
 SignatureAlgorithm::Ed25519,
 SignatureAlgorithm::RsaPkcs1(HashAlgorithm::Sha256),
 SignatureAlgorithm::EcdsaP256(HashAlgorithm::Sha256),
 SignatureAlgorithm::EcdsaP384(HashAlgorithm::Sha384),
 SignatureAlgorithm::DhPopX25519Sha256,
 ] {
 assert_eq!(SignatureAlgorithm::from_oid(alg.oid()), Some(alg));
 }
 assert_eq!(SignatureAlgorithm::from_oid("9.9.9"), None);
 }

 #[test]
 fn hash_alg_round_trips_through_oid() {
 for alg in [
 HashAlgorithm::Sha1,
 HashAlgorithm::Sha256,
 HashAlgorithm::Sha3_256,
 HashAlgorithm::Shake128,
 HashAlgorithm::Sm3,
 ] {
 assert_eq!(HashAlgorithm::from_oid(alg.oid()), Some(alg));
 }
 }

 #[test]
 fn digest_lengths_match_output_len() {
 for alg in [
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
 ] {
 assert_eq!(alg.digest(b"hello world").len(), alg.output_len());
 }
 }
}
