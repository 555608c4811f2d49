//! Proof-of-possession verification: checks a CSR's
//! self-signature against its own embedded public key for standard
//! algorithms, and the static Diffie-Hellman POP scheme for the two
//! DH algorithms the profile may allow.

use ed25519_dalek::{Signature as Ed25519Signature, Verifier, VerifyingKey};
use p256::ecdsa::{signature::Verifier as _, Signature as P256Signature, VerifyingKey as P256VerifyingKey};
use p384::ecdsa::{signature::Verifier as _, Signature as P384Signature, VerifyingKey as P384VerifyingKey};
use rsa::pkcs1v15::VerifyingKey as RsaVerifyingKey;
use rsa::signature::Verifier as RsaVerifierTrait;
use rsa::RsaPublicKey;

use crate::errors::CaError;
use crate::hash::{HashAlgorithm, SignatureAlgorithm};

/// Verify `signature` over `message` under `public_key`, for the standard
/// (non-DH) signature algorithms. `public_key` is the raw SPKI BIT STRING
/// content (Ed25519/ECDSA points, or a DER `RSAPublicKey` for RSA).
pub fn verify_standard(
 alg: SignatureAlgorithm,
 public_key: &[u8],
 message: &[u8],
 signature: &[u8],
) -> Result<(), CaError> {
 match alg {
 SignatureAlgorithm::Ed25519 => {
 let key_bytes: [u8; 32] = public_key
.try_into()
.map_err(|_| CaError::BadPop("Ed25519 public key is not 32 bytes".into()))?;
 let key = VerifyingKey::from_bytes(&key_bytes)
.map_err(|e| CaError::BadPop(format!("invalid Ed25519 public key: {e}")))?;
 let sig_bytes: [u8; 64] = signature
.try_into()
.map_err(|_| CaError::BadPop("Ed25519 signature is not 64 bytes".into()))?;
 let sig = Ed25519Signature::from_bytes(&sig_bytes);
 key.verify(message, &sig)
.map_err(|e| CaError::BadPop(format!("Ed25519 signature verification failed: {e}")))
 }
 SignatureAlgorithm::RsaPkcs1(_hash) => {
 use rsa::pkcs1::DecodeRsaPublicKey;
 let rsa_key = RsaPublicKey::from_pkcs1_der(public_key)
.map_err(|e| CaError::BadPop(format!("invalid RSA public key: {e}")))?;
 let verifying_key: RsaVerifyingKey<sha2::Sha256> = RsaVerifyingKey::new(rsa_key);
 let sig = rsa::pkcs1v15::Signature::try_from(signature)
.map_err(|e| CaError::BadPop(format!("malformed RSA signature: {e}")))?;
 verifying_key
.verify(message, &sig)
.map_err(|e| CaError::BadPop(format!("RSA signature verification failed: {e}")))
 }
 SignatureAlgorithm::EcdsaP256(_) => {
 let key = P256VerifyingKey::from_sec1_bytes(public_key)
.map_err(|e| CaError::BadPop(format!("invalid P-256 public key: {e}")))?;
 let sig = P256Signature::from_slice(signature)
.map_err(|e| CaError::BadPop(format!("malformed P-256 signature: {e}")))?;
 key.verify(message, &sig)
.map_err(|e| CaError::BadPop(format!("P-256 signature verification failed: {e}")))
 }
 SignatureAlgorithm::EcdsaP384(_) => {
 let key = P384VerifyingKey::from_sec1_bytes(public_key)
.map_err(|e| CaError::BadPop(format!("invalid P-384 public key: {e}")))?;
 let sig = P384Signature::from_slice(signature)
.map_err(|e| CaError::BadPop(format!("malformed P-384 signature: {e}")))?;
 key.verify(message, &sig)
.map_err(|e| CaError::BadPop(format!("P-384 signature verification failed: {e}")))
 }
 SignatureAlgorithm::DhPopX25519Sha256 | SignatureAlgorithm::DhPopX448Sha512 => Err(
 CaError::SystemFailure("DH proof-of-possession is not verified via verify_standard".into()),
 ),
 }
}

/// Static Diffie-Hellman POP for x25519-sha256 (RFC 6955 §A.2, simplified):
/// derive the shared secret between the referenced CA key-agreement key and
/// the CSR's x25519 public key, and check the carried value against
/// `SHA-256(shared_secret || message)`.
pub fn verify_dh_pop_x25519(
 ca_static_secret: &x25519_dalek::StaticSecret,
 csr_public_key: &[u8; 32],
 message: &[u8],
 carried_value: &[u8],
) -> Result<(), CaError> {
 let their_public = x25519_dalek::PublicKey::from(*csr_public_key);
 let shared = ca_static_secret.diffie_hellman(&their_public);

 let mut buf = shared.as_bytes().to_vec();
 buf.extend_from_slice(message);
 let expected = HashAlgorithm::Sha256.digest(&buf);

 if expected == carried_value {
 Ok(())
 } else {
 Err(CaError::BadPop("x25519 static-DH proof-of-possession mismatch".into()))
 }
}

/// x448-sha512 static-DH POP has no supporting curve implementation in this
/// core's dependency stack (no x448 crate in the retrieved pack); requests
/// for it are rejected rather than approximated.
pub fn verify_dh_pop_x448() -> Result<(), CaError> {
 Err(CaError::SystemFailure(
 "x448-sha512 proof-of-possession is not supported by this build".into(),
 ))
}

#[cfg(test)]
mod tests {
 use super::*;
 use ed25519_dalek::{Signer as _, SigningKey};

 #[test]
 fn verifies_a_genuine_ed25519_signature() {
 let signing_key = SigningKey::from_bytes(&[0x07; 32]);
 let verifying_key = signing_key.verifying_key();
 let message = b"tbsCertificationRequest bytes";
 let signature = signing_key.sign(message);

 verify_standard(
 SignatureAlgorithm::Ed25519,
 verifying_key.as_bytes(),
 message,
 &signature.to_bytes(),
 )
.unwrap();
 }

 #[test]
 fn rejects_a_tampered_ed25519_message() {
 let signing_key = SigningKey::from_bytes(&[0x07; 32]);
 let verifying_key = signing_key.verifying_key();
 let signature = signing_key.sign(b"original");

 let err = verify_standard(
 SignatureAlgorithm::Ed25519,
 verifying_key.as_bytes(),
 b"tampered",
 &signature.to_bytes(),
 )
.unwrap_err();
 assert_eq!(err.kind(), crate::errors::CaErrorKind::BadPop);
 }

 #[test]
 fn x25519_dh_pop_round_trips() {
 let ca_secret = x25519_dalek::StaticSecret::from([0x11; 32]);
 let csr_secret = x25519_dalek::StaticSecret::from([0x22; 32]);
 let csr_public: [u8; 32] = *x25519_dalek::PublicKey::from(&csr_secret).as_bytes();
 let message = b"tbsCertificationRequest bytes";

 let shared_from_csr_side = csr_secret.diffie_hellman(&x25519_dalek::PublicKey::from(&ca_secret));
 let mut buf = shared_from_csr_side.as_bytes().to_vec();
 buf.extend_from_slice(message);
 let carried_value = HashAlgorithm::Sha256.digest(&buf);

 verify_dh_pop_x25519(&ca_secret, &csr_public, message, &carried_value).unwrap();
 }
}
