//! Bounded signer pools: a CA or MAC key owns a fixed set of
//! pre-built signer instances; callers borrow one, sign, and return it.
//! Signers are not individually thread-safe, so the pool — not the
//! signer — is what's shared across the issuance pipeline, CRL generator,
//! and OCSP responder.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use ed25519_dalek::{Signer as _, SigningKey};
use p256::ecdsa::{Signature as P256Signature, SigningKey as P256SigningKey};
use p384::ecdsa::{Signature as P384Signature, SigningKey as P384SigningKey};
use rsa::pkcs1v15::SigningKey as RsaSigningKey;
use rsa::RsaPrivateKey;
use signature::{RandomizedSigner, Signer as _, SignatureEncoding};

use crate::errors::CaError;
use crate::hash::{HashAlgorithm, SignatureAlgorithm};

pub mod verify;

/// A prepared, stateful signer instance. Not `Send` between concurrent
/// callers while borrowed — the pool enforces exclusive use.
pub trait Signer: Send {
 fn algorithm(&self) -> SignatureAlgorithm;
 fn sign(&mut self, message: &[u8]) -> Result<Vec<u8>, CaError>;
 /// The raw `subjectPublicKeyInfo.subjectPublicKey` content this signer
 /// corresponds to (unused-bits byte already stripped), in the same
 /// encoding [`crate::issuance::pipeline::canonicalize_spki`] produces
 /// for a CSR's key. Symmetric signers have no public key and return an
 /// empty vector.
 fn public_key(&self) -> Vec<u8>;
}

pub struct Ed25519Signer {
 key: SigningKey,
}

impl Ed25519Signer {
 pub fn new(key: SigningKey) -> Self {
 Self { key }
 }
}

impl Signer for Ed25519Signer {
 fn algorithm(&self) -> SignatureAlgorithm {
 SignatureAlgorithm::Ed25519
 }

 fn sign(&mut self, message: &[u8]) -> Result<Vec<u8>, CaError> {
 Ok(self.key.sign(message).to_bytes().to_vec())
 }

 fn public_key(&self) -> Vec<u8> {
 self.key.verifying_key().as_bytes().to_vec()
 }
}

pub struct RsaPkcs1Signer {
 key: RsaPrivateKey,
 hash: HashAlgorithm,
}

impl RsaPkcs1Signer {
 pub fn new(key: RsaPrivateKey, hash: HashAlgorithm) -> Self {
 Self { key, hash }
 }
}

impl Signer for RsaPkcs1Signer {
 fn algorithm(&self) -> SignatureAlgorithm {
 SignatureAlgorithm::RsaPkcs1(self.hash)
 }

 fn sign(&mut self, message: &[u8]) -> Result<Vec<u8>, CaError> {
 let digest = self.hash.digest(message);
 let signing_key: RsaSigningKey<sha2::Sha256> = RsaSigningKey::new(self.key.clone());
 let signature = signing_key
.try_sign_with_rng(&mut rand::thread_rng(), &digest)
.map_err(|e| CaError::SystemFailure(format!("RSA signing failed: {e}")))?;
 Ok(signature.to_vec())
 }

 fn public_key(&self) -> Vec<u8> {
 use rsa::pkcs1::EncodeRsaPublicKey;
 self.key
.to_public_key()
.to_pkcs1_der()
.map(|der| der.as_bytes().to_vec())
.unwrap_or_default()
 }
}

pub struct EcdsaP256Signer {
 key: P256SigningKey,
 hash: HashAlgorithm,
}

impl EcdsaP256Signer {
 pub fn new(key: P256SigningKey, hash: HashAlgorithm) -> Self {
 Self { key, hash }
 }
}

impl Signer for EcdsaP256Signer {
 fn algorithm(&self) -> SignatureAlgorithm {
 SignatureAlgorithm::EcdsaP256(self.hash)
 }

 fn sign(&mut self, message: &[u8]) -> Result<Vec<u8>, CaError> {
 let signature: P256Signature = self.key.sign(message);
 Ok(signature.to_bytes().to_vec())
 }

 fn public_key(&self) -> Vec<u8> {
 use p256::elliptic_curve::sec1::ToEncodedPoint;
 self.key.verifying_key().to_encoded_point(false).as_bytes().to_vec()
 }
}

pub struct EcdsaP384Signer {
 key: P384SigningKey,
 hash: HashAlgorithm,
}

impl EcdsaP384Signer {
 pub fn new(key: P384SigningKey, hash: HashAlgorithm) -> Self {
 Self { key, hash }
 }
}

impl Signer for EcdsaP384Signer {
 fn algorithm(&self) -> SignatureAlgorithm {
 SignatureAlgorithm::EcdsaP384(self.hash)
 }

 fn sign(&mut self, message: &[u8]) -> Result<Vec<u8>, CaError> {
 let signature: P384Signature = self.key.sign(message);
 Ok(signature.to_bytes().to_vec())
 }

 fn public_key(&self) -> Vec<u8> {
 use p384::elliptic_curve::sec1::ToEncodedPoint;
 self.key.verifying_key().to_encoded_point(false).as_bytes().to_vec()
 }
}

/// A MAC-backed signer over a symmetric key, used for CAs whose "signature"
/// is a keyed digest rather than an asymmetric scheme. Carries the SHA-1
/// digest of the key bytes for use as a subject-key-identifier.
pub struct MacSigner {
 key: Vec<u8>,
 hash: HashAlgorithm,
 key_ski: Vec<u8>,
}

impl MacSigner {
 pub fn new(key: Vec<u8>, hash: HashAlgorithm) -> Self {
 let key_ski = HashAlgorithm::Sha1.digest(&key);
 Self { key, hash, key_ski }
 }

 /// SHA-1 digest of the raw key bytes, for the subject-key-identifier
 /// extension on certificates whose issuer key is symmetric.
 pub fn key_ski(&self) -> &[u8] {
 &self.key_ski
 }
}

impl Signer for MacSigner {
 fn algorithm(&self) -> SignatureAlgorithm {
 SignatureAlgorithm::RsaPkcs1(self.hash)
 }

 fn sign(&mut self, message: &[u8]) -> Result<Vec<u8>, CaError> {
 let mut buf = self.key.clone();
 buf.extend_from_slice(message);
 Ok(self.hash.digest(&buf))
 }

 /// Symmetric key, no public counterpart. An empty vector so a
 /// self-signed-root equality check against a CSR's SPKI is always a
 /// mismatch for a MAC-backed issuer, rather than a false match.
 fn public_key(&self) -> Vec<u8> {
 Vec::new()
 }
}

struct PoolInner<T> {
 idle: Mutex<VecDeque<T>>,
 condvar: Condvar,
 capacity: usize,
 label: String,
}

/// A bounded pool of `N` independently initialized signer instances for one
/// key and algorithm. `borrow` blocks up to an optional deadline; on
/// timeout, or with a zero deadline, it fails with `CaErrorKind::NoIdleSigner`.
#[derive(Clone)]
pub struct SignerPool<T> {
 inner: Arc<PoolInner<T>>,
}

/// An RAII handle: returns its signer to the pool on drop, guaranteeing
/// release on every exit path including early returns and panics.
pub struct PooledSigner<T> {
 signer: Option<T>,
 pool: SignerPool<T>,
}

impl<T> std::ops::Deref for PooledSigner<T> {
 type Target = T;
 fn deref(&self) -> &T {
 self.signer.as_ref().expect("signer taken before drop")
 }
}

impl<T> std::ops::DerefMut for PooledSigner<T> {
 fn deref_mut(&mut self) -> &mut T {
 self.signer.as_mut().expect("signer taken before drop")
 }
}

impl<T> Drop for PooledSigner<T> {
 fn drop(&mut self) {
 if let Some(signer) = self.signer.take() {
 self.pool.return_signer(signer);
 }
 }
}

impl<T> SignerPool<T> {
 pub fn new(label: impl Into<String>, signers: Vec<T>) -> Self {
 let capacity = signers.len();
 Self {
 inner: Arc::new(PoolInner {
 idle: Mutex::new(signers.into_iter().collect()),
 condvar: Condvar::new(),
 capacity,
 label: label.into(),
 }),
 }
 }

 pub fn size(&self) -> usize {
 self.inner.capacity
 }

 /// Borrow a signer, waiting up to `deadline` (or indefinitely if
 /// `None`, or not at all if `Some(Duration::ZERO)`) for one to become
 /// idle.
 pub fn borrow(&self, deadline: Option<Duration>) -> Result<PooledSigner<T>, CaError> {
 let mut idle = self.inner.idle.lock().expect("signer pool mutex poisoned");
 if let Some(signer) = idle.pop_front() {
 return Ok(self.wrap(signer));
 }

 match deadline {
 Some(d) if d.is_zero() => Err(CaError::NoIdleSigner(self.inner.label.clone())),
 Some(d) => {
 let deadline_at = Instant::now() + d;
 loop {
 let remaining = deadline_at.saturating_duration_since(Instant::now());
 if remaining.is_zero() {
 return Err(CaError::NoIdleSigner(self.inner.label.clone()));
 }
 let (guard, timeout) = self
.inner
.condvar
.wait_timeout(idle, remaining)
.expect("signer pool condvar poisoned");
 idle = guard;
 if let Some(signer) = idle.pop_front() {
 return Ok(self.wrap(signer));
 }
 if timeout.timed_out() {
 return Err(CaError::NoIdleSigner(self.inner.label.clone()));
 }
 }
 }
 None => loop {
 idle = self
.inner
.condvar
.wait(idle)
.expect("signer pool condvar poisoned");
 if let Some(signer) = idle.pop_front() {
 return Ok(self.wrap(signer));
 }
 },
 }
 }

 fn wrap(&self, signer: T) -> PooledSigner<T> {
 PooledSigner {
 signer: Some(signer),
 pool: self.clone(),
 }
 }

 fn return_signer(&self, signer: T) {
 let mut idle = self.inner.idle.lock().expect("signer pool mutex poisoned");
 idle.push_back(signer);
 self.inner.condvar.notify_one();
 }
}

#[cfg(test)]
mod tests {
 use super::*;

 struct CountingSigner(u32);
 impl Signer for CountingSigner {
 fn algorithm(&self) -> SignatureAlgorithm {
 SignatureAlgorithm::Ed25519
 }
 fn sign(&mut self, _message: &[u8]) -> Result<Vec<u8>, CaError> {
 self.0 += 1;
 Ok(vec![self.0 as u8])
 }
 fn public_key(&self) -> Vec<u8> {
 Vec::new()
 }
 }

 #[test]
 fn zero_deadline_fails_when_all_borrowed() {
 let pool = SignerPool::new("test", vec![CountingSigner(0)]);
 let first = pool.borrow(Some(Duration::ZERO)).unwrap();
 let err = pool.borrow(Some(Duration::ZERO)).unwrap_err();
 assert_eq!(err.kind(), crate::errors::CaErrorKind::NoIdleSigner);
 drop(first);
 assert!(pool.borrow(Some(Duration::ZERO)).is_ok());
 }

 #[test]
 fn return_on_drop_makes_signer_available_again() {
 let pool = SignerPool::new("test", vec![CountingSigner(0), CountingSigner(0)]);
 assert_eq!(pool.size(), 2);
 {
 let _a = pool.borrow(None).unwrap();
 let _b = pool.borrow(None).unwrap();
 assert!(pool.borrow(Some(Duration::ZERO)).is_err());
 }
 assert!(pool.borrow(Some(Duration::ZERO)).is_ok());
 }

 #[test]
 fn blocking_borrow_unblocks_after_return() {
 use std::sync::Arc;
 use std::thread;

 let pool = Arc::new(SignerPool::new("test", vec![CountingSigner(0)]));
 let held = pool.borrow(None).unwrap();
 let waiter_pool = Arc::clone(&pool);
 let waiter = thread::spawn(move || waiter_pool.borrow(Some(Duration::from_secs(2))).is_ok());
 thread::sleep(Duration::from_millis(50));
 drop(held);
 assert!(waiter.join().unwrap());
 }

 #[test]
 fn mac_signer_exposes_sha1_key_ski() {
 let signer = MacSigner::new(b"shared-secret".to_vec(), HashAlgorithm::Sha256);
 assert_eq!(signer.key_ski().len(), 20);
 }
}
