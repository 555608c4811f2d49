//! Error types for the certificate authority core.

use thiserror::Error;

/// The kind of failure, independent of the human-readable message.
///
/// Callers match on `kind()` rather than on the `CaError` variant so that
/// OCSP/CRL/issuance boundaries can map failures to their own terminal
/// statuses without downcasting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaErrorKind {
 BadRequest,
 BadCertTemplate,
 BadPop,
 CertRevoked,
 CertUnrevoked,
 NotPermitted,
 CrlFailure,
 DatabaseFailure,
 SystemFailure,
 NoIdleSigner,
}

#[derive(Error, Debug)]
pub enum CaError {
 #[error("bad request: {0}")]
 BadRequest(String),

 #[error("bad certificate template: {0}")]
 BadCertTemplate(String),

 #[error("proof-of-possession failed: {0}")]
 BadPop(String),

 #[error("certificate already revoked: {0}")]
 CertRevoked(String),

 #[error("certificate not revoked: {0}")]
 CertUnrevoked(String),

 #[error("operation not permitted: {0}")]
 NotPermitted(String),

 #[error("CRL generation failed: {0}")]
 CrlFailure(String),

 #[error("database failure: {0}")]
 DatabaseFailure(String),

 #[error("internal invariant violated: {0}")]
 SystemFailure(String),

 #[error("ASN.1 decode error: {0}")]
 Decode(#[from] crate::asn1::DecodeError),

 #[error("no idle signer available for {0}")]
 NoIdleSigner(String),
}

impl CaError {
 pub fn kind(&self) -> CaErrorKind {
 match self {
 CaError::BadRequest(_) => CaErrorKind::BadRequest,
 CaError::BadCertTemplate(_) => CaErrorKind::BadCertTemplate,
 CaError::BadPop(_) => CaErrorKind::BadPop,
 CaError::CertRevoked(_) => CaErrorKind::CertRevoked,
 CaError::CertUnrevoked(_) => CaErrorKind::CertUnrevoked,
 CaError::NotPermitted(_) => CaErrorKind::NotPermitted,
 CaError::CrlFailure(_) => CaErrorKind::CrlFailure,
 CaError::DatabaseFailure(_) => CaErrorKind::DatabaseFailure,
 CaError::SystemFailure(_) => CaErrorKind::SystemFailure,
 CaError::Decode(_) => CaErrorKind::BadRequest,
 CaError::NoIdleSigner(_) => CaErrorKind::NoIdleSigner,
 }
 }

 pub fn database_failure(msg: impl Into<String>) -> Self {
 CaError::DatabaseFailure(msg.into())
 }

 pub fn system_failure(msg: impl Into<String>) -> Self {
 CaError::SystemFailure(msg.into())
 }
}

impl From<sqlx::Error> for CaError {
 fn from(e: sqlx::Error) -> Self {
 CaError::DatabaseFailure(e.to_string())
 }
}
