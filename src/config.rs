//! Layered configuration: defaults overridden by environment
//! variables under the `CASTELLAN_` prefix, loaded once at process start via
//! the `config` crate.

use serde::{Deserialize, Serialize};

use crate::errors::CaError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaConfig {
 pub database: DatabaseConfig,
 pub ocsp: OcspConfig,
 pub uid: UniqueIdSettings,
 pub logging: LoggingConfig,
 pub profiles: Vec<ProfileConfig>,
 pub cas: Vec<CaEntryConfig>,
 pub publishers: Vec<PublisherConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
 pub url: String,
 pub max_connections: u32,
 pub acquire_timeout_seconds: u64,
}

/// OCSP responder request bounds, cache policy, and unknown-issuer handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcspConfig {
 pub max_request_size_bytes: usize,
 pub max_request_list_length: usize,
 pub require_signed_request: bool,
 pub unknown_issuer_returns_unauthorized: bool,
 /// "non-issued is good" policy.
 pub non_issued_is_good: bool,
 pub nonce_min_len: usize,
 pub nonce_max_len: usize,
 pub responder_max_cache_age_seconds: i64,
}

/// Maps onto [`crate::uid::UniqueIdConfig`]; kept as a separate, serde-able
/// struct since the generator's own type carries no `Deserialize` impl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniqueIdSettings {
 pub shard_id: u8,
 pub epoch_base_ms: i64,
 pub detect_wrap: bool,
}

impl From<UniqueIdSettings> for crate::uid::UniqueIdConfig {
 fn from(s: UniqueIdSettings) -> Self {
 crate::uid::UniqueIdConfig {
 shard_id: s.shard_id,
 epoch_base_ms: s.epoch_base_ms,
 detect_wrap: s.detect_wrap,
 }
 }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
 pub level: String,
 pub json: bool,
}

/// One row of the `PROFILE` table, as configured rather than
/// loaded from the database — used to seed the schema at first startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
 pub name: String,
 pub profile_type: String,
 pub validity_seconds: i64,
 pub not_before_policy: String,
}

/// One row of the `CA` table, as configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaEntryConfig {
 pub name: String,
 pub signing_key_handle: String,
 pub signer_pool_size: usize,
}

/// A downstream consumer of newly issued and revoked certificates (an
/// LDAP/file/HTTP publisher, depending on deployment). Enqueuing is the
/// only part of publishing this core performs; draining the queue and
/// actually delivering entries is outside this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
 pub id: i32,
 pub name: String,
 pub enabled: bool,
 /// Whether this publisher wants entries for newly issued (good) certs.
 pub publish_good: bool,
 /// Whether this publisher wants entries for revocations.
 pub publish_revoked: bool,
}

impl Default for DatabaseConfig {
 fn default() -> Self {
 Self {
 url: "postgresql://localhost/castellan".to_string(),
 max_connections: 10,
 acquire_timeout_seconds: 10,
 }
 }
}

impl Default for OcspConfig {
 fn default() -> Self {
 Self {
 max_request_size_bytes: 16 * 1024,
 max_request_list_length: 16,
 require_signed_request: false,
 unknown_issuer_returns_unauthorized: true,
 non_issued_is_good: false,
 nonce_min_len: 4,
 nonce_max_len: 32,
 responder_max_cache_age_seconds: 60,
 }
 }
}

impl Default for UniqueIdSettings {
 fn default() -> Self {
 Self {
 shard_id: 0,
 epoch_base_ms: 1_700_000_000_000,
 detect_wrap: false,
 }
 }
}

impl Default for LoggingConfig {
 fn default() -> Self {
 Self {
 level: "info".to_string(),
 json: false,
 }
 }
}

impl Default for CaConfig {
 fn default() -> Self {
 Self {
 database: DatabaseConfig::default(),
 ocsp: OcspConfig::default(),
 uid: UniqueIdSettings::default(),
 logging: LoggingConfig::default(),
 profiles: Vec::new(),
 cas: Vec::new(),
 publishers: Vec::new(),
 }
 }
}

impl CaConfig {
 /// Load defaults overridden by `CASTELLAN_*` environment variables
 /// (e.g. `CASTELLAN_DATABASE_URL`, `CASTELLAN_OCSP_MAX_REQUEST_SIZE`,
 /// `CASTELLAN_UID_SHARD_ID`). `profiles`/`cas` are not env-addressable;
 /// they are populated from the database at startup in normal operation
 /// and are left empty here.
 pub fn load() -> Result<Self, CaError> {
 let settings = config::Config::builder()
.add_source(config::Config::try_from(&CaConfig::default()).map_err(|e| {
 CaError::SystemFailure(format!("failed to seed config defaults: {e}"))
 })?)
.add_source(
 config::Environment::with_prefix("CASTELLAN")
.separator("_")
.try_parsing(true),
 )
.build()
.map_err(|e| CaError::SystemFailure(format!("failed to build configuration: {e}")))?;

 let mut cfg: CaConfig = settings
.try_deserialize()
.map_err(|e| CaError::SystemFailure(format!("failed to deserialize configuration: {e}")))?;

 cfg.validate()?;
 Ok(cfg)
 }

 pub fn validate(&self) -> Result<(), CaError> {
 if self.database.url.is_empty() {
 return Err(CaError::SystemFailure("database.url is required".into()));
 }
 if self.database.max_connections == 0 {
 return Err(CaError::SystemFailure("database.max_connections must be > 0".into()));
 }
 if self.ocsp.nonce_min_len > self.ocsp.nonce_max_len {
 return Err(CaError::SystemFailure("ocsp.nonce_min_len exceeds ocsp.nonce_max_len".into()));
 }
 if self.uid.shard_id > 127 {
 return Err(CaError::SystemFailure("uid.shard_id must be in [0,127]".into()));
 }
 Ok(())
 }
}

#[cfg(test)]
mod tests {
 use super::*;

 #[test]
 fn defaults_validate() {
 CaConfig::default().validate().unwrap();
 }

 #[test]
 fn rejects_empty_database_url() {
 let mut cfg = CaConfig::default();
 cfg.database.url.clear();
 assert_eq!(cfg.validate().unwrap_err().kind(), crate::errors::CaErrorKind::SystemFailure);
 }

 #[test]
 fn rejects_inverted_nonce_bounds() {
 let mut cfg = CaConfig::default();
 cfg.ocsp.nonce_min_len = 40;
 cfg.ocsp.nonce_max_len = 4;
 assert_eq!(cfg.validate().unwrap_err().kind(), crate::errors::CaErrorKind::SystemFailure);
 }
}
