//! Issuance profiles: per-profile validity, subject-DN
//! derivation, extension assembly, allowed signature algorithms, and
//! notBefore policy, loaded from a [`ProfileRow`].

use chrono::{DateTime, Datelike, Duration as ChronoDuration, TimeZone, Utc};
use chrono_tz::Tz;

use crate::asn1::cert::Extension;
use crate::asn1::name::{AttributeTypeAndValue, Name};
use crate::errors::CaError;
use crate::store::models::ProfileRow;

/// How strictly a requested `notAfter` is honored against the profile's
/// configured validity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidityMode {
 /// Reject a requested notAfter that would exceed the profile's window.
 Strict,
 /// Always honor the requested notAfter verbatim.
 Lax,
 /// Clamp a requested notAfter down to the CA's own notAfter.
 Cutoff,
}

/// When the granted notBefore is pinned relative to "now".
#[derive(Debug, Clone)]
pub enum NotBeforePolicy {
 Now,
 OffsetSeconds(i64),
 MidnightInTimezone(Tz),
}

impl NotBeforePolicy {
 /// Parse the schema's `not_before_policy` string: `"now"`,
 /// `"offset:<seconds>"`, or `"midnight:<IANA timezone>"`.
 pub fn parse(s: &str) -> Result<Self, CaError> {
 if s == "now" {
 return Ok(NotBeforePolicy::Now);
 }
 if let Some(secs) = s.strip_prefix("offset:") {
 let secs: i64 = secs
.parse()
.map_err(|_| CaError::SystemFailure(format!("malformed notBefore offset: {s}")))?;
 return Ok(NotBeforePolicy::OffsetSeconds(secs));
 }
 if let Some(tz_name) = s.strip_prefix("midnight:") {
 let tz: Tz = tz_name
.parse()
.map_err(|_| CaError::SystemFailure(format!("unknown timezone in notBefore policy: {tz_name}")))?;
 return Ok(NotBeforePolicy::MidnightInTimezone(tz));
 }
 Err(CaError::SystemFailure(format!("unrecognized notBefore policy: {s}")))
 }

 /// Compute the granted notBefore from "now".
 pub fn resolve(&self, now: DateTime<Utc>) -> DateTime<Utc> {
 match self {
 NotBeforePolicy::Now => now,
 NotBeforePolicy::OffsetSeconds(secs) => now + ChronoDuration::seconds(*secs),
 NotBeforePolicy::MidnightInTimezone(tz) => {
 let local = now.with_timezone(tz);
 let midnight = tz
.with_ymd_and_hms(local.year(), local.month(), local.day(), 0, 0, 0)
.single()
.unwrap_or(local);
 midnight.with_timezone(&Utc)
 }
 }
 }
}

/// One subject RDN rule: which OID, whether the requestor may supply it, and
/// a fixed value to use when they may not (or did not).
#[derive(Debug, Clone)]
pub struct SubjectRdnRule {
 pub oid: String,
 pub allow_from_request: bool,
 pub fixed_value: Option<String>,
}

/// Subject-DN derivation rules: RDN order plus per-attribute rules,
/// parsed from the schema's `subject_dn_spec` JSON column.
#[derive(Debug, Clone, Default)]
pub struct SubjectDnSpec {
 pub rules: Vec<SubjectRdnRule>,
}

impl SubjectDnSpec {
 pub fn from_json(value: &serde_json::Value) -> Result<Self, CaError> {
 let rules_json = value
.get("rdns")
.and_then(|v| v.as_array())
.ok_or_else(|| CaError::SystemFailure("subject_dn_spec missing 'rdns' array".into()))?;

 let mut rules = Vec::with_capacity(rules_json.len());
 for entry in rules_json {
 let oid = entry
.get("oid")
.and_then(|v| v.as_str())
.ok_or_else(|| CaError::SystemFailure("subject_dn_spec rdn missing 'oid'".into()))?
.to_string();
 let allow_from_request = entry
.get("allow_from_request")
.and_then(|v| v.as_bool())
.unwrap_or(false);
 let fixed_value = entry
.get("fixed_value")
.and_then(|v| v.as_str())
.map(|s| s.to_string());
 rules.push(SubjectRdnRule { oid, allow_from_request, fixed_value });
 }
 Ok(Self { rules })
 }

 /// Derive the granted subject from the CSR's requested subject: walk the
 /// profile's RDN order, take the requestor's value if permitted and
 /// present, else the profile's fixed value; RDNs the profile does not
 /// name are dropped. The rendered subject text is truncated to
 /// `max_len` for storage at the call site, not here — this derives the
 /// structured `Name` DER-encoded into the certificate.
 pub fn derive(&self, requested: &Name) -> Result<Name, CaError> {
 let mut rdns = Vec::with_capacity(self.rules.len());
 for rule in &self.rules {
 let requested_value = requested.get_first(&rule.oid);
 let value = if rule.allow_from_request {
 requested_value.map(|s| s.to_string()).or_else(|| rule.fixed_value.clone())
 } else {
 rule.fixed_value.clone()
 };
 if let Some(value) = value {
 rdns.push(vec![AttributeTypeAndValue { oid: rule.oid.clone(), value }]);
 }
 }
 if rdns.is_empty() {
 return Err(CaError::BadCertTemplate("derived subject has no RDNs".into()));
 }
 Ok(Name { rdns })
 }
}

/// Produces one or more `Extension`s for an issued certificate. Kept as a
/// trait so profile-specific extension sets (end-entity vs sub-CA) can be
/// composed without a central enum of every extension this core knows about.
pub trait ExtensionProducer: Send + Sync {
 fn produce(&self, ctx: &IssuanceExtensionContext) -> Vec<Extension>;
}

/// Inputs an extension producer may need; kept narrow so producers stay
/// pure and independently testable.
pub struct IssuanceExtensionContext<'a> {
 pub is_ca: bool,
 pub subject_public_key: &'a [u8],
 pub issuer_key_ski: Option<&'a [u8]>,
}

pub const OID_BASIC_CONSTRAINTS: &str = "2.5.29.19";
pub const OID_KEY_USAGE: &str = "2.5.29.15";
pub const OID_SUBJECT_KEY_IDENTIFIER: &str = "2.5.29.14";
pub const OID_AUTHORITY_KEY_IDENTIFIER: &str = "2.5.29.35";
pub const OID_EXTENDED_KEY_USAGE: &str = "2.5.29.37";

/// `BasicConstraints::= SEQUENCE { cA BOOLEAN DEFAULT FALSE }`, critical.
pub struct BasicConstraintsProducer {
 pub is_ca: bool,
}

impl ExtensionProducer for BasicConstraintsProducer {
 fn produce(&self, _ctx: &IssuanceExtensionContext) -> Vec<Extension> {
 use crate::asn1::encode::{encode_sequence, encode_tlv};
 let body = if self.is_ca {
 encode_tlv(crate::asn1::der::tag::BOOLEAN, &[0xFF])
 } else {
 Vec::new()
 };
 vec![Extension {
 oid: OID_BASIC_CONSTRAINTS.to_string(),
 critical: true,
 value_der: encode_sequence(&body),
 }]
 }
}

/// `KeyUsage::= BIT STRING`, critical. `bits` is the usual RFC 5280 bit
/// order (bit 0 = digitalSignature,... bit 5 = keyCertSign).
pub struct KeyUsageProducer {
 pub bits: Vec<bool>,
}

impl ExtensionProducer for KeyUsageProducer {
 fn produce(&self, _ctx: &IssuanceExtensionContext) -> Vec<Extension> {
 use crate::asn1::encode::encode_tlv;
 let mut byte = 0u8;
 for (i, &set) in self.bits.iter().enumerate().take(8) {
 if set {
 byte |= 0x80 >> i;
 }
 }
 let used_bits = self.bits.len().min(8);
 let unused_bits = if used_bits == 0 { 0 } else { (8 - used_bits) as u8 };
 let content = [vec![unused_bits], vec![byte]].concat();
 vec![Extension {
 oid: OID_KEY_USAGE.to_string(),
 critical: true,
 value_der: encode_tlv(crate::asn1::der::tag::BIT_STRING, &content),
 }]
 }
}

/// `SubjectKeyIdentifier::= OCTET STRING` (SHA-1 of the public key bits).
pub struct SubjectKeyIdentifierProducer;

impl ExtensionProducer for SubjectKeyIdentifierProducer {
 fn produce(&self, ctx: &IssuanceExtensionContext) -> Vec<Extension> {
 use crate::asn1::encode::encode_octet_string;
 use crate::hash::HashAlgorithm;
 let ski = HashAlgorithm::Sha1.digest(ctx.subject_public_key);
 vec![Extension {
 oid: OID_SUBJECT_KEY_IDENTIFIER.to_string(),
 critical: false,
 value_der: encode_octet_string(&ski),
 }]
 }
}

/// `ExtendedKeyUsage::= SEQUENCE OF KeyPurposeId`, non-critical.
pub struct ExtendedKeyUsageProducer {
 pub purpose_oids: Vec<String>,
}

impl ExtensionProducer for ExtendedKeyUsageProducer {
 fn produce(&self, _ctx: &IssuanceExtensionContext) -> Vec<Extension> {
 use crate::asn1::encode::encode_sequence;
 use crate::asn1::name::encode_oid;
 let body: Vec<u8> = self.purpose_oids.iter().flat_map(|oid| encode_oid(oid)).collect();
 vec![Extension {
 oid: OID_EXTENDED_KEY_USAGE.to_string(),
 critical: false,
 value_der: encode_sequence(&body),
 }]
 }
}

/// `AuthorityKeyIdentifier::= SEQUENCE { keyIdentifier [0] IMPLICIT OCTET STRING }`.
/// Emitted only when the issuer's key identifier is known (set by the pool
/// at CA-load time; absent for a fresh self-signed root).
pub struct AuthorityKeyIdentifierProducer;

impl ExtensionProducer for AuthorityKeyIdentifierProducer {
 fn produce(&self, ctx: &IssuanceExtensionContext) -> Vec<Extension> {
 use crate::asn1::encode::{encode_sequence, encode_tlv};
 let Some(issuer_ski) = ctx.issuer_key_ski else {
 return Vec::new();
 };
 let body = encode_tlv(crate::asn1::der::tag::context(0), issuer_ski);
 vec![Extension {
 oid: OID_AUTHORITY_KEY_IDENTIFIER.to_string(),
 critical: false,
 value_der: encode_sequence(&body),
 }]
 }
}

/// A loaded issuance profile.
pub struct Profile {
 pub name: String,
 pub profile_type: String,
 pub validity: std::time::Duration,
 pub subject_dn_spec: SubjectDnSpec,
 pub allowed_signature_algorithm_oids: Vec<String>,
 pub not_before_policy: NotBeforePolicy,
 pub validity_mode: ValidityMode,
 pub extension_producers: Vec<Box<dyn ExtensionProducer>>,
 pub is_ca: bool,
}

impl Profile {
 /// Build from a stored row plus the extension producers this profile
 /// type uses (callers choose the set; the row carries no executable
 /// code, per "admin-managed" lifecycle).
 pub fn from_row(row: &ProfileRow, validity_mode: ValidityMode) -> Result<Self, CaError> {
 let subject_dn_spec = SubjectDnSpec::from_json(&row.subject_dn_spec)?;
 let not_before_policy = NotBeforePolicy::parse(&row.not_before_policy)?;
 let is_ca = row.profile_type == "ca" || row.profile_type == "sub-ca";

 let mut extension_producers: Vec<Box<dyn ExtensionProducer>> = vec![
 Box::new(BasicConstraintsProducer { is_ca }),
 Box::new(SubjectKeyIdentifierProducer),
 Box::new(AuthorityKeyIdentifierProducer),
 ];
 extension_producers.push(Box::new(KeyUsageProducer {
 bits: if is_ca {
 vec![false, false, false, false, false, true, true] // keyCertSign, cRLSign
 } else {
 vec![true, false, true] // digitalSignature, keyEncipherment
 },
 }));
 if !is_ca {
 extension_producers.push(Box::new(ExtendedKeyUsageProducer {
 purpose_oids: vec![
 "1.3.6.1.5.5.7.3.1".to_string(), // serverAuth
 "1.3.6.1.5.5.7.3.2".to_string(), // clientAuth
 ],
 }));
 }

 Ok(Self {
 name: row.name.clone(),
 profile_type: row.profile_type.clone(),
 validity: std::time::Duration::from_secs(row.validity_seconds.max(0) as u64),
 subject_dn_spec,
 allowed_signature_algorithm_oids: row.allowed_signature_algorithms.clone(),
 not_before_policy,
 validity_mode,
 extension_producers,
 is_ca,
 })
 }

 /// Validate the CSR's self-signature algorithm is permitted by this
 /// profile's allowed-signature-algorithm list. Fails with
 /// `bad_cert_template` for an unsupported algorithm.
 pub fn validate_public_key(&self, signature_algorithm_oid: &str) -> Result<(), CaError> {
 if self.allowed_signature_algorithm_oids.iter().any(|oid| oid == signature_algorithm_oid) {
 Ok(())
 } else {
 Err(CaError::BadCertTemplate(format!(
 "algorithm {signature_algorithm_oid} is not permitted by profile {}",
 self.name
 )))
 }
 }

 /// Compute the granted validity window.
 pub fn compute_validity(
 &self,
 now: DateTime<Utc>,
 requested_not_before: Option<DateTime<Utc>>,
 requested_not_after: Option<DateTime<Utc>>,
 ca_not_after: DateTime<Utc>,
 ) -> Result<(DateTime<Utc>, DateTime<Utc>), CaError> {
 let not_before = requested_not_before.unwrap_or_else(|| self.not_before_policy.resolve(now));
 let policy_not_after = not_before + ChronoDuration::from_std(self.validity)
.map_err(|e| CaError::SystemFailure(format!("validity duration overflow: {e}")))?;

 let not_after = match requested_not_after {
 None => policy_not_after,
 Some(requested) => match self.validity_mode {
 ValidityMode::Lax => requested,
 ValidityMode::Cutoff => requested.min(ca_not_after),
 ValidityMode::Strict => {
 if requested > policy_not_after {
 return Err(CaError::BadCertTemplate(format!(
 "requested notAfter {requested} exceeds profile validity window ending {policy_not_after}"
 )));
 }
 requested
 }
 },
 };

 if not_after > ca_not_after {
 return Err(CaError::BadCertTemplate(
 "requested validity extends beyond the issuing CA's own notAfter".into(),
 ));
 }
 if not_after <= not_before {
 return Err(CaError::BadCertTemplate("notAfter must be after notBefore".into()));
 }
 Ok((not_before, not_after))
 }
}

#[cfg(test)]
mod tests {
 use super::*;
 use chrono::Timelike;

 fn profile_row(not_before_policy: &str) -> ProfileRow {
 ProfileRow {
 id: 1,
 name: "server".to_string(),
 profile_type: "end-entity".to_string(),
 validity_seconds: 86_400 * 365,
 subject_dn_spec: serde_json::json!({
 "rdns": [
 {"oid": "2.5.4.3", "allow_from_request": true},
 {"oid": "2.5.4.10", "allow_from_request": false, "fixed_value": "Acme"},
 ]
 }),
 allowed_signature_algorithms: vec!["1.3.101.112".to_string()],
 not_before_policy: not_before_policy.to_string(),
 }
 }

 #[test]
 fn subject_derivation_keeps_order_and_applies_fixed_value() {
 let profile = Profile::from_row(&profile_row("now"), ValidityMode::Strict).unwrap();
 let requested = Name {
 rdns: vec![vec![AttributeTypeAndValue { oid: "2.5.4.3".into(), value: "host1.example.org".into() }]],
 };
 let derived = profile.subject_dn_spec.derive(&requested).unwrap();
 assert_eq!(derived.to_display_string(), "CN=host1.example.org,O=Acme");
 }

 #[test]
 fn disallowed_rdn_falls_back_to_fixed_value_even_if_requested() {
 let profile = Profile::from_row(&profile_row("now"), ValidityMode::Strict).unwrap();
 let requested = Name {
 rdns: vec![
 vec![AttributeTypeAndValue { oid: "2.5.4.3".into(), value: "host1.example.org".into() }],
 vec![AttributeTypeAndValue { oid: "2.5.4.10".into(), value: "Attacker Inc".into() }],
 ],
 };
 let derived = profile.subject_dn_spec.derive(&requested).unwrap();
 assert_eq!(derived.get_first("2.5.4.10"), Some("Acme"));
 }

 #[test]
 fn strict_mode_rejects_validity_beyond_policy_window() {
 let profile = Profile::from_row(&profile_row("now"), ValidityMode::Strict).unwrap();
 let now = Utc::now();
 let too_far = now + ChronoDuration::days(3650);
 let err = profile
.compute_validity(now, None, Some(too_far), now + ChronoDuration::days(3650 * 2))
.unwrap_err();
 assert_eq!(err.kind(), crate::errors::CaErrorKind::BadCertTemplate);
 }

 #[test]
 fn cutoff_mode_clamps_to_ca_not_after() {
 let profile = Profile::from_row(&profile_row("now"), ValidityMode::Cutoff).unwrap();
 let now = Utc::now();
 let ca_not_after = now + ChronoDuration::days(30);
 let requested = now + ChronoDuration::days(3650);
 let (_, not_after) = profile.compute_validity(now, None, Some(requested), ca_not_after).unwrap();
 assert_eq!(not_after, ca_not_after);
 }

 #[test]
 fn end_entity_profile_carries_extended_key_usage() {
 let profile = Profile::from_row(&profile_row("now"), ValidityMode::Strict).unwrap();
 let ctx = IssuanceExtensionContext { is_ca: false, subject_public_key: b"key", issuer_key_ski: None };
 let ekus: Vec<_> = profile
.extension_producers
.iter()
.flat_map(|p| p.produce(&ctx))
.filter(|e| e.oid == OID_EXTENDED_KEY_USAGE)
.collect();
 assert_eq!(ekus.len(), 1);
 assert!(!ekus[0].critical);
 }

 #[test]
 fn midnight_policy_rounds_down_in_named_timezone() {
 let policy = NotBeforePolicy::parse("midnight:Europe/Berlin").unwrap();
 let now = chrono::DateTime::parse_from_rfc3339("2026-03-05T14:30:00+00:00")
.unwrap()
.with_timezone(&Utc);
 let resolved = policy.resolve(now);
 let local = resolved.with_timezone(&chrono_tz::Europe::Berlin);
 assert_eq!((local.hour(), local.minute(), local.second()), (0, 0, 0));
 }
}
