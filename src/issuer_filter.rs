//! Issuer filter: gates which issuer certificates an OCSP
//! responder or publisher accepts, by base64 SHA-1 fingerprint.

use std::collections::HashSet;

/// `accepts(fp)` is true iff (include is empty or contains fp) and
/// (exclude is empty or does not contain fp).
#[derive(Debug, Clone, Default)]
pub struct IssuerFilter {
 include: HashSet<String>,
 exclude: HashSet<String>,
}

impl IssuerFilter {
 /// Accepts every issuer.
 pub fn all() -> Self {
 Self::default()
 }

 /// Accepts only the listed fingerprints.
 pub fn include_only(fingerprints: impl IntoIterator<Item = String>) -> Self {
 Self {
 include: fingerprints.into_iter().collect(),
 exclude: HashSet::new(),
 }
 }

 /// Accepts every issuer except the listed fingerprints.
 pub fn exclude(fingerprints: impl IntoIterator<Item = String>) -> Self {
 Self {
 include: HashSet::new(),
 exclude: fingerprints.into_iter().collect(),
 }
 }

 pub fn accepts(&self, sha1_fp_base64: &str) -> bool {
 let included = self.include.is_empty() || self.include.contains(sha1_fp_base64);
 let excluded = !self.exclude.is_empty() && self.exclude.contains(sha1_fp_base64);
 included && !excluded
 }
}

#[cfg(test)]
mod tests {
 use super::*;

 #[test]
 fn all_accepts_everything() {
 let filter = IssuerFilter::all();
 assert!(filter.accepts("anything"));
 }

 #[test]
 fn include_only_rejects_unlisted_fingerprints() {
 let filter = IssuerFilter::include_only(["AAAA".to_string()]);
 assert!(filter.accepts("AAAA"));
 assert!(!filter.accepts("BBBB"));
 }

 #[test]
 fn exclude_rejects_only_listed_fingerprints() {
 let filter = IssuerFilter::exclude(["BBBB".to_string()]);
 assert!(filter.accepts("AAAA"));
 assert!(!filter.accepts("BBBB"));
 }

 #[test]
 fn exclude_takes_precedence_when_both_present() {
 let filter = IssuerFilter {
 include: ["AAAA".to_string()].into_iter().collect(),
 exclude: ["AAAA".to_string()].into_iter().collect(),
 };
 assert!(!filter.accepts("AAAA"));
 }
}
