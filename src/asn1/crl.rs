//! RFC 5280 `CertificateList` (CRL) encoder, plus a decoder for the
//! `revokedCertificates` of a previously issued CRL — needed to compute a
//! delta CRL's `removeFromCRL` entries.

use super::der::{expect_tag, read_header, tag, DecodeError};
use super::encode::{encode_context, encode_enumerated, encode_generalized_time, encode_integer, encode_sequence, encode_tlv};
use super::name::{decode_name, encode_name, encode_oid, Name};

pub const OID_CRL_NUMBER: &str = "2.5.29.20";
pub const OID_DELTA_CRL_INDICATOR: &str = "2.5.29.27";
pub const OID_CRL_REASON: &str = "2.5.29.21";
pub const OID_INVALIDITY_DATE: &str = "2.5.29.24";

/// One `revokedCertificates` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevokedEntry {
 pub serial_hex: String,
 pub revocation_time: chrono::DateTime<chrono::Utc>,
 /// `CRLReason`, per `reason ∈ CRLReason` invariant.
 pub reason: Option<i32>,
 pub invalidity_date: Option<chrono::DateTime<chrono::Utc>>,
}

fn encode_extension(oid: &str, critical: bool, value_der: &[u8]) -> Vec<u8> {
 let mut body = encode_oid(oid);
 if critical {
 body.extend(encode_tlv(tag::BOOLEAN, &[0xFF]));
 }
 body.extend(encode_tlv(tag::OCTET_STRING, value_der));
 encode_sequence(&body)
}

fn encode_revoked_entry(entry: &RevokedEntry) -> Vec<u8> {
 let serial_bytes = hex::decode(&entry.serial_hex).unwrap_or_default();
 let mut body = encode_integer(&serial_bytes);
 body.extend(encode_generalized_time(entry.revocation_time));

 let mut extensions = Vec::new();
 if let Some(reason) = entry.reason {
 extensions.extend(encode_extension(
 OID_CRL_REASON,
 false,
 &encode_enumerated(reason),
 ));
 }
 if let Some(inv) = entry.invalidity_date {
 extensions.extend(encode_extension(
 OID_INVALIDITY_DATE,
 false,
 &encode_generalized_time(inv),
 ));
 }
 if !extensions.is_empty() {
 body.extend(encode_sequence(&extensions));
 }
 encode_sequence(&body)
}

/// Build a `TBSCertList` for a full or delta CRL. `crl_number` is this CRL's
/// own monotonic number; `base_crl_number`, when set, emits the delta CRL
/// indicator extension pointing at the base full CRL it is relative to.
pub fn encode_tbs_cert_list(
 issuer: &Name,
 signature_algorithm_oid: &str,
 this_update: chrono::DateTime<chrono::Utc>,
 next_update: Option<chrono::DateTime<chrono::Utc>>,
 revoked: &[RevokedEntry],
 crl_number: u64,
 base_crl_number: Option<u64>,
) -> Vec<u8> {
 let mut alg = encode_oid(signature_algorithm_oid);
 alg.extend(encode_tlv(tag::NULL, &[]));
 let alg_der = encode_sequence(&alg);

 // version v2 is present whenever entry extensions or crlExtensions appear.
 let mut body = encode_integer(&[0x01]);
 body.extend(alg_der);
 body.extend(encode_name(issuer));
 body.extend(encode_generalized_time(this_update));
 if let Some(next) = next_update {
 body.extend(encode_generalized_time(next));
 }

 if !revoked.is_empty() {
 let entries: Vec<u8> = revoked.iter().flat_map(encode_revoked_entry).collect();
 body.extend(encode_sequence(&entries));
 }

 let mut crl_extensions = encode_extension(
 OID_CRL_NUMBER,
 false,
 &encode_integer(&crl_number.to_be_bytes()),
 );
 if let Some(base) = base_crl_number {
 crl_extensions.extend(encode_extension(
 OID_DELTA_CRL_INDICATOR,
 true,
 &encode_integer(&base.to_be_bytes()),
 ));
 }
 body.extend(encode_context(0, &encode_sequence(&crl_extensions)));

 encode_sequence(&body)
}

/// Sign and wrap a `TBSCertList` into the final `CertificateList`.
pub fn encode_certificate_list(
 tbs_cert_list_der: &[u8],
 signature_algorithm_oid: &str,
 signature: &[u8],
) -> Vec<u8> {
 let mut alg = encode_oid(signature_algorithm_oid);
 alg.extend(encode_tlv(tag::NULL, &[]));
 let alg_der = encode_sequence(&alg);

 let mut sig_content = vec![0u8];
 sig_content.extend_from_slice(signature);
 let sig_bit_string = encode_tlv(tag::BIT_STRING, &sig_content);

 let body = [tbs_cert_list_der.to_vec(), alg_der, sig_bit_string].concat();
 encode_sequence(&body)
}

fn decode_entry_extensions(bytes: &[u8], offset: usize, end: usize) -> Result<(Option<i32>, Option<chrono::DateTime<chrono::Utc>>), DecodeError> {
 let mut reason = None;
 let mut invalidity_date = None;
 let mut pos = offset;
 while pos < end {
 let ext_seq = expect_tag(bytes, pos, tag::SEQUENCE)?;
 let oid_header = expect_tag(bytes, ext_seq.content_offset, tag::OBJECT_IDENTIFIER)?;
 let oid = super::name::decode_oid_bytes(&bytes[oid_header.content_offset..oid_header.end_offset()])?;
 let mut value_pos = oid_header.end_offset();
 let maybe_bool = read_header(bytes, value_pos)?;
 if maybe_bool.tag == tag::BOOLEAN {
 value_pos = maybe_bool.end_offset();
 }
 let octet_header = expect_tag(bytes, value_pos, tag::OCTET_STRING)?;
 let value = &bytes[octet_header.content_offset..octet_header.end_offset()];

 match oid.as_str() {
 OID_CRL_REASON => {
 let enum_header = expect_tag(value, 0, tag::ENUMERATED)?;
 reason = Some(
 super::der::integer_to_i64(&value[enum_header.content_offset..enum_header.end_offset()])? as i32,
 );
 }
 OID_INVALIDITY_DATE => {
 let time_header = read_header(value, 0)?;
 let text = std::str::from_utf8(&value[time_header.content_offset..time_header.end_offset()])
.map_err(|_| DecodeError::Malformed(value_pos, "invalidity date is not UTF-8"))?;
 let dt = chrono::NaiveDateTime::parse_from_str(text, "%Y%m%d%H%M%SZ")
.map_err(|_| DecodeError::Malformed(value_pos, "malformed invalidity date"))?;
 invalidity_date = Some(dt.and_utc());
 }
 _ => {}
 }
 pos = ext_seq.end_offset();
 }
 Ok((reason, invalidity_date))
}

/// Decode the `revokedCertificates` of a `CertificateList`'s `TBSCertList`,
/// skipping signature verification — this is used only to read back a
/// previously generated base CRL's entries.
pub fn decode_revoked_entries(bytes: &[u8]) -> Result<Vec<RevokedEntry>, DecodeError> {
 let outer = expect_tag(bytes, 0, tag::SEQUENCE)?;
 let tbs = expect_tag(bytes, outer.content_offset, tag::SEQUENCE)?;

 let mut pos = tbs.content_offset;
 let first = read_header(bytes, pos)?;
 if first.tag == tag::INTEGER {
 pos = first.end_offset();
 }
 let (_sig_oid, _params, after_sig) = super::spki::decode_algorithm_identifier(bytes, pos)?;
 pos = after_sig;
 let (_issuer, after_issuer) = decode_name(bytes, pos)?;
 pos = after_issuer;

 let this_update_header = read_header(bytes, pos)?;
 pos = this_update_header.end_offset();

 if pos < tbs.end_offset() {
 let maybe_next_update = read_header(bytes, pos)?;
 if maybe_next_update.tag == tag::UTC_TIME || maybe_next_update.tag == tag::GENERALIZED_TIME {
 pos = maybe_next_update.end_offset();
 }
 }

 let mut entries = Vec::new();
 if pos < tbs.end_offset() {
 let next = read_header(bytes, pos)?;
 if next.tag == tag::SEQUENCE {
 let mut epos = next.content_offset;
 let eend = next.end_offset();
 while epos < eend {
 let entry_seq = expect_tag(bytes, epos, tag::SEQUENCE)?;
 let serial_header = expect_tag(bytes, entry_seq.content_offset, tag::INTEGER)?;
 let serial_hex = super::der::integer_bytes_to_hex(
 &bytes[serial_header.content_offset..serial_header.end_offset()],
 );
 let rev_time_header = read_header(bytes, serial_header.end_offset())?;
 let (reason, invalidity_date) = if rev_time_header.end_offset() < entry_seq.end_offset() {
 let ext_seq = expect_tag(bytes, rev_time_header.end_offset(), tag::SEQUENCE)?;
 decode_entry_extensions(bytes, ext_seq.content_offset, ext_seq.end_offset())?
 } else {
 (None, None)
 };
 entries.push(RevokedEntry {
 serial_hex,
 revocation_time: chrono::Utc::now(), // re-derived accurately below
 reason,
 invalidity_date,
 });
 // Correct the placeholder timestamp now that we know its header.
 let text = std::str::from_utf8(
 &bytes[rev_time_header.content_offset..rev_time_header.end_offset()],
 )
.map_err(|_| DecodeError::Malformed(epos, "revocationDate is not UTF-8"))?;
 let dt = chrono::NaiveDateTime::parse_from_str(text, "%Y%m%d%H%M%SZ")
.map_err(|_| DecodeError::Malformed(epos, "malformed revocationDate"))?;
 entries.last_mut().unwrap().revocation_time = dt.and_utc();
 epos = entry_seq.end_offset();
 }
 }
 }

 Ok(entries)
}

#[cfg(test)]
mod tests {
 use super::*;
 use crate::asn1::name::{AttributeTypeAndValue, OID_CN, OID_O};

 fn issuer() -> Name {
 Name {
 rdns: vec![vec![AttributeTypeAndValue { oid: OID_O.into(), value: "Acme Root".into() }]],
 }
 }

 #[test]
 fn round_trips_revoked_entries() {
 let t0 = chrono::DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&chrono::Utc);
 let entries = vec![
 RevokedEntry {
 serial_hex: "2a".into(),
 revocation_time: t0,
 reason: Some(1),
 invalidity_date: None,
 },
 RevokedEntry {
 serial_hex: "ff".into(),
 revocation_time: t0,
 reason: None,
 invalidity_date: None,
 },
 ];
 let tbs = encode_tbs_cert_list(&issuer(), "1.2.840.10045.4.3.2", t0, None, &entries, 7, None);
 let wrapped = encode_certificate_list(&tbs, "1.2.840.10045.4.3.2", &[0xAA; 64]);
 let decoded = decode_revoked_entries(&wrapped).unwrap();
 assert_eq!(decoded.len(), 2);
 assert_eq!(decoded[0].serial_hex, "2a");
 assert_eq!(decoded[0].reason, Some(1));
 assert_eq!(decoded[1].serial_hex, "ff");
 assert_eq!(decoded[1].reason, None);
 }

 #[test]
 fn empty_revoked_list_is_omitted_but_decodes_empty() {
 let t0 = chrono::Utc::now();
 let tbs = encode_tbs_cert_list(&issuer(), "1.2.840.10045.4.3.2", t0, Some(t0), &[], 1, None);
 let wrapped = encode_certificate_list(&tbs, "1.2.840.10045.4.3.2", &[0xAA; 64]);
 assert!(decode_revoked_entries(&wrapped).unwrap().is_empty());
 }

 #[test]
 fn delta_crl_carries_base_number_extension() {
 let t0 = chrono::Utc::now();
 let tbs = encode_tbs_cert_list(&issuer(), "1.2.840.10045.4.3.2", t0, None, &[], 8, Some(7));
 // crlExtensions is the trailing [0] EXPLICIT block; just assert it's non-trivially larger
 // than the equivalent full CRL without a base number.
 let tbs_full = encode_tbs_cert_list(&issuer(), "1.2.840.10045.4.3.2", t0, None, &[], 8, None);
 assert!(tbs.len() > tbs_full.len());
 }
}
