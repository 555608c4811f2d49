//! X.509 v3 `Certificate` (RFC 5280) decoder, used to load CA certificates
//! into the issuer-identity table and to read a certificate's
//! serial/validity/subject back for CLI display and CRL entry construction.

use super::der::{expect_tag, read_header, tag, DecodeError};
use super::encode::{encode_context, encode_generalized_time, encode_integer, encode_sequence, encode_tlv};
use super::name::{decode_name, encode_name, encode_oid, Name};
use super::spki::{decode_algorithm_identifier, decode_spki, SubjectPublicKeyInfo};

#[derive(Debug, Clone)]
pub struct Validity {
 pub not_before: chrono::DateTime<chrono::Utc>,
 pub not_after: chrono::DateTime<chrono::Utc>,
}

/// One `Extensions` entry the issuance pipeline assembles.
#[derive(Debug, Clone)]
pub struct Extension {
 pub oid: String,
 pub critical: bool,
 pub value_der: Vec<u8>,
}

fn encode_extension(ext: &Extension) -> Vec<u8> {
 let mut body = encode_oid(&ext.oid);
 if ext.critical {
 body.extend(encode_tlv(tag::BOOLEAN, &[0xFF]));
 }
 body.extend(encode_tlv(tag::OCTET_STRING, &ext.value_der));
 encode_sequence(&body)
}

/// Build the `tbsCertificate` (always v3, since extensions are always
/// present for this core's profiles) for signing.
pub fn encode_tbs_certificate(
 serial_hex: &str,
 signature_algorithm_oid: &str,
 issuer: &Name,
 not_before: chrono::DateTime<chrono::Utc>,
 not_after: chrono::DateTime<chrono::Utc>,
 subject: &Name,
 spki_der: &[u8],
 extensions: &[Extension],
) -> Vec<u8> {
 let version = encode_context(0, &encode_integer(&[0x02]));
 let serial = encode_integer(&hex::decode(serial_hex).unwrap_or_default());

 let mut alg = encode_oid(signature_algorithm_oid);
 alg.extend(encode_tlv(tag::NULL, &[]));
 let alg_der = encode_sequence(&alg);

 let validity = encode_sequence(
 &[
 encode_generalized_time(not_before),
 encode_generalized_time(not_after),
 ]
.concat(),
 );

 let mut body = version;
 body.extend(serial);
 body.extend(alg_der);
 body.extend(encode_name(issuer));
 body.extend(validity);
 body.extend(encode_name(subject));
 body.extend_from_slice(spki_der);

 if !extensions.is_empty() {
 let ext_body: Vec<u8> = extensions.iter().flat_map(encode_extension).collect();
 body.extend(encode_context(3, &encode_sequence(&ext_body)));
 }

 encode_sequence(&body)
}

/// Sign and wrap a `tbsCertificate` into the final `Certificate`.
pub fn encode_certificate(tbs_der: &[u8], signature_algorithm_oid: &str, signature: &[u8]) -> Vec<u8> {
 let mut alg = encode_oid(signature_algorithm_oid);
 alg.extend(encode_tlv(tag::NULL, &[]));
 let alg_der = encode_sequence(&alg);

 let mut sig_content = vec![0u8];
 sig_content.extend_from_slice(signature);
 let sig_bit_string = encode_tlv(tag::BIT_STRING, &sig_content);

 encode_sequence(&[tbs_der.to_vec(), alg_der, sig_bit_string].concat())
}

#[derive(Debug, Clone)]
pub struct Certificate {
 pub version: i64,
 /// Canonical lowercase hex, matching the certificate table's storage format.
 pub serial_hex: String,
 pub signature_algorithm_oid: String,
 pub issuer: Name,
 /// Raw encoded issuer `Name`, used for the OCSP `CertID` issuer name hash.
 pub issuer_der: Vec<u8>,
 pub validity: Validity,
 pub subject: Name,
 pub spki: SubjectPublicKeyInfo,
 /// Raw encoded `tbsCertificate`, the bytes the outer signature covers.
 pub tbs_der: Vec<u8>,
}

fn decode_time(bytes: &[u8], offset: usize) -> Result<(chrono::DateTime<chrono::Utc>, usize), DecodeError> {
 let header = read_header(bytes, offset)?;
 let text = std::str::from_utf8(&bytes[header.content_offset..header.end_offset()])
.map_err(|_| DecodeError::Malformed(offset, "time value is not valid UTF-8"))?;
 let dt = match header.tag {
 tag::UTC_TIME => chrono::NaiveDateTime::parse_from_str(text, "%y%m%d%H%M%SZ")
.map_err(|_| DecodeError::Malformed(offset, "malformed UTCTime"))?,
 tag::GENERALIZED_TIME => chrono::NaiveDateTime::parse_from_str(text, "%Y%m%d%H%M%SZ")
.map_err(|_| DecodeError::Malformed(offset, "malformed GeneralizedTime"))?,
 _ => return Err(DecodeError::Malformed(offset, "expected UTCTime or GeneralizedTime")),
 };
 Ok((dt.and_utc(), header.end_offset()))
}

fn decode_validity(bytes: &[u8], offset: usize) -> Result<(Validity, usize), DecodeError> {
 let seq = expect_tag(bytes, offset, tag::SEQUENCE)?;
 let (not_before, after_nb) = decode_time(bytes, seq.content_offset)?;
 let (not_after, after_na) = decode_time(bytes, after_nb)?;
 debug_assert!(after_na <= seq.end_offset());
 Ok((Validity { not_before, not_after }, seq.end_offset()))
}

/// Decode a DER-encoded `Certificate`.
pub fn decode(bytes: &[u8]) -> Result<Certificate, DecodeError> {
 let outer = expect_tag(bytes, 0, tag::SEQUENCE)?;
 let tbs_seq = expect_tag(bytes, outer.content_offset, tag::SEQUENCE)?;
 let tbs_der = bytes[outer.content_offset..tbs_seq.end_offset()].to_vec();

 // version is `[0] EXPLICIT INTEGER DEFAULT v1`; absent means v1 (0).
 let mut pos = tbs_seq.content_offset;
 let first = read_header(bytes, pos)?;
 let (version, after_version) = if first.tag == tag::context(0) {
 let version_header = expect_tag(bytes, first.content_offset, tag::INTEGER)?;
 let v = super::der::integer_to_i64(
 &bytes[version_header.content_offset..version_header.end_offset()],
 )?;
 (v, first.end_offset())
 } else {
 (0, pos)
 };
 pos = after_version;

 let serial_header = expect_tag(bytes, pos, tag::INTEGER)?;
 let serial_hex = super::der::integer_bytes_to_hex(
 &bytes[serial_header.content_offset..serial_header.end_offset()],
 );
 pos = serial_header.end_offset();

 let (signature_algorithm_oid, _params, after_sig_alg) = decode_algorithm_identifier(bytes, pos)?;
 pos = after_sig_alg;

 let issuer_start = pos;
 let (issuer, after_issuer) = decode_name(bytes, pos)?;
 let issuer_der = bytes[issuer_start..after_issuer].to_vec();
 pos = after_issuer;

 let (validity, after_validity) = decode_validity(bytes, pos)?;
 pos = after_validity;

 let (subject, after_subject) = decode_name(bytes, pos)?;
 pos = after_subject;

 let (spki, _after_spki) = decode_spki(bytes, pos)?;

 Ok(Certificate {
 version,
 serial_hex,
 signature_algorithm_oid,
 issuer,
 issuer_der,
 validity,
 subject,
 spki,
 tbs_der,
 })
}

#[cfg(test)]
mod tests {
 use super::*;
 use crate::asn1::der::tag as dtag;
 use crate::asn1::name::{AttributeTypeAndValue, OID_C, OID_CN, OID_O};

 fn build_cert(serial: &[u8], not_before: &str, not_after: &str) -> Vec<u8> {
 let issuer = Name {
 rdns: vec![
 vec![AttributeTypeAndValue { oid: OID_O.into(), value: "Acme Root".into() }],
 vec![AttributeTypeAndValue { oid: OID_C.into(), value: "DE".into() }],
 ],
 };
 let subject = Name {
 rdns: vec![vec![AttributeTypeAndValue { oid: OID_CN.into(), value: "host1.example.org".into() }]],
 };

 let mut alg = encode_oid("1.3.101.112");
 alg.extend(encode_tlv(dtag::NULL, &[]));
 let alg_der = encode_sequence(&alg);

 let mut bit_string_content = vec![0u8];
 bit_string_content.extend_from_slice(&[0x22u8; 32]);
 let spki_body = [alg_der.clone(), encode_tlv(dtag::BIT_STRING, &bit_string_content)].concat();
 let spki_der = encode_sequence(&spki_body);

 let validity_body = [
 encode_tlv(dtag::GENERALIZED_TIME, not_before.as_bytes()),
 encode_tlv(dtag::GENERALIZED_TIME, not_after.as_bytes()),
 ]
.concat();
 let validity_der = encode_sequence(&validity_body);

 let tbs_body = [
 encode_integer(serial),
 alg_der.clone(),
 encode_name(&issuer),
 validity_der,
 encode_name(&subject),
 spki_der,
 ]
.concat();
 let tbs_der = encode_sequence(&tbs_body);

 let mut sig_content = vec![0u8];
 sig_content.extend_from_slice(&[0xBB; 64]);
 let sig_bit_string = encode_tlv(dtag::BIT_STRING, &sig_content);

 let outer_body = [tbs_der, alg_der, sig_bit_string].concat();
 encode_sequence(&outer_body)
 }

 #[test]
 fn decodes_serial_issuer_and_validity() {
 let der = build_cert(&[0x01, 0x23], "20260101000000Z", "20270101000000Z");
 let cert = decode(&der).unwrap();
 assert_eq!(cert.version, 0);
 assert_eq!(cert.serial_hex, "0123");
 assert_eq!(cert.issuer.to_display_string(), "O=Acme Root,C=DE");
 assert_eq!(cert.subject.to_display_string(), "CN=host1.example.org");
 assert_eq!(cert.validity.not_before.to_rfc3339(), "2026-01-01T00:00:00+00:00");
 assert_eq!(cert.validity.not_after.to_rfc3339(), "2027-01-01T00:00:00+00:00");
 }

 #[test]
 fn strips_leading_zero_pad_from_serial() {
 let der = build_cert(&[0x00, 0xFF], "20260101000000Z", "20270101000000Z");
 let cert = decode(&der).unwrap();
 assert_eq!(cert.serial_hex, "00ff");
 }

 #[test]
 fn encoded_tbs_certificate_round_trips_through_decode() {
 let issuer = Name {
 rdns: vec![vec![AttributeTypeAndValue { oid: OID_O.into(), value: "Acme Root".into() }]],
 };
 let subject = Name {
 rdns: vec![vec![AttributeTypeAndValue { oid: OID_CN.into(), value: "host1.example.org".into() }]],
 };
 let mut alg = encode_oid("1.3.101.112");
 alg.extend(encode_tlv(dtag::NULL, &[]));
 let alg_der = encode_sequence(&alg);
 let mut bit_string_content = vec![0u8];
 bit_string_content.extend_from_slice(&[0x33u8; 32]);
 let spki_der = encode_sequence(&[alg_der, encode_tlv(dtag::BIT_STRING, &bit_string_content)].concat());

 let not_before = chrono::DateTime::parse_from_rfc3339("2026-01-01T00:00:00+00:00").unwrap().with_timezone(&chrono::Utc);
 let not_after = chrono::DateTime::parse_from_rfc3339("2027-01-01T00:00:00+00:00").unwrap().with_timezone(&chrono::Utc);

 let extensions = vec![Extension {
 oid: "2.5.29.19".into(),
 critical: true,
 value_der: encode_sequence(&[]),
 }];

 let tbs = encode_tbs_certificate("2a", "1.2.840.10045.4.3.2", &issuer, not_before, not_after, &subject, &spki_der, &extensions);
 let der = encode_certificate(&tbs, "1.2.840.10045.4.3.2", &[0xAB; 64]);

 let cert = decode(&der).unwrap();
 assert_eq!(cert.version, 2);
 assert_eq!(cert.serial_hex, "2a");
 assert_eq!(cert.issuer.to_display_string(), "O=Acme Root");
 assert_eq!(cert.subject.to_display_string(), "CN=host1.example.org");
 }
}
