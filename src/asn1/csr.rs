//! PKCS#10 `CertificationRequest` (RFC 2986) decoder.

use super::der::{expect_tag, read_header, tag, DecodeError};
use super::name::{decode_name, Name};
use super::spki::{decode_algorithm_identifier, decode_bit_string, decode_spki, SubjectPublicKeyInfo};

pub const OID_EXTENSION_REQUEST: &str = "1.2.840.113549.1.9.14";
pub const OID_CHALLENGE_PASSWORD: &str = "1.2.840.113549.1.9.7";
/// DhSigStatic attribute carrying the (issuer, serial) reference used to
/// resolve a key-agreement key pair for DH-based POP.
pub const OID_DH_SIG_STATIC: &str = "1.3.6.1.5.5.7.9.9.9";

#[derive(Debug, Clone, Default)]
pub struct CsrAttributes {
 pub extension_request_der: Option<Vec<u8>>,
 pub challenge_password: Option<String>,
 pub dh_sig_static: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct CertificationRequest {
 pub version: i64,
 pub subject: Name,
 pub spki: SubjectPublicKeyInfo,
 pub attributes: CsrAttributes,
 pub signature_algorithm_oid: String,
 /// The signature BIT STRING content, unused-bits byte stripped.
 pub signature: Vec<u8>,
 /// Raw DER of `certificationRequestInfo`, the bytes the signature covers.
 pub tbs_der: Vec<u8>,
}

fn decode_attributes(bytes: &[u8], offset: usize, end: usize) -> Result<CsrAttributes, DecodeError> {
 let mut attrs = CsrAttributes::default();
 let mut pos = offset;
 while pos < end {
 let attr_seq = expect_tag(bytes, pos, tag::SEQUENCE)?;
 let oid_header = expect_tag(bytes, attr_seq.content_offset, tag::OBJECT_IDENTIFIER)?;
 let oid = super::name::decode_oid_bytes(
 &bytes[oid_header.content_offset..oid_header.end_offset()],
 )?;
 let values_header = expect_tag(bytes, oid_header.end_offset(), tag::SET)?;

 match oid.as_str() {
 OID_EXTENSION_REQUEST => {
 if values_header.length > 0 {
 let ext_seq_header = read_header(bytes, values_header.content_offset)?;
 attrs.extension_request_der = Some(
 bytes[values_header.content_offset..ext_seq_header.end_offset()].to_vec(),
 );
 }
 }
 OID_CHALLENGE_PASSWORD => {
 if values_header.length > 0 {
 let str_header = read_header(bytes, values_header.content_offset)?;
 attrs.challenge_password = Some(
 String::from_utf8_lossy(
 &bytes[str_header.content_offset..str_header.end_offset()],
 )
.into_owned(),
 );
 }
 }
 OID_DH_SIG_STATIC => {
 attrs.dh_sig_static =
 Some(bytes[values_header.content_offset..values_header.end_offset()].to_vec());
 }
 _ => {}
 }
 pos = attr_seq.end_offset();
 }
 Ok(attrs)
}

/// Decode a DER-encoded `CertificationRequest`.
pub fn decode(bytes: &[u8]) -> Result<CertificationRequest, DecodeError> {
 let outer = expect_tag(bytes, 0, tag::SEQUENCE)?;
 let tbs_seq = expect_tag(bytes, outer.content_offset, tag::SEQUENCE)?;
 let tbs_der = bytes[outer.content_offset..tbs_seq.end_offset()].to_vec();

 let version_header = expect_tag(bytes, tbs_seq.content_offset, tag::INTEGER)?;
 let version = super::der::integer_to_i64(
 &bytes[version_header.content_offset..version_header.end_offset()],
 )?;

 let (subject, after_subject) = decode_name(bytes, version_header.end_offset())?;
 let (spki, after_spki) = decode_spki(bytes, after_subject)?;

 let attributes = if after_spki < tbs_seq.end_offset() {
 let attrs_header = expect_tag(bytes, after_spki, tag::context(0))?;
 decode_attributes(bytes, attrs_header.content_offset, attrs_header.end_offset())?
 } else {
 CsrAttributes::default()
 };

 let (signature_algorithm_oid, _params, after_sig_alg) =
 decode_algorithm_identifier(bytes, tbs_seq.end_offset())?;
 let (signature, _after_sig) = decode_bit_string(bytes, after_sig_alg)?;

 Ok(CertificationRequest {
 version,
 subject,
 spki,
 attributes,
 signature_algorithm_oid,
 signature,
 tbs_der,
 })
}

#[cfg(test)]
mod tests {
 use super::*;
 use crate::asn1::encode::{encode_octet_string, encode_sequence, encode_tlv};
 use crate::asn1::der::tag as dtag;
 use crate::asn1::name::{encode_name, encode_oid, AttributeTypeAndValue, OID_C, OID_CN, OID_O};

 fn build_minimal_csr(pubkey: &[u8]) -> Vec<u8> {
 let subject = Name {
 rdns: vec![
 vec![AttributeTypeAndValue {
 oid: OID_CN.into(),
 value: "host1.example.org".into(),
 }],
 vec![AttributeTypeAndValue {
 oid: OID_O.into(),
 value: "Acme".into(),
 }],
 vec![AttributeTypeAndValue {
 oid: OID_C.into(),
 value: "DE".into(),
 }],
 ],
 };
 let subject_der = encode_name(&subject);

 let mut alg = encode_oid("1.3.101.112");
 alg.extend(encode_tlv(dtag::NULL, &[]));
 let alg_der = encode_sequence(&alg);

 let mut bit_string_content = vec![0u8];
 bit_string_content.extend_from_slice(pubkey);
 let spki_body = [alg_der.clone(), encode_tlv(dtag::BIT_STRING, &bit_string_content)].concat();
 let spki_der = encode_sequence(&spki_body);

 let version = crate::asn1::encode::encode_integer(&[0]);
 let attrs_der = encode_tlv(dtag::context(0), &[]);

 let tbs_body = [version, subject_der, spki_der, attrs_der].concat();
 let tbs_der = encode_sequence(&tbs_body);

 let mut sig_content = vec![0u8];
 sig_content.extend_from_slice(&[0xAA; 64]);
 let sig_bit_string = encode_tlv(dtag::BIT_STRING, &sig_content);

 let outer_body = [tbs_der, alg_der, sig_bit_string].concat();
 encode_sequence(&outer_body)
 }

 #[test]
 fn decodes_subject_and_spki() {
 let pubkey = [0x11u8; 32];
 let der = build_minimal_csr(&pubkey);
 let csr = decode(&der).unwrap();
 assert_eq!(csr.version, 0);
 assert_eq!(
 csr.subject.to_display_string(),
 "CN=host1.example.org,O=Acme,C=DE"
 );
 assert_eq!(csr.spki.public_key, pubkey);
 assert_eq!(csr.spki.algorithm_oid, "1.3.101.112");
 let _ = encode_octet_string(&[]);
 }
}
