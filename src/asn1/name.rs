//! X.501 `Name` (RDNSequence) decode/encode, restricted to the attribute
//! types this core needs to render and to carry through unchanged.

use super::der::{expect_tag, read_header, tag, DecodeError};
use super::encode::{encode_sequence, encode_tlv};

/// One `AttributeTypeAndValue` inside an RDN: commonName, organizationName,
/// organizationalUnitName, countryName, stateOrProvinceName, localityName,
/// emailAddress, serialNumber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeTypeAndValue {
 pub oid: String,
 pub value: String,
}

pub const OID_CN: &str = "2.5.4.3";
pub const OID_O: &str = "2.5.4.10";
pub const OID_OU: &str = "2.5.4.11";
pub const OID_C: &str = "2.5.4.6";
pub const OID_ST: &str = "2.5.4.8";
pub const OID_L: &str = "2.5.4.7";
pub const OID_EMAIL: &str = "1.2.840.113549.1.9.1";
pub const OID_SERIALNUMBER: &str = "2.5.4.5";

fn short_name(oid: &str) -> &str {
 match oid {
 OID_CN => "CN",
 OID_O => "O",
 OID_OU => "OU",
 OID_C => "C",
 OID_ST => "ST",
 OID_L => "L",
 OID_EMAIL => "emailAddress",
 OID_SERIALNUMBER => "SERIALNUMBER",
 other => other,
 }
}

/// A parsed subject/issuer Name: RDNs in the order they were encoded, each
/// RDN a (usually single-valued) list of attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Name {
 pub rdns: Vec<Vec<AttributeTypeAndValue>>,
}

impl Name {
 /// Render as `CN=...,O=...,C=...`, RDNs in encoded order as issued.
 pub fn to_display_string(&self) -> String {
 self.rdns
.iter()
.flat_map(|rdn| rdn.iter())
.map(|atv| format!("{}={}", short_name(&atv.oid), atv.value))
.collect::<Vec<_>>()
.join(",")
 }

 pub fn get_first(&self, oid: &str) -> Option<&str> {
 self.rdns
.iter()
.flat_map(|rdn| rdn.iter())
.find(|atv| atv.oid == oid)
.map(|atv| atv.value.as_str())
 }

 /// Truncate the rendered display string to `max_len` bytes, per the
 /// `X500NAME_MAXLEN` schema variable.
 pub fn truncated_display_string(&self, max_len: usize) -> String {
 let s = self.to_display_string();
 if s.len() <= max_len {
 return s;
 }
 let mut end = max_len;
 while end > 0 && !s.is_char_boundary(end) {
 end -= 1;
 }
 s[..end].to_string()
 }
}

/// Decode OID content bytes (the payload after tag+length) to dotted
/// decimal.
pub fn decode_oid_bytes(content: &[u8]) -> Result<String, DecodeError> {
 if content.is_empty() {
 return Err(DecodeError::Malformed(0, "empty OID"));
 }
 let first = content[0];
 let mut parts = vec![(first / 40) as u64, (first % 40) as u64];
 let mut value: u64 = 0;
 for &b in &content[1..] {
 value = (value << 7) | (b & 0x7F) as u64;
 if b & 0x80 == 0 {
 parts.push(value);
 value = 0;
 }
 }
 Ok(parts
.into_iter()
.map(|p| p.to_string())
.collect::<Vec<_>>()
.join("."))
}

pub fn encode_oid(dotted: &str) -> Vec<u8> {
 let parts: Vec<u64> = dotted.split('.').map(|p| p.parse().unwrap_or(0)).collect();
 let mut content = Vec::new();
 if parts.len() >= 2 {
 content.push((parts[0] * 40 + parts[1]) as u8);
 for &p in &parts[2..] {
 if p == 0 {
 content.push(0);
 continue;
 }
 let mut stack = Vec::new();
 let mut v = p;
 while v > 0 {
 stack.push((v & 0x7F) as u8);
 v >>= 7;
 }
 stack.reverse();
 for (i, b) in stack.iter().enumerate() {
 if i + 1 < stack.len() {
 content.push(b | 0x80);
 } else {
 content.push(*b);
 }
 }
 }
 }
 encode_tlv(tag::OBJECT_IDENTIFIER, &content)
}

/// Decode a DER `Name` (the SEQUENCE OF RelativeDistinguishedName) starting
/// at `offset`. Unrecognized string tags are decoded as UTF-8 best-effort.
pub fn decode_name(bytes: &[u8], offset: usize) -> Result<(Name, usize), DecodeError> {
 let seq = expect_tag(bytes, offset, tag::SEQUENCE)?;
 let end = seq.end_offset();
 let mut pos = seq.content_offset;
 let mut rdns = Vec::new();

 while pos < end {
 let rdn_set = expect_tag(bytes, pos, tag::SET)?;
 let rdn_end = rdn_set.end_offset();
 let mut rdn_pos = rdn_set.content_offset;
 let mut atvs = Vec::new();

 while rdn_pos < rdn_end {
 let atv_seq = expect_tag(bytes, rdn_pos, tag::SEQUENCE)?;
 let oid_header = expect_tag(bytes, atv_seq.content_offset, tag::OBJECT_IDENTIFIER)?;
 let oid = decode_oid_bytes(
 &bytes[oid_header.content_offset..oid_header.end_offset()],
 )?;
 let value_header = read_header(bytes, oid_header.end_offset())?;
 let value = String::from_utf8_lossy(
 &bytes[value_header.content_offset..value_header.end_offset()],
 )
.into_owned();
 atvs.push(AttributeTypeAndValue { oid, value });
 rdn_pos = atv_seq.end_offset();
 }
 rdns.push(atvs);
 pos = rdn_set.end_offset();
 }

 Ok((Name { rdns }, end))
}

/// Encode a [`Name`] back to DER, UTF8String-valued, RDN order preserved.
pub fn encode_name(name: &Name) -> Vec<u8> {
 let mut body = Vec::new();
 for rdn in &name.rdns {
 let mut rdn_body = Vec::new();
 for atv in rdn {
 let mut atv_body = encode_oid(&atv.oid);
 atv_body.extend(encode_tlv(0x0C /* UTF8String */, atv.value.as_bytes()));
 rdn_body.extend(encode_tlv(tag::SEQUENCE, &atv_body));
 }
 body.extend(encode_tlv(tag::SET, &rdn_body));
 }
 encode_sequence(&body)
}

#[cfg(test)]
mod tests {
 use super::*;

 fn build_name(pairs: &[(&str, &str)]) -> Vec<u8> {
 let name = Name {
 rdns: pairs
.iter()
.map(|(oid, v)| {
 vec![AttributeTypeAndValue {
 oid: oid.to_string(),
 value: v.to_string(),
 }]
 })
.collect(),
 };
 encode_name(&name)
 }

 #[test]
 fn round_trips_and_preserves_rdn_order() {
 let der = build_name(&[(OID_CN, "host1.example.org"), (OID_O, "Acme"), (OID_C, "DE")]);
 let (name, consumed) = decode_name(&der, 0).unwrap();
 assert_eq!(consumed, der.len());
 assert_eq!(
 name.to_display_string(),
 "CN=host1.example.org,O=Acme,C=DE"
 );
 }

 #[test]
 fn oid_round_trip() {
 for oid in [OID_CN, OID_O, "1.2.840.113549.1.9.14", "2.16.840.1.101.3.4.2.1"] {
 let encoded = encode_oid(oid);
 let header = expect_tag(&encoded, 0, tag::OBJECT_IDENTIFIER).unwrap();
 let decoded =
 decode_oid_bytes(&encoded[header.content_offset..header.end_offset()]).unwrap();
 assert_eq!(decoded, oid);
 }
 }

 #[test]
 fn truncates_to_max_len() {
 let der = build_name(&[(OID_CN, &"x".repeat(400))]);
 let (name, _) = decode_name(&der, 0).unwrap();
 assert_eq!(name.truncated_display_string(350).len(), 350);
 }
}
