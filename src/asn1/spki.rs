//! Shared `AlgorithmIdentifier` / `SubjectPublicKeyInfo` / BIT STRING
//! decoding, used by both the CSR and Certificate decoders.

use super::der::{expect_tag, read_header, tag, DecodeError};

#[derive(Debug, Clone)]
pub struct SubjectPublicKeyInfo {
 pub algorithm_oid: String,
 pub algorithm_params: Option<Vec<u8>>,
 /// The BIT STRING content, unused-bits byte stripped.
 pub public_key: Vec<u8>,
 /// Full encoded SubjectPublicKeyInfo (AlgorithmIdentifier + BIT STRING).
 pub der: Vec<u8>,
}

pub fn decode_algorithm_identifier(
 bytes: &[u8],
 offset: usize,
) -> Result<(String, Option<Vec<u8>>, usize), DecodeError> {
 let seq = expect_tag(bytes, offset, tag::SEQUENCE)?;
 let oid_header = expect_tag(bytes, seq.content_offset, tag::OBJECT_IDENTIFIER)?;
 let oid = super::name::decode_oid_bytes(
 &bytes[oid_header.content_offset..oid_header.end_offset()],
 )?;
 let params = if oid_header.end_offset() < seq.end_offset() {
 let param_header = read_header(bytes, oid_header.end_offset())?;
 if param_header.tag == tag::NULL {
 None
 } else {
 Some(bytes[oid_header.end_offset()..seq.end_offset()].to_vec())
 }
 } else {
 None
 };
 Ok((oid, params, seq.end_offset()))
}

pub fn decode_bit_string(bytes: &[u8], offset: usize) -> Result<(Vec<u8>, usize), DecodeError> {
 let header = expect_tag(bytes, offset, tag::BIT_STRING)?;
 if header.length == 0 {
 return Err(DecodeError::Malformed(offset, "empty BIT STRING"));
 }
 let content = &bytes[header.content_offset + 1..header.end_offset()];
 Ok((content.to_vec(), header.end_offset()))
}

pub fn decode_spki(bytes: &[u8], offset: usize) -> Result<(SubjectPublicKeyInfo, usize), DecodeError> {
 let seq = expect_tag(bytes, offset, tag::SEQUENCE)?;
 let (algorithm_oid, algorithm_params, after_alg) =
 decode_algorithm_identifier(bytes, seq.content_offset)?;
 let (public_key, _after_key) = decode_bit_string(bytes, after_alg)?;
 Ok((
 SubjectPublicKeyInfo {
 algorithm_oid,
 algorithm_params,
 public_key,
 der: bytes[offset..seq.end_offset()].to_vec(),
 },
 seq.end_offset(),
 ))
}
