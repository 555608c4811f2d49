//! DER encoding helpers for the structures this crate produces: OCSP
//! responses, CertID, Extensions, and CertList (CRL) bodies.
//!
//! Content is assembled bottom-up into an internal buffer (each TLV's
//! length is known before its tag/length prefix is written, so there is no
//! back-patching), then copied once into the caller-supplied output buffer
//! via [`Encoder::write_into`] — the "sized upfront" step the OCSP responder
//! uses once it knows the final response length.

use super::der::tag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
 #[error("output buffer of {available} bytes is too small for {needed} bytes")]
 BufferTooSmall { needed: usize, available: usize },
}

/// Minimal DER length octets for `len`.
pub fn encode_length(len: usize) -> Vec<u8> {
 if len < 0x80 {
 vec![len as u8]
 } else {
 let mut be = len.to_be_bytes().to_vec();
 while be.first() == Some(&0) {
 be.remove(0);
 }
 let mut out = vec![0x80 | be.len() as u8];
 out.extend(be);
 out
 }
}

/// Wrap `content` in a tag/length/value triplet.
pub fn encode_tlv(tag: u8, content: &[u8]) -> Vec<u8> {
 let mut out = Vec::with_capacity(content.len() + 6);
 out.push(tag);
 out.extend(encode_length(content.len()));
 out.extend_from_slice(content);
 out
}

pub fn encode_octet_string(content: &[u8]) -> Vec<u8> {
 encode_tlv(tag::OCTET_STRING, content)
}

pub fn encode_sequence(content: &[u8]) -> Vec<u8> {
 encode_tlv(tag::SEQUENCE, content)
}

pub fn encode_context(n: u8, content: &[u8]) -> Vec<u8> {
 encode_tlv(tag::context(n), content)
}

/// Encode raw big-endian magnitude bytes as a DER INTEGER, adding a leading
/// `0x00` pad if the high bit would otherwise flip the sign.
pub fn encode_integer(magnitude: &[u8]) -> Vec<u8> {
 let mut trimmed: &[u8] = magnitude;
 while trimmed.len() > 1 && trimmed[0] == 0 {
 trimmed = &trimmed[1..];
 }
 let content: Vec<u8> = if trimmed.is_empty() {
 vec![0x00]
 } else if trimmed[0] & 0x80 != 0 {
 let mut v = vec![0x00];
 v.extend_from_slice(trimmed);
 v
 } else {
 trimmed.to_vec()
 };
 encode_tlv(tag::INTEGER, &content)
}

pub fn encode_enumerated(value: i32) -> Vec<u8> {
 encode_tlv(tag::ENUMERATED, &encode_integer(&value.to_be_bytes())[2..])
}

pub fn encode_generalized_time(dt: chrono::DateTime<chrono::Utc>) -> Vec<u8> {
 let text = dt.format("%Y%m%d%H%M%SZ").to_string();
 encode_tlv(tag::GENERALIZED_TIME, text.as_bytes())
}

/// Accumulates pre-built TLVs before a final sized copy into the caller's
/// buffer.
#[derive(Default)]
pub struct Encoder {
 buf: Vec<u8>,
}

impl Encoder {
 pub fn with_capacity(cap: usize) -> Self {
 Self {
 buf: Vec::with_capacity(cap),
 }
 }

 pub fn append(&mut self, bytes: &[u8]) -> &mut Self {
 self.buf.extend_from_slice(bytes);
 self
 }

 pub fn len(&self) -> usize {
 self.buf.len()
 }

 pub fn is_empty(&self) -> bool {
 self.buf.is_empty()
 }

 pub fn into_bytes(self) -> Vec<u8> {
 self.buf
 }

 /// Copy the assembled bytes into `out`, returning the number written.
 pub fn write_into(self, out: &mut [u8]) -> Result<usize, EncodeError> {
 if self.buf.len() > out.len() {
 return Err(EncodeError::BufferTooSmall {
 needed: self.buf.len(),
 available: out.len(),
 });
 }
 out[..self.buf.len()].copy_from_slice(&self.buf);
 Ok(self.buf.len())
 }
}

#[cfg(test)]
mod tests {
 use super::*;

 #[test]
 fn integer_pads_high_bit() {
 assert_eq!(encode_integer(&[0xFF]), vec![0x02, 0x02, 0x00, 0xFF]);
 assert_eq!(encode_integer(&[0x2A]), vec![0x02, 0x01, 0x2A]);
 assert_eq!(encode_integer(&[0x00, 0x00, 0x2A]), vec![0x02, 0x01, 0x2A]);
 }

 #[test]
 fn length_long_form_matches_der() {
 assert_eq!(encode_length(127), vec![127]);
 assert_eq!(encode_length(128), vec![0x81, 128]);
 assert_eq!(encode_length(256), vec![0x82, 0x01, 0x00]);
 }

 #[test]
 fn write_into_rejects_short_buffer() {
 let mut enc = Encoder::with_capacity(4);
 enc.append(&[1, 2, 3, 4, 5]);
 let mut out = [0u8; 3];
 assert!(matches!(
 enc.write_into(&mut out),
 Err(EncodeError::BufferTooSmall {.. })
 ));
 }
}
