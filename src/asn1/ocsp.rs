//! RFC 6960 OCSP request decoder and response encoder.
//!
//! The request decoder returns offsets/slices into the caller's buffer
//! rather than an owned tree — the only allocations are the `CertID`
//! entries and extensions the nonce and response-cache logic needs. The
//! response side is a pure encoder: the responder builds a
//! `ResponseData`, signs its DER, then wraps it into the final
//! `OCSPResponse`.

use super::der::{expect_tag, read_header, tag, DecodeError};
use super::encode::{encode_context, encode_enumerated, encode_generalized_time, encode_integer, encode_sequence, encode_tlv};
use super::spki::decode_algorithm_identifier;

/// One `CertID` from a request's `requestList`, plus the raw bytes the
/// issuer-identity table matches against as a single lookup key.
#[derive(Debug, Clone)]
pub struct CertId {
 pub hash_algorithm_oid: String,
 pub issuer_name_hash: Vec<u8>,
 pub issuer_key_hash: Vec<u8>,
 pub serial_hex: String,
 /// Raw encoded `CertID` SEQUENCE, echoed back verbatim in the response.
 pub der: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct OcspRequest {
 pub version: i64,
 pub requests: Vec<CertId>,
 /// Raw content of the `[2] EXPLICIT Extensions`, if present.
 pub extensions_der: Option<Vec<u8>>,
 /// The `optionalSignature [0]`, if the requester signed the request.
 pub signature: Option<RequestSignature>,
}

/// A request's `Signature`: the algorithm, the raw signature bytes, any
/// certificates carried alongside it, and the exact `tbsRequest` bytes the
/// signature was computed over.
#[derive(Debug, Clone)]
pub struct RequestSignature {
 pub signature_algorithm_oid: String,
 pub signature: Vec<u8>,
 /// Raw DER of each `Certificate` in the optional `certs [0]` list, in
 /// request order.
 pub certs_der: Vec<Vec<u8>>,
 pub tbs_request_der: Vec<u8>,
}

fn decode_signature(bytes: &[u8], offset: usize, tbs_request_der: Vec<u8>) -> Result<RequestSignature, DecodeError> {
 let sig_seq = expect_tag(bytes, offset, tag::SEQUENCE)?;
 let (signature_algorithm_oid, _params, after_alg) = decode_algorithm_identifier(bytes, sig_seq.content_offset)?;

 let (signature, after_sig) = super::spki::decode_bit_string(bytes, after_alg)?;

 let mut certs_der = Vec::new();
 if after_sig < sig_seq.end_offset() {
 let certs_wrapper = expect_tag(bytes, after_sig, tag::context(0))?;
 let certs_list = expect_tag(bytes, certs_wrapper.content_offset, tag::SEQUENCE)?;
 let mut cpos = certs_list.content_offset;
 while cpos < certs_list.end_offset() {
 let cert = expect_tag(bytes, cpos, tag::SEQUENCE)?;
 certs_der.push(bytes[cpos..cert.end_offset()].to_vec());
 cpos = cert.end_offset();
 }
 }

 Ok(RequestSignature { signature_algorithm_oid, signature, certs_der, tbs_request_der })
}

fn decode_cert_id(bytes: &[u8], offset: usize) -> Result<(CertId, usize), DecodeError> {
 let seq = expect_tag(bytes, offset, tag::SEQUENCE)?;
 let (hash_algorithm_oid, _params, after_alg) = decode_algorithm_identifier(bytes, seq.content_offset)?;

 let name_hash_header = expect_tag(bytes, after_alg, tag::OCTET_STRING)?;
 let issuer_name_hash =
 bytes[name_hash_header.content_offset..name_hash_header.end_offset()].to_vec();

 let key_hash_header = expect_tag(bytes, name_hash_header.end_offset(), tag::OCTET_STRING)?;
 let issuer_key_hash =
 bytes[key_hash_header.content_offset..key_hash_header.end_offset()].to_vec();

 let serial_header = expect_tag(bytes, key_hash_header.end_offset(), tag::INTEGER)?;
 let serial_hex = super::der::integer_bytes_to_hex(
 &bytes[serial_header.content_offset..serial_header.end_offset()],
 );

 Ok((
 CertId {
 hash_algorithm_oid,
 issuer_name_hash,
 issuer_key_hash,
 serial_hex,
 der: bytes[offset..seq.end_offset()].to_vec(),
 },
 seq.end_offset(),
 ))
}

/// Decode an `OCSPRequest`: the `tbsRequest` plus, when present, the
/// outer `optionalSignature [0]`.
pub fn decode_request(bytes: &[u8]) -> Result<OcspRequest, DecodeError> {
 let outer = expect_tag(bytes, 0, tag::SEQUENCE)?;
 let tbs = expect_tag(bytes, outer.content_offset, tag::SEQUENCE)?;
 let tbs_request_der = bytes[outer.content_offset..tbs.end_offset()].to_vec();

 let mut pos = tbs.content_offset;
 let first = read_header(bytes, pos)?;

 let version = if first.tag == tag::context(0) {
 if first.length > 1 {
 return Err(DecodeError::Malformed(pos, "version encodes more than one byte"));
 }
 let version_header = expect_tag(bytes, first.content_offset, tag::INTEGER)?;
 let v = super::der::integer_to_i64(
 &bytes[version_header.content_offset..version_header.end_offset()],
 )?;
 pos = first.end_offset();
 v
 } else {
 0
 };

 // requestorName [1] EXPLICIT GeneralName OPTIONAL — skipped if present.
 let next = read_header(bytes, pos)?;
 if next.tag == tag::context(1) {
 pos = next.end_offset();
 }

 let request_list = expect_tag(bytes, pos, tag::SEQUENCE)?;
 let mut requests = Vec::new();
 let mut rpos = request_list.content_offset;
 while rpos < request_list.end_offset() {
 let req_seq = expect_tag(bytes, rpos, tag::SEQUENCE)?;
 let (cert_id, _after_cert_id) = decode_cert_id(bytes, req_seq.content_offset)?;
 requests.push(cert_id);
 rpos = req_seq.end_offset();
 }
 pos = request_list.end_offset();

 let extensions_der = if pos < tbs.end_offset() {
 let ext_header = expect_tag(bytes, pos, tag::context(2))?;
 Some(bytes[ext_header.content_offset..ext_header.end_offset()].to_vec())
 } else {
 None
 };

 let signature = if tbs.end_offset() < outer.end_offset() {
 let sig_wrapper = expect_tag(bytes, tbs.end_offset(), tag::context(0))?;
 Some(decode_signature(bytes, sig_wrapper.content_offset, tbs_request_der)?)
 } else {
 None
 };

 Ok(OcspRequest {
 version,
 requests,
 extensions_der,
 signature,
 })
}

/// `OCSPResponseStatus`, RFC 6960 §4.2.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
 Successful,
 MalformedRequest,
 InternalError,
 TryLater,
 SigRequired,
 Unauthorized,
}

impl ResponseStatus {
 fn enumerated_value(self) -> i32 {
 match self {
 ResponseStatus::Successful => 0,
 ResponseStatus::MalformedRequest => 1,
 ResponseStatus::InternalError => 2,
 ResponseStatus::TryLater => 3,
 ResponseStatus::SigRequired => 5,
 ResponseStatus::Unauthorized => 6,
 }
 }
}

/// Encode an `OCSPResponse` carrying no `responseBytes` — used for every
/// status except `successful`.
pub fn encode_error_response(status: ResponseStatus) -> Vec<u8> {
 assert_ne!(status, ResponseStatus::Successful, "successful responses must carry responseBytes");
 encode_sequence(&encode_enumerated(status.enumerated_value()))
}

#[derive(Debug, Clone)]
pub enum CertStatus {
 Good,
 Revoked {
 revocation_time: chrono::DateTime<chrono::Utc>,
 /// `CRLReason` value, omitted from the encoding when `None`.
 reason: Option<i32>,
 },
 Unknown,
}

/// One `SingleResponse`, ready to be assembled into a `ResponseData`.
#[derive(Debug, Clone)]
pub struct SingleResponse {
 /// Raw `CertID` DER, echoed back from the matching request entry.
 pub cert_id_der: Vec<u8>,
 pub status: CertStatus,
 pub this_update: chrono::DateTime<chrono::Utc>,
 pub next_update: Option<chrono::DateTime<chrono::Utc>>,
}

fn encode_cert_status(status: &CertStatus) -> Vec<u8> {
 match status {
 CertStatus::Good => encode_tlv(tag::context(0), &[]),
 CertStatus::Revoked { revocation_time, reason } => {
 let mut body = encode_generalized_time(*revocation_time);
 if let Some(r) = reason {
 body.extend(encode_context(0, &encode_enumerated(*r)));
 }
 // RevokedInfo is IMPLICIT [1]; the SEQUENCE tag is replaced, not nested.
 let mut out = vec![0xA1];
 out.extend(super::encode::encode_length(body.len()));
 out.extend(body);
 out
 }
 CertStatus::Unknown => encode_tlv(tag::context(2), &[]),
 }
}

fn encode_single_response(r: &SingleResponse) -> Vec<u8> {
 let mut body = r.cert_id_der.clone();
 body.extend(encode_cert_status(&r.status));
 body.extend(encode_generalized_time(r.this_update));
 if let Some(next) = r.next_update {
 body.extend(encode_context(0, &encode_generalized_time(next)));
 }
 encode_sequence(&body)
}

/// Build the `tbsResponseData` to be signed: `responderID` must already be a
/// fully encoded `ResponderID` CHOICE (`[1] Name` or `[2] KeyHash`).
pub fn encode_response_data(
 responder_id_der: &[u8],
 produced_at: chrono::DateTime<chrono::Utc>,
 responses: &[SingleResponse],
 response_extensions_der: Option<&[u8]>,
) -> Vec<u8> {
 let mut body = responder_id_der.to_vec();
 body.extend(encode_generalized_time(produced_at));
 let responses_body: Vec<u8> = responses.iter().flat_map(encode_single_response).collect();
 body.extend(encode_sequence(&responses_body));
 if let Some(ext) = response_extensions_der {
 body.extend(encode_context(1, ext));
 }
 encode_sequence(&body)
}

/// Wrap a signed `ResponseData` into the final `OCSPResponse`, given the
/// signer's algorithm OID and signature bytes, plus the caller-supplied
/// `tbsResponseData` it signed over.
pub fn encode_successful_response(
 tbs_response_data_der: &[u8],
 signature_algorithm_oid: &str,
 signature: &[u8],
) -> Vec<u8> {
 let mut alg = super::name::encode_oid(signature_algorithm_oid);
 alg.extend(encode_tlv(tag::NULL, &[]));
 let alg_der = encode_sequence(&alg);

 let mut sig_content = vec![0u8];
 sig_content.extend_from_slice(signature);
 let sig_bit_string = encode_tlv(tag::BIT_STRING, &sig_content);

 let basic_body = [tbs_response_data_der.to_vec(), alg_der, sig_bit_string].concat();
 let basic_response = encode_sequence(&basic_body);

 let response_bytes_body = [
 super::name::encode_oid("1.3.6.1.5.5.7.48.1.1"), // id-pkix-ocsp-basic
 encode_tlv(tag::OCTET_STRING, &basic_response),
 ]
.concat();
 let response_bytes = encode_sequence(&response_bytes_body);

 let outer_body = [
 encode_enumerated(ResponseStatus::Successful.enumerated_value()),
 encode_context(0, &response_bytes),
 ]
.concat();
 encode_sequence(&outer_body)
}

/// Encode a `ResponderID` as `[2] KeyHash` (SHA-1 of the responder's SPKI
/// BIT STRING content), the form used when no full certificate chain is
/// embedded in the response.
pub fn encode_responder_id_by_key_hash(key_hash: &[u8]) -> Vec<u8> {
 encode_context(2, &encode_tlv(tag::OCTET_STRING, key_hash))
}

#[allow(dead_code)]
fn encode_serial_for_tests(serial: &[u8]) -> Vec<u8> {
 encode_integer(serial)
}
