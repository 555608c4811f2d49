//! Hand-rolled ASN.1 DER codec: a non-allocating tag/length reader, a
//! streaming encoder, and structural decoders/encoders for the wire
//! formats this core speaks — PKCS#10 CSRs, X.509 certificates, OCSP
//! requests/responses, and CRLs.

pub mod cert;
pub mod crl;
pub mod csr;
pub mod der;
pub mod encode;
pub mod name;
pub mod ocsp;
pub mod spki;

pub use der::DecodeError;
