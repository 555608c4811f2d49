//! `clap`-derived subcommands for the testable CLI subset named in:
//! `enroll-cert`, `revoke-cert`, `unsuspend-cert`, `crl`, `new-crl`, `cacerts`.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "castellan")]
#[command(about = "Castellan certificate authority core CLI")]
pub struct Cli {
 #[command(subcommand)]
 pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
 /// Issue a certificate from a DER-encoded CSR file.
 EnrollCert {
 #[arg(long)]
 ca: String,
 #[arg(long)]
 profile: String,
 #[arg(long)]
 csr_path: String,
 #[arg(long)]
 requestor_id: Option<i32>,
 #[arg(long)]
 transaction_id: Option<String>,
 #[arg(long, default_value_t = true)]
 end_entity: bool,
 },
 /// Revoke a certificate by serial (hex).
 RevokeCert {
 #[arg(long)]
 ca: String,
 #[arg(long)]
 serial: String,
 /// `CRLReason` numeric value; 6 = certificateHold.
 #[arg(long)]
 reason: i32,
 #[arg(long)]
 force: bool,
 },
 /// Lift a certificateHold, returning the certificate to `Good`.
 UnsuspendCert {
 #[arg(long)]
 ca: String,
 #[arg(long)]
 serial: String,
 #[arg(long)]
 force: bool,
 },
 /// Fetch the most recently issued CRL for a CA.
 Crl {
 #[arg(long)]
 ca: String,
 },
 /// Generate and persist a fresh full CRL for a CA.
 NewCrl {
 #[arg(long)]
 ca: String,
 },
 /// Print the DER (base64) of every configured CA's own certificate.
 Cacerts,
}
