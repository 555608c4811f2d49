//! CLI entry point for the Castellan certificate authority core.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use castellan_ca::cli::{Cli, Commands};
use castellan_ca::config::CaConfig;
use castellan_ca::CaSystem;
use clap::Parser;

fn init_tracing() {
 tracing_subscriber::fmt()
.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
.init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
 init_tracing();

 let cli = Cli::parse();
 let config = CaConfig::load()?;
 let system = CaSystem::new(config).await?;

 match cli.command {
 Commands::EnrollCert {
 ca,
 profile,
 csr_path,
 requestor_id,
 transaction_id,
 end_entity,
 } => {
 let csr_der = std::fs::read(&csr_path)?;
 let cert = system
.enroll_cert(&ca, &profile, csr_der, requestor_id, transaction_id, end_entity)
.await?;
 tracing::info!(serial = %cert.serial_hex, ca = %ca, "certificate issued");
 println!("issued serial {} subject \"{}\"", cert.serial_hex, cert.subject_text);
 }

 Commands::RevokeCert { ca, serial, reason, force } => {
 let cert = system.revoke_cert(&ca, &serial, reason, None, force).await?;
 tracing::info!(serial = %cert.serial_hex, ca = %ca, reason, "certificate revoked");
 println!("revoked serial {} reason {}", cert.serial_hex, reason);
 }

 Commands::UnsuspendCert { ca, serial, force } => {
 let cert = system.unsuspend_cert(&ca, &serial, force).await?;
 println!("unsuspended serial {}", cert.serial_hex);
 }

 Commands::Crl { ca } => {
 let crl = system.crl(&ca).await?;
 println!("{}", BASE64.encode(&crl.der));
 }

 Commands::NewCrl { ca } => {
 let crl = system.new_crl(&ca, None).await?;
 tracing::info!(ca = %ca, crl_number = crl.crl_number, "CRL signed");
 println!("crl_number {} this_update {}", crl.crl_number, crl.this_update);
 }

 Commands::Cacerts => {
 system.health_check().await?;
 for (name, der) in system.cacerts().await? {
 println!("{name}: {}", BASE64.encode(&der));
 }
 }
 }

 Ok(())
}
