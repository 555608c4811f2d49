//! Repository modules, one per entity.

pub mod ca_repository;
pub mod cert_repository;
pub mod crl_repository;
pub mod profile_repository;
pub mod publish_queue_repository;

pub use ca_repository::CaRepository;
pub use cert_repository::CertRepository;
pub use crl_repository::CrlRepository;
pub use profile_repository::ProfileRepository;
pub use publish_queue_repository::PublishQueueRepository;
