//! Publish-queue fan-out: issuance and revocation report the certificates
//! they touch here; this module decides which configured publishers care
//! and enqueues one row per (publisher, certificate) pair. Draining the
//! queue and actually delivering entries to a publisher is outside this
//! crate.

use async_trait::async_trait;

use crate::config::PublisherConfig;
use crate::errors::CaError;
use crate::store::PublishQueueRepository;

/// The boundary `issuance::pipeline::issue_certificate` and
/// `revocation::{revoke_cert, unrevoke_cert, revoke_suspended}` call after
/// persisting a certificate state change.
#[async_trait]
pub trait PublishSink: Send + Sync {
 /// `good = true` for a newly issued or un-revoked certificate, `false`
 /// for a revocation.
 async fn enqueue(&self, ca_id: i32, cert_id: i64, good: bool) -> Result<(), CaError>;
}

/// Enqueues into the real `publish_queue` table, for every enabled
/// publisher that declares interest in the reported level.
pub struct Publishers {
 repo: PublishQueueRepository,
 publishers: Vec<PublisherConfig>,
}

impl Publishers {
 pub fn new(repo: PublishQueueRepository, publishers: Vec<PublisherConfig>) -> Self {
 Self { repo, publishers }
 }
}

#[async_trait]
impl PublishSink for Publishers {
 async fn enqueue(&self, ca_id: i32, cert_id: i64, good: bool) -> Result<(), CaError> {
 for publisher in &self.publishers {
 if !publisher.enabled {
 continue;
 }
 let interested = if good { publisher.publish_good } else { publisher.publish_revoked };
 if !interested {
 continue;
 }
 self.repo.add_to_publish_queue(publisher.id, ca_id, cert_id).await?;
 }
 Ok(())
 }
}

/// A sink that enqueues nothing, for tests that exercise issuance or
/// revocation without caring about downstream publication.
pub struct NoopPublishSink;

#[async_trait]
impl PublishSink for NoopPublishSink {
 async fn enqueue(&self, _ca_id: i32, _cert_id: i64, _good: bool) -> Result<(), CaError> {
 Ok(())
 }
}

#[cfg(test)]
mod tests {
 use super::*;

 struct RecordingSink {
 calls: std::sync::Mutex<Vec<(i32, i64, bool)>>,
 }

 #[async_trait]
 impl PublishSink for RecordingSink {
 async fn enqueue(&self, ca_id: i32, cert_id: i64, good: bool) -> Result<(), CaError> {
 self.calls.lock().unwrap().push((ca_id, cert_id, good));
 Ok(())
 }
 }

 #[tokio::test]
 async fn noop_sink_accepts_any_call() {
 let sink = NoopPublishSink;
 sink.enqueue(1, 2, true).await.unwrap();
 sink.enqueue(1, 2, false).await.unwrap();
 }

 #[tokio::test]
 async fn recording_sink_captures_calls() {
 let sink = RecordingSink { calls: std::sync::Mutex::new(Vec::new()) };
 sink.enqueue(1, 100, true).await.unwrap();
 sink.enqueue(1, 101, false).await.unwrap();
 let calls = sink.calls.lock().unwrap();
 assert_eq!(*calls, vec![(1, 100, true), (1, 101, false)]);
 }
}
