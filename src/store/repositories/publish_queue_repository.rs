//! Publish queue repository: a (publisher, cert) pair appears at most
//! once, enqueued at issuance/revocation and removed after publication.

use std::sync::Arc;

use sqlx::PgPool;

use crate::errors::CaError;
use crate::store::dialect::SqlDialect;
use crate::store::models::PublishQueueRow;

pub struct PublishQueueRepository {
 pool: PgPool,
 dialect: Arc<dyn SqlDialect>,
}

impl PublishQueueRepository {
 pub fn new(pool: PgPool, dialect: Arc<dyn SqlDialect>) -> Self {
 Self { pool, dialect }
 }

 pub async fn add_to_publish_queue(&self, publisher_id: i32, ca_id: i32, cert_id: i64) -> Result<(), CaError> {
 sqlx::query(&self.dialect.translate(
 r#"
 INSERT INTO publish_queue (publisher_id, ca_id, cert_id)
 VALUES ($1, $2, $3)
 ON CONFLICT (publisher_id, cert_id) DO NOTHING
 "#,
 ))
.bind(publisher_id)
.bind(ca_id)
.bind(cert_id)
.execute(&self.pool)
.await
.map_err(|e| CaError::database_failure(format!("failed to enqueue publish entry: {e}")))?;
 Ok(())
 }

 pub async fn get_publish_queue_entries(
 &self,
 ca_id: i32,
 publisher_id: i32,
 limit: i64,
 ) -> Result<Vec<PublishQueueRow>, CaError> {
 sqlx::query_as::<_, PublishQueueRow>(
 &self.dialect.translate("SELECT * FROM publish_queue WHERE ca_id = $1 AND publisher_id = $2 ORDER BY cert_id LIMIT $3"),
 )
.bind(ca_id)
.bind(publisher_id)
.bind(limit)
.fetch_all(&self.pool)
.await
.map_err(|e| CaError::database_failure(format!("failed to read publish queue: {e}")))
 }

 pub async fn remove_from_publish_queue(&self, publisher_id: i32, cert_id: i64) -> Result<(), CaError> {
 sqlx::query(&self.dialect.translate("DELETE FROM publish_queue WHERE publisher_id = $1 AND cert_id = $2"))
.bind(publisher_id)
.bind(cert_id)
.execute(&self.pool)
.await
.map_err(|e| CaError::database_failure(format!("failed to remove publish entry: {e}")))?;
 Ok(())
 }

 pub async fn clear_publish_queue(&self, ca_id: Option<i32>, publisher_id: Option<i32>) -> Result<u64, CaError> {
 let result = match (ca_id, publisher_id) {
 (Some(ca), Some(publisher)) => {
 sqlx::query(&self.dialect.translate("DELETE FROM publish_queue WHERE ca_id = $1 AND publisher_id = $2"))
.bind(ca)
.bind(publisher)
.execute(&self.pool)
.await
 }
 (Some(ca), None) => {
 sqlx::query(&self.dialect.translate("DELETE FROM publish_queue WHERE ca_id = $1"))
.bind(ca)
.execute(&self.pool)
.await
 }
 (None, Some(publisher)) => {
 sqlx::query(&self.dialect.translate("DELETE FROM publish_queue WHERE publisher_id = $1"))
.bind(publisher)
.execute(&self.pool)
.await
 }
 (None, None) => {
 sqlx::query(&self.dialect.translate("DELETE FROM publish_queue")).execute(&self.pool).await
 }
 }
.map_err(|e| CaError::database_failure(format!("failed to clear publish queue: {e}")))?;
 Ok(result.rows_affected())
 }
}
