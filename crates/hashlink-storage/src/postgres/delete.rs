use hashlink_core::{ShortId, User};
use sqlx::PgPool;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

/// Upper bound on ids per soft-delete `UPDATE`.
pub const MAX_DELETE_CHUNK: usize = 100;

/// Soft-delete request accepted from a caller.
#[derive(Debug)]
pub(crate) struct DeleteRequest {
    pub user: User,
    pub ids: Vec<ShortId>,
}

pub(crate) enum DeleteJob {
    Delete(DeleteRequest),
    /// Acknowledged once every job queued before it has been applied.
    Flush(oneshot::Sender<()>),
}

/// Drains delete requests one at a time.
///
/// Each request is split into chunks of at most `chunk_size` ids with one
/// `UPDATE` per chunk. A failing chunk is logged and skipped; nothing is
/// retried and the original caller is never told.
pub(crate) struct DeleteWorker {
    pool: PgPool,
    chunk_size: usize,
}

impl DeleteWorker {
    pub fn new(pool: PgPool, chunk_size: usize) -> Self {
        Self {
            pool,
            chunk_size: clamp_chunk_size(chunk_size),
        }
    }

    pub async fn run(self, mut queue: mpsc::UnboundedReceiver<DeleteJob>) {
        while let Some(job) = queue.recv().await {
            match job {
                DeleteJob::Delete(request) => self.apply(request).await,
                DeleteJob::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        debug!("delete worker stopped");
    }

    async fn apply(&self, request: DeleteRequest) {
        let DeleteRequest { user, ids } = request;

        for (index, chunk) in delete_chunks(&ids, self.chunk_size).into_iter().enumerate() {
            let result = sqlx::query(
                r#"
                UPDATE urls
                SET isdeleted = TRUE
                FROM relations
                WHERE relations.short_id = urls.short_id
                  AND relations.user_id = $1
                  AND urls.short_id = ANY($2)
                "#,
            )
            .bind(user.as_i64())
            .bind(chunk)
            .execute(&self.pool)
            .await;

            match result {
                Ok(done) => trace!(
                    %user,
                    chunk = index,
                    rows = done.rows_affected(),
                    "delete chunk applied"
                ),
                Err(err) => warn!(%user, chunk = index, error = %err, "delete chunk failed"),
            }
        }
    }
}

fn clamp_chunk_size(chunk_size: usize) -> usize {
    chunk_size.clamp(1, MAX_DELETE_CHUNK)
}

/// Splits ids into `BIGINT` chunks of at most `chunk_size`.
///
/// Ids that do not fit a `BIGINT` were never stored and are left out.
fn delete_chunks(ids: &[ShortId], chunk_size: usize) -> Vec<Vec<i64>> {
    let keys: Vec<i64> = ids.iter().filter_map(|id| id.to_i64()).collect();
    keys.chunks(clamp_chunk_size(chunk_size))
        .map(<[i64]>::to_vec)
        .collect()
}
