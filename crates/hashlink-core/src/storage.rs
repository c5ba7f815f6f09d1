use crate::error::Result;
use crate::short_id::{FullUrl, ShortId};
use crate::user::{CorrelationId, User};
use async_trait::async_trait;
use std::collections::HashMap;

/// Short id to URL mapping, either global or scoped to one user.
pub type SavedUrls = HashMap<ShortId, FullUrl>;

/// Batch insert input keyed by correlation id.
pub type BatchRequest = HashMap<CorrelationId, FullUrl>;

/// Batch insert output keyed by correlation id.
pub type BatchResponse = HashMap<CorrelationId, ShortId>;

/// The contract every persistence backend implements.
///
/// Calls that act on behalf of someone take the already-resolved [`User`];
/// [`User::ANONYMOUS`] stands for "no identity". Dropping a returned future
/// cancels the call, except for deletions accepted by [`Storage::delete_urls`].
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Resolves a short id.
    ///
    /// Fails with `NotFound` when the id was never stored and with `Deleted`
    /// when it was soft-deleted.
    async fn get(&self, id: ShortId) -> Result<FullUrl>;

    /// Stores `url` for `user` and returns its short id.
    ///
    /// Storing the same URL again succeeds with the same id. A different URL
    /// already owning the id fails with `Conflict` and leaves it untouched.
    async fn put(&self, user: User, url: FullUrl) -> Result<ShortId>;

    /// Stores every URL of a batch.
    ///
    /// Items colliding with a different stored URL are left out of the
    /// response without an error.
    async fn put_batch(&self, user: User, batch: BatchRequest) -> Result<BatchResponse>;

    /// Lists the live URLs owned by `user`.
    ///
    /// Fails with `NotFound` for the anonymous user or a user owning nothing.
    async fn list_by_user(&self, user: User) -> Result<SavedUrls>;

    /// Accepts a soft-delete request and returns without waiting for it.
    ///
    /// Fails with `InvalidUser` for the anonymous user. Accepted work is
    /// applied in the background and cannot be revoked.
    async fn delete_urls(&self, user: User, ids: Vec<ShortId>) -> Result<()>;

    /// Allocates a fresh user id.
    async fn new_user(&self) -> Result<User>;

    /// Liveness and readiness probe.
    async fn ping(&self) -> bool;

    /// Waits until work accepted so far has reached the backing store.
    ///
    /// Backends without background work have nothing to wait for.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
