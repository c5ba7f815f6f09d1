use async_trait::async_trait;
use hashlink_core::{
    BatchRequest, BatchResponse, FullUrl, Result, SavedUrls, ShortId, Storage, StorageError, User,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

/// Process-local storage; the reference semantics for every other backend.
///
/// One coarse reader/writer lock guards the per-user buckets. The anonymous
/// bucket always exists and holds every URL ever stored, which makes it the
/// global short id index. Soft deletion is not modelled here.
#[derive(Debug)]
pub struct InMemoryStorage {
    shorts: RwLock<HashMap<User, SavedUrls>>,
    users_count: AtomicU64,
}

impl InMemoryStorage {
    /// Creates an empty storage.
    pub fn new() -> Self {
        let mut shorts = HashMap::new();
        shorts.insert(User::ANONYMOUS, SavedUrls::new());
        Self {
            shorts: RwLock::new(shorts),
            users_count: AtomicU64::new(0),
        }
    }

    /// Stores `url` under an explicit short id on behalf of `user`.
    ///
    /// This is the path journal replay goes through: the id comes from the
    /// record rather than being recomputed. Conflict rules are those of
    /// [`Storage::put`].
    pub fn save(&self, user: User, id: ShortId, url: FullUrl) -> Result<()> {
        let mut shorts = self.shorts.write();
        self.save_locked(&mut shorts, user, id, url)
    }

    fn save_locked(
        &self,
        shorts: &mut HashMap<User, SavedUrls>,
        user: User,
        id: ShortId,
        url: FullUrl,
    ) -> Result<()> {
        let global = shorts.entry(User::ANONYMOUS).or_default();
        match global.get(&id) {
            Some(existing) if *existing != url => {
                trace!(%id, %user, "short id already owned by a different url");
                return Err(StorageError::Conflict(id));
            }
            Some(_) => {}
            None => {
                global.insert(id, url.clone());
            }
        }

        if !user.is_anonymous() {
            let bucket = shorts.entry(user).or_insert_with(|| {
                // buckets created by replay must never be handed out again
                self.users_count.fetch_max(user.get(), Ordering::SeqCst);
                SavedUrls::new()
            });
            bucket.insert(id, url);
        }

        Ok(())
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn get(&self, id: ShortId) -> Result<FullUrl> {
        let shorts = self.shorts.read();
        shorts
            .get(&User::ANONYMOUS)
            .and_then(|global| global.get(&id))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn put(&self, user: User, url: FullUrl) -> Result<ShortId> {
        let id = url.short_id();
        self.save(user, id, url)?;
        Ok(id)
    }

    async fn put_batch(&self, user: User, batch: BatchRequest) -> Result<BatchResponse> {
        let mut response = BatchResponse::with_capacity(batch.len());
        let mut shorts = self.shorts.write();

        for (correlation_id, url) in batch {
            let id = url.short_id();
            match self.save_locked(&mut shorts, user, id, url) {
                Ok(()) => {
                    response.insert(correlation_id, id);
                }
                Err(StorageError::Conflict(_)) => {
                    debug!(%correlation_id, %id, "dropping colliding batch item");
                }
                Err(err) => return Err(err),
            }
        }

        Ok(response)
    }

    async fn list_by_user(&self, user: User) -> Result<SavedUrls> {
        if user.is_anonymous() {
            return Err(StorageError::NotFound);
        }

        let shorts = self.shorts.read();
        shorts
            .get(&user)
            .filter(|bucket| !bucket.is_empty())
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn delete_urls(&self, user: User, ids: Vec<ShortId>) -> Result<()> {
        if user.is_anonymous() {
            return Err(StorageError::InvalidUser(
                "anonymous user cannot delete urls".to_string(),
            ));
        }

        debug!(%user, count = ids.len(), "in-memory storage ignores deletion");
        Ok(())
    }

    async fn new_user(&self) -> Result<User> {
        let next = self.users_count.fetch_add(1, Ordering::SeqCst) + 1;
        User::try_from(next)
    }

    async fn ping(&self) -> bool {
        true
    }
}
