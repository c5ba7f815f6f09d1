use crate::error::ShortenerError;
use hashlink_core::{
    parse_short_id, BatchRequest, CorrelationId, FullUrl, ShortId, Storage, User,
};
use std::sync::Arc;

type Result<T> = std::result::Result<T, ShortenerError>;

/// A stored URL as presented to users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPair {
    pub short_url: String,
    pub original_url: String,
}

/// Front door to a [`Storage`] for request handlers.
///
/// It validates input, parses short id text and renders short ids as links
/// under `base_url`. Ownership is whatever [`User`] the caller resolved.
#[derive(Debug)]
pub struct ShortenerService<S: ?Sized> {
    storage: Arc<S>,
    base_url: String,
}

impl<S: ?Sized> Clone for ShortenerService<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            base_url: self.base_url.clone(),
        }
    }
}

impl<S: Storage> ShortenerService<S> {
    pub fn new(storage: S, base_url: impl Into<String>) -> Self {
        Self::from_arc(Arc::new(storage), base_url)
    }
}

impl<S: Storage + ?Sized> ShortenerService<S> {
    /// Wraps a shared storage, e.g. the `Arc<dyn Storage>` from `hashlink_storage::open`.
    pub fn from_arc(storage: Arc<S>, base_url: impl Into<String>) -> Self {
        Self {
            storage,
            base_url: base_url.into(),
        }
    }

    /// Renders a short id as a link.
    pub fn short_url(&self, id: ShortId) -> String {
        id.to_url(&self.base_url)
    }

    fn validate_url(url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(ShortenerError::InvalidUrl("URL cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Stores `url` for `user` and returns its short link.
    pub async fn shorten(&self, user: User, url: &str) -> Result<String> {
        Self::validate_url(url)?;
        let id = self.storage.put(user, FullUrl::new(url)).await?;
        Ok(self.short_url(id))
    }

    /// Stores a batch and returns short links in request order.
    ///
    /// Items whose short id is held by a different URL are missing from the
    /// result, without an error.
    pub async fn shorten_batch(
        &self,
        user: User,
        items: Vec<(CorrelationId, String)>,
    ) -> Result<Vec<(CorrelationId, String)>> {
        for (_, url) in &items {
            Self::validate_url(url)?;
        }

        let order: Vec<CorrelationId> = items.iter().map(|(id, _)| id.clone()).collect();
        let batch: BatchRequest = items
            .into_iter()
            .map(|(correlation_id, url)| (correlation_id, FullUrl::new(url)))
            .collect();

        let mut stored = self.storage.put_batch(user, batch).await?;

        Ok(order
            .into_iter()
            .filter_map(|correlation_id| {
                let id = stored.remove(&correlation_id)?;
                Some((correlation_id, self.short_url(id)))
            })
            .collect())
    }

    /// Resolves the text form of a short id.
    pub async fn resolve(&self, short_id: &str) -> Result<FullUrl> {
        let id = parse_short_id(short_id)?;
        Ok(self.storage.get(id).await?)
    }

    /// Lists the user's live URLs ordered by short id.
    pub async fn list(&self, user: User) -> Result<Vec<UrlPair>> {
        let mut saved: Vec<(ShortId, FullUrl)> =
            self.storage.list_by_user(user).await?.into_iter().collect();
        saved.sort_by_key(|(id, _)| *id);

        Ok(saved
            .into_iter()
            .map(|(id, url)| UrlPair {
                short_url: self.short_url(id),
                original_url: url.into_inner(),
            })
            .collect())
    }

    /// Parses every id, then queues their deletion.
    pub async fn delete<T: AsRef<str>>(&self, user: User, short_ids: &[T]) -> Result<()> {
        let ids = short_ids
            .iter()
            .map(|text| parse_short_id(text.as_ref()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(self.storage.delete_urls(user, ids).await?)
    }

    pub async fn new_user(&self) -> Result<User> {
        Ok(self.storage.new_user().await?)
    }

    pub async fn ping(&self) -> bool {
        self.storage.ping().await
    }

    /// Waits for queued backend work, e.g. before the process exits.
    pub async fn flush(&self) -> Result<()> {
        Ok(self.storage.flush().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashlink_core::StorageError;
    use hashlink_storage::InMemoryStorage;

    const BASE_URL: &str = "http://localhost:8080";

    fn test_service() -> ShortenerService<InMemoryStorage> {
        ShortenerService::new(InMemoryStorage::new(), BASE_URL)
    }

    #[tokio::test]
    async fn shorten_returns_link_under_base_url() {
        let service = test_service();

        let link = service.shorten(User::ANONYMOUS, "https://example.com").await.unwrap();

        let id = FullUrl::new("https://example.com").short_id();
        assert_eq!(link, format!("{BASE_URL}/{id}"));
    }

    #[tokio::test]
    async fn shorten_rejects_empty_url() {
        let service = test_service();

        let err = service.shorten(User::ANONYMOUS, "").await.unwrap_err();
        assert!(matches!(err, ShortenerError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn resolve_round_trips() {
        let service = test_service();
        service.shorten(User::ANONYMOUS, "https://example.com").await.unwrap();

        let id = FullUrl::new("https://example.com").short_id().to_string();
        let url = service.resolve(&id).await.unwrap();

        assert_eq!(url.as_str(), "https://example.com");
    }

    #[tokio::test]
    async fn resolve_rejects_malformed_ids() {
        let service = test_service();

        let err = service.resolve("12ab").await.unwrap_err();
        assert!(matches!(
            err,
            ShortenerError::Storage(StorageError::InvalidShortId(_))
        ));

        let err = service.resolve("12").await.unwrap_err();
        assert_eq!(err, ShortenerError::Storage(StorageError::NotFound));
    }

    #[tokio::test]
    async fn batch_keeps_request_order() {
        let service = test_service();
        let user = service.new_user().await.unwrap();

        let links = service
            .shorten_batch(
                user,
                vec![
                    (CorrelationId::new("b"), "http://b".to_string()),
                    (CorrelationId::new("a"), "http://a".to_string()),
                    (CorrelationId::new("c"), "http://a".to_string()),
                ],
            )
            .await
            .unwrap();

        let order: Vec<&str> = links.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(order, ["b", "a", "c"]);
        assert_eq!(links[1].1, links[2].1);
    }

    #[tokio::test]
    async fn batch_rejects_empty_url_before_storing() {
        let service = test_service();
        let user = service.new_user().await.unwrap();

        let err = service
            .shorten_batch(
                user,
                vec![
                    (CorrelationId::new("a"), "http://a".to_string()),
                    (CorrelationId::new("b"), String::new()),
                ],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ShortenerError::InvalidUrl(_)));
        assert!(service.list(user).await.is_err());
    }

    #[tokio::test]
    async fn list_is_sorted_and_scoped() {
        let service = test_service();
        let user = service.new_user().await.unwrap();
        for url in ["http://one", "http://two", "http://three"] {
            service.shorten(user, url).await.unwrap();
        }
        service.shorten(User::ANONYMOUS, "http://other").await.unwrap();

        let listed = service.list(user).await.unwrap();

        assert_eq!(listed.len(), 3);
        let mut sorted = listed.clone();
        sorted.sort_by_key(|pair| {
            pair.short_url
                .rsplit('/')
                .next()
                .and_then(|id| id.parse::<u64>().ok())
        });
        assert_eq!(listed, sorted);
    }

    #[tokio::test]
    async fn list_for_anonymous_is_not_found() {
        let service = test_service();
        service.shorten(User::ANONYMOUS, "http://x").await.unwrap();

        assert_eq!(
            service.list(User::ANONYMOUS).await.unwrap_err(),
            ShortenerError::Storage(StorageError::NotFound)
        );
    }

    #[tokio::test]
    async fn delete_validates_ids_and_identity() {
        let service = test_service();
        let user = service.new_user().await.unwrap();

        let err = service.delete(user, &["1", "x"]).await.unwrap_err();
        assert!(matches!(
            err,
            ShortenerError::Storage(StorageError::InvalidShortId(_))
        ));

        let err = service.delete(User::ANONYMOUS, &["1"]).await.unwrap_err();
        assert!(matches!(
            err,
            ShortenerError::Storage(StorageError::InvalidUser(_))
        ));

        service.delete(user, &["1"]).await.unwrap();
    }

    #[tokio::test]
    async fn works_over_dyn_storage() {
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        let service = ShortenerService::from_arc(storage, BASE_URL);

        assert!(service.ping().await);
        assert_eq!(service.new_user().await.unwrap().get(), 1);
    }
}
