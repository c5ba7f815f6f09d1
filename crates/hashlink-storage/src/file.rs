use crate::memory::InMemoryStorage;
use async_trait::async_trait;
use hashlink_core::{
    BatchRequest, BatchResponse, FullUrl, Result, SavedUrls, ShortId, Storage, StorageError, User,
};
use serde::{Deserialize, Serialize};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::{mpsc, oneshot};
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};
use typed_builder::TypedBuilder;

/// Settings for [`FileStorage`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct FileStorageConfig {
    /// Journal file; created when missing.
    #[builder(setter(into))]
    pub path: PathBuf,
    /// Subscribe to filesystem write notifications for the journal.
    ///
    /// When disabled, or when no watcher can be installed, the journal length
    /// is polled every `poll_interval` instead.
    #[builder(default = true)]
    pub watch: bool,
    #[builder(default = Duration::from_millis(100))]
    pub poll_interval: Duration,
    /// Messages buffered between callers and the journal writer.
    #[builder(default = 1024)]
    pub queue_capacity: usize,
}

/// One line of the journal file.
///
/// The field names are persisted layout and must stay stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalRecord {
    pub id: ShortId,
    pub url: FullUrl,
    pub user: User,
}

enum JournalMessage {
    Append(JournalRecord),
    Flush(oneshot::Sender<()>),
}

/// Storage backed by an append-only JSON-lines journal.
///
/// An [`InMemoryStorage`] answers every call. Successful writes are queued to
/// a background task that appends them to the journal, so durability is best
/// effort. The same task replays lines appended by any process sharing the
/// file, which makes the cache eventually consistent with the journal.
#[derive(Debug)]
pub struct FileStorage {
    inner: Arc<InMemoryStorage>,
    path: PathBuf,
    appender: mpsc::Sender<JournalMessage>,
}

impl FileStorage {
    /// Opens (or creates) the journal, replays it and starts the journal task.
    pub async fn open(config: FileStorageConfig) -> Result<Self> {
        let inner = Arc::new(InMemoryStorage::new());
        let mut journal = Journal {
            path: config.path.clone(),
            offset: 0,
            cache: Arc::clone(&inner),
        };
        journal.replay().await?;

        info!(
            path = %config.path.display(),
            offset = journal.offset,
            "file storage opened"
        );

        let feed = ChangeFeed::install(&config.path, config.watch, config.poll_interval);
        let (appender, messages) = mpsc::channel(config.queue_capacity.max(1));
        tokio::spawn(journal.run(messages, feed));

        Ok(Self {
            inner,
            path: config.path,
            appender,
        })
    }

    async fn record(&self, record: JournalRecord) {
        if self.appender.send(JournalMessage::Append(record)).await.is_err() {
            warn!(path = %self.path.display(), "journal task stopped, record kept in memory only");
        }
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get(&self, id: ShortId) -> Result<FullUrl> {
        self.inner.get(id).await
    }

    async fn put(&self, user: User, url: FullUrl) -> Result<ShortId> {
        let id = self.inner.put(user, url.clone()).await?;
        self.record(JournalRecord { id, url, user }).await;
        Ok(id)
    }

    async fn put_batch(&self, user: User, batch: BatchRequest) -> Result<BatchResponse> {
        let response = self.inner.put_batch(user, batch.clone()).await?;

        for (correlation_id, id) in &response {
            if let Some(url) = batch.get(correlation_id) {
                self.record(JournalRecord {
                    id: *id,
                    url: url.clone(),
                    user,
                })
                .await;
            }
        }

        Ok(response)
    }

    async fn list_by_user(&self, user: User) -> Result<SavedUrls> {
        self.inner.list_by_user(user).await
    }

    async fn delete_urls(&self, user: User, ids: Vec<ShortId>) -> Result<()> {
        self.inner.delete_urls(user, ids).await
    }

    async fn new_user(&self) -> Result<User> {
        self.inner.new_user().await
    }

    async fn ping(&self) -> bool {
        if !self.inner.ping().await {
            return false;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
        {
            Ok(_) => true,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "journal is not writable");
                false
            }
        }
    }

    async fn flush(&self) -> Result<()> {
        let stopped = || StorageError::Unavailable("journal task stopped".to_string());
        let (done, flushed) = oneshot::channel();
        self.appender
            .send(JournalMessage::Flush(done))
            .await
            .map_err(|_| stopped())?;
        flushed.await.map_err(|_| stopped())
    }
}

/// Signals that the journal may hold lines the cache has not seen.
enum ChangeFeed {
    Watch {
        _watcher: RecommendedWatcher,
        events: mpsc::UnboundedReceiver<()>,
    },
    Poll(Interval),
}

impl ChangeFeed {
    fn install(path: &Path, watch: bool, poll_interval: Duration) -> Self {
        if watch {
            match Self::watch(path) {
                Ok(feed) => return feed,
                Err(err) => warn!(
                    path = %path.display(),
                    error = %err,
                    "cannot watch journal, falling back to polling"
                ),
            }
        }

        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ChangeFeed::Poll(ticker)
    }

    fn watch(path: &Path) -> notify::Result<Self> {
        let (notifier, events) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
            match event {
                Ok(event) if is_write(&event.kind) => {
                    let _ = notifier.send(());
                }
                Ok(_) => {}
                Err(err) => warn!(error = %err, "journal watcher failed"),
            }
        })?;
        watcher.watch(path, RecursiveMode::NonRecursive)?;

        Ok(ChangeFeed::Watch {
            _watcher: watcher,
            events,
        })
    }

    fn is_polling(&self) -> bool {
        matches!(self, ChangeFeed::Poll(_))
    }

    /// Waits for the next signal; bursts of write events collapse into one.
    async fn changed(&mut self) {
        match self {
            ChangeFeed::Watch { events, .. } => {
                if events.recv().await.is_none() {
                    std::future::pending::<()>().await;
                }
                while events.try_recv().is_ok() {}
            }
            ChangeFeed::Poll(ticker) => {
                ticker.tick().await;
            }
        }
    }
}

fn is_write(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any)
    )
}

/// Background side of [`FileStorage`]: owns the replay offset.
struct Journal {
    path: PathBuf,
    /// Byte offset just past the last complete line applied to the cache.
    offset: u64,
    cache: Arc<InMemoryStorage>,
}

impl Journal {
    async fn run(mut self, mut messages: mpsc::Receiver<JournalMessage>, mut feed: ChangeFeed) {
        // lines written before the feed was installed
        if let Err(err) = self.replay().await {
            warn!(path = %self.path.display(), error = %err, "failed to replay journal");
        }

        loop {
            tokio::select! {
                message = messages.recv() => {
                    let Some(message) = message else { break };
                    self.handle(message, &mut messages).await;
                }
                _ = feed.changed() => {
                    if feed.is_polling() && !self.length_changed().await {
                        continue;
                    }
                    if let Err(err) = self.replay().await {
                        warn!(path = %self.path.display(), error = %err, "failed to replay journal");
                    }
                }
            }
        }

        debug!(path = %self.path.display(), "journal task stopped");
    }

    /// Handles `first` together with everything already queued behind it.
    ///
    /// Records are appended with a single flush; flush waiters are released
    /// only after that, so they observe every record queued before them.
    async fn handle(&self, first: JournalMessage, messages: &mut mpsc::Receiver<JournalMessage>) {
        let mut records = Vec::new();
        let mut waiters = Vec::new();

        let mut next = Some(first);
        while let Some(message) = next {
            match message {
                JournalMessage::Append(record) => records.push(record),
                JournalMessage::Flush(done) => waiters.push(done),
            }
            next = messages.try_recv().ok();
        }

        if !records.is_empty() {
            if let Err(err) = self.append(&records).await {
                warn!(path = %self.path.display(), error = %err, "failed to append to journal");
            }
        }

        for done in waiters {
            let _ = done.send(());
        }
    }

    async fn append(&self, records: &[JournalRecord]) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let mut writer = BufWriter::new(file);

        for record in records {
            let mut line = serde_json::to_vec(record)
                .map_err(|e| StorageError::InvalidData(e.to_string()))?;
            line.push(b'\n');
            writer.write_all(&line).await?;
        }

        writer.flush().await?;
        trace!(path = %self.path.display(), records = records.len(), "journal appended");
        Ok(())
    }

    async fn length_changed(&self) -> bool {
        match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata.len() != self.offset,
            Err(_) => true,
        }
    }

    /// Applies every complete line past `offset` to the cache.
    ///
    /// A journal shorter than `offset` was truncated and is read from the
    /// start again. Malformed lines and conflicting records are logged and
    /// skipped. A trailing line without a newline is left for the next pass.
    async fn replay(&mut self) -> Result<()> {
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)
            .await?;

        let len = file.metadata().await?.len();
        if len < self.offset {
            info!(
                path = %self.path.display(),
                len,
                offset = self.offset,
                "journal shrank, replaying from the start"
            );
            self.offset = 0;
        }

        file.seek(SeekFrom::Start(self.offset)).await?;
        let mut reader = BufReader::new(file);
        let mut line = Vec::new();
        let mut applied = 0usize;

        loop {
            line.clear();
            let read = reader.read_until(b'\n', &mut line).await?;
            if read == 0 || line.last() != Some(&b'\n') {
                break;
            }

            let line_offset = self.offset;
            self.offset += read as u64;
            if self.apply(line_offset, &line) {
                applied += 1;
            }
        }

        debug!(path = %self.path.display(), applied, offset = self.offset, "journal replayed");
        Ok(())
    }

    fn apply(&self, line_offset: u64, line: &[u8]) -> bool {
        if line.iter().all(u8::is_ascii_whitespace) {
            return false;
        }

        let record: JournalRecord = match serde_json::from_slice(line) {
            Ok(record) => record,
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    offset = line_offset,
                    error = %err,
                    "skipping malformed journal line"
                );
                return false;
            }
        };

        match self.cache.save(record.user, record.id, record.url) {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    offset = line_offset,
                    id = %record.id,
                    error = %err,
                    "skipping journal record"
                );
                false
            }
        }
    }
}
