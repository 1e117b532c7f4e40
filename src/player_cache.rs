use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use anyhow::Context as _;
use parking_lot::Mutex;
use tokio::{sync::oneshot::Receiver, time::Instant};
use tokio_stream::StreamExt as _;
use uuid::Uuid;

use crate::{FetchError, PlayerInfo, ProfileSource, Repaint};

struct Entry {
    info: Arc<PlayerInfo>,
    inserted: Instant,
}

#[derive(Default)]
struct Entries {
    map: HashMap<Uuid, Entry>,
    pending: HashSet<Uuid>,
}

impl Entries {
    fn insert(&mut self, id: Uuid, info: Arc<PlayerInfo>) {
        let entry = Entry {
            info,
            inserted: Instant::now(),
        };
        self.map.insert(id, entry);
    }

    fn complete(&mut self, id: Uuid, result: Result<PlayerInfo, FetchError>) {
        self.pending.remove(&id);
        match result {
            Ok(info) => self.insert(id, Arc::new(info)),
            Err(err) => tracing::warn!(%id, %err, "cannot fetch player info"),
        }
    }
}

/// Player info keyed by uuid, filled in the background.
///
/// Reads never wait on the network: a miss or a stale entry queues a fetch and
/// the answer shows up on a later read. Clones share the same cache.
#[derive(Clone)]
pub struct PlayerCache {
    entries: Arc<Mutex<Entries>>,
    source: Arc<dyn ProfileSource>,
    submit: flume::Sender<Uuid>,
    ttl: Duration,
}

impl PlayerCache {
    /// Starts the fetch worker on the current runtime, or the one from
    /// [`runtime::start`](crate::runtime::start).
    pub fn spawn(
        source: impl ProfileSource,
        ttl: Duration,
        repaint: impl Repaint + 'static,
    ) -> anyhow::Result<Self> {
        let handle = crate::runtime::handle()
            .context("no async runtime to run player info fetches on")?;

        let source: Arc<dyn ProfileSource> = Arc::new(source);
        let entries = Arc::new(Mutex::new(Entries::default()));
        let (submit, submit_rx) = flume::unbounded::<Uuid>();

        handle.spawn({
            let source = Arc::clone(&source);
            let entries = Arc::clone(&entries);
            async move {
                let mut stream = submit_rx.into_stream();

                while let Some(id) = stream.next().await {
                    let source = Arc::clone(&source);
                    let entries = Arc::clone(&entries);
                    let repaint = repaint.clone();

                    tokio::spawn(async move {
                        let result = source.profile(id).await;
                        entries.lock().complete(id, result);
                        repaint.repaint();
                    });
                }
            }
        });

        Ok(Self {
            entries,
            source,
            submit,
            ttl,
        })
    }

    /// Returns whatever is cached for `id`, stale or not.
    ///
    /// Queues a fetch when nothing is cached or the entry has outlived the
    /// ttl, unless one is already running for `id`.
    pub fn get(&self, id: Uuid) -> Option<Arc<PlayerInfo>> {
        let mut entries = self.entries.lock();

        let (found, expired) = match entries.map.get(&id) {
            Some(entry) => (
                Some(Arc::clone(&entry.info)),
                entry.inserted.elapsed() >= self.ttl,
            ),
            None => (None, true),
        };

        if expired && entries.pending.insert(id) {
            tracing::debug!(%id, "queueing player info fetch");
            if self.submit.send(id).is_err() {
                tracing::error!(%id, "player info worker is gone");
                entries.pending.remove(&id);
            }
        }

        found
    }

    pub fn peek(&self, id: Uuid) -> Option<Arc<PlayerInfo>> {
        self.entries
            .lock()
            .map
            .get(&id)
            .map(|entry| Arc::clone(&entry.info))
    }

    pub fn is_pending(&self, id: Uuid) -> bool {
        self.entries.lock().pending.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks a player up by name, always asking the api.
    ///
    /// A hit also refreshes the uuid keyed entry.
    pub async fn search(&self, name: &str) -> Result<Arc<PlayerInfo>, FetchError> {
        let info = Arc::new(self.source.search(name).await?);
        self.entries.lock().insert(info.uuid, Arc::clone(&info));
        Ok(info)
    }

    pub fn search_detached(
        &self,
        name: impl Into<String>,
    ) -> Receiver<Result<Arc<PlayerInfo>, FetchError>> {
        let this = self.clone();
        let name = name.into();
        crate::runtime::spawn(async move { this.search(&name).await })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    };

    use time::OffsetDateTime;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::{Ranking, Region};

    const TTL: Duration = Duration::from_secs(60);

    #[derive(Clone, Default)]
    struct FakeSource {
        profiles: Arc<AtomicUsize>,
        searches: Arc<AtomicUsize>,
        fail: Arc<AtomicBool>,
        gate: Option<Arc<Semaphore>>,
        answer_as: Option<Uuid>,
    }

    impl FakeSource {
        fn gated() -> (Self, Arc<Semaphore>) {
            let gate = Arc::new(Semaphore::new(0));
            let this = Self {
                gate: Some(Arc::clone(&gate)),
                ..Self::default()
            };
            (this, gate)
        }

        fn profiles(&self) -> usize {
            self.profiles.load(Ordering::SeqCst)
        }

        fn failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }
    }

    fn network_error() -> FetchError {
        let err = reqwest::Client::new()
            .get("not a url")
            .build()
            .unwrap_err();
        FetchError::Network(err)
    }

    fn record(id: Uuid, name: &str, points: u32) -> PlayerInfo {
        PlayerInfo {
            uuid: id,
            name: name.to_string(),
            rankings: vec![(
                "sword".to_string(),
                Ranking {
                    tier: 3,
                    pos: 0,
                    peak_tier: None,
                    peak_pos: None,
                    attained: OffsetDateTime::UNIX_EPOCH,
                    retired: false,
                },
            )],
            region: Region::NA,
            points,
            overall: 7,
            badges: vec![],
        }
    }

    #[async_trait::async_trait]
    impl ProfileSource for FakeSource {
        async fn profile(&self, id: Uuid) -> Result<PlayerInfo, FetchError> {
            let n = self.profiles.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(network_error());
            }
            Ok(record(self.answer_as.unwrap_or(id), "fetched", n as u32))
        }

        async fn search(&self, query: &str) -> Result<PlayerInfo, FetchError> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(FetchError::NotFound);
            }
            Ok(record(Uuid::from_u128(0xabc), query, 99))
        }
    }

    fn cache(source: &FakeSource) -> (PlayerCache, flume::Receiver<()>) {
        let (tx, rx) = flume::unbounded();
        (PlayerCache::spawn(source.clone(), TTL, tx).unwrap(), rx)
    }

    #[tokio::test]
    async fn miss_fetches_once_under_concurrent_reads() {
        let (source, gate) = FakeSource::gated();
        let (cache, settled) = cache(&source);
        let id = Uuid::from_u128(1);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| assert!(cache.get(id).is_none()));
            }
        });
        assert!(cache.is_pending(id));
        assert!(cache.get(id).is_none());

        gate.add_permits(1);
        settled.recv_async().await.unwrap();

        assert_eq!(source.profiles(), 1);
        assert!(!cache.is_pending(id));
        assert_eq!(cache.get(id).unwrap().points, 1);
        assert_eq!(source.profiles(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_entry_is_served_until_ttl() {
        let source = FakeSource::default();
        let (cache, settled) = cache(&source);
        let id = Uuid::from_u128(2);

        assert!(cache.get(id).is_none());
        settled.recv_async().await.unwrap();

        tokio::time::advance(TTL - Duration::from_secs(1)).await;
        for _ in 0..3 {
            assert_eq!(cache.get(id).unwrap().name, "fetched");
        }
        assert!(!cache.is_pending(id));
        assert_eq!(source.profiles(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_entry_is_served_while_refreshing() {
        let source = FakeSource::default();
        let (cache, settled) = cache(&source);
        let id = Uuid::from_u128(3);

        assert!(cache.get(id).is_none());
        settled.recv_async().await.unwrap();
        assert_eq!(cache.get(id).unwrap().points, 1);

        tokio::time::advance(TTL).await;
        assert_eq!(cache.get(id).unwrap().points, 1);
        assert!(cache.is_pending(id));
        assert_eq!(cache.get(id).unwrap().points, 1);

        settled.recv_async().await.unwrap();
        assert_eq!(source.profiles(), 2);
        assert_eq!(cache.get(id).unwrap().points, 2);
        assert_eq!(source.profiles(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_keeps_previous_entry() {
        let source = FakeSource::default();
        let (cache, settled) = cache(&source);
        let id = Uuid::from_u128(4);

        assert!(cache.get(id).is_none());
        settled.recv_async().await.unwrap();

        source.failing(true);
        tokio::time::advance(TTL).await;
        assert_eq!(cache.get(id).unwrap().points, 1);
        settled.recv_async().await.unwrap();

        assert!(!cache.is_pending(id));
        assert_eq!(cache.peek(id).unwrap().points, 1);

        // marker is cleared, so the next read tries again
        assert_eq!(cache.get(id).unwrap().points, 1);
        assert!(cache.is_pending(id));
        settled.recv_async().await.unwrap();
        assert_eq!(source.profiles(), 3);
    }

    #[tokio::test]
    async fn failed_fetch_leaves_entry_absent() {
        let source = FakeSource::default();
        source.failing(true);
        let (cache, settled) = cache(&source);
        let id = Uuid::from_u128(5);

        assert!(cache.get(id).is_none());
        settled.recv_async().await.unwrap();
        assert!(!cache.is_pending(id));
        assert!(cache.peek(id).is_none());
        assert!(cache.is_empty());

        assert!(cache.get(id).is_none());
        settled.recv_async().await.unwrap();
        assert_eq!(source.profiles(), 2);
    }

    #[tokio::test]
    async fn search_populates_uuid_entry() {
        let source = FakeSource::default();
        let (cache, _settled) = cache(&source);

        let found = cache.search("SomePlayer").await.unwrap();
        assert_eq!(found.name, "SomePlayer");

        let cached = cache.get(found.uuid).unwrap();
        assert!(Arc::ptr_eq(&found, &cached));
        assert!(!cache.is_pending(found.uuid));
        assert_eq!(source.profiles(), 0);

        cache.search("SomePlayer").await.unwrap();
        assert_eq!(source.searches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn search_failure_is_returned() {
        let source = FakeSource::default();
        source.failing(true);
        let (cache, _settled) = cache(&source);

        let err = cache.search_detached("nobody").await.unwrap().unwrap_err();
        assert!(matches!(err, FetchError::NotFound));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn search_overwrites_existing_entry() {
        let source = FakeSource::default();
        let (cache, settled) = cache(&source);
        let id = Uuid::from_u128(0xabc);

        assert!(cache.get(id).is_none());
        settled.recv_async().await.unwrap();
        assert_eq!(cache.get(id).unwrap().name, "fetched");

        cache.search("renamed").await.unwrap();
        assert_eq!(cache.get(id).unwrap().name, "renamed");
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn entry_is_keyed_by_requested_id() {
        let source = FakeSource {
            answer_as: Some(Uuid::from_u128(99)),
            ..FakeSource::default()
        };
        let (cache, settled) = cache(&source);
        let id = Uuid::from_u128(6);

        assert!(cache.get(id).is_none());
        settled.recv_async().await.unwrap();

        for _ in 0..3 {
            assert_eq!(cache.get(id).unwrap().uuid, Uuid::from_u128(99));
        }
        assert!(cache.peek(Uuid::from_u128(99)).is_none());
        assert_eq!(source.profiles(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn spawn_needs_a_runtime() {
        let err = PlayerCache::spawn(FakeSource::default(), TTL, ())
            .err()
            .expect("no runtime is running");
        assert!(err.to_string().contains("no async runtime"));
    }
}
