use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::data::{WordList, parse_wordlist};
use crate::error::{DrillError, Result};

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Where raw word-list text comes from.
#[async_trait]
pub trait TextSource: Send + Sync {
    async fn fetch(&self, location: &str) -> Result<String>;
}

/// Fetches `http(s)://` URLs with `reqwest`; anything else is read from disk.
#[derive(Clone)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextSource for HttpSource {
    async fn fetch(&self, location: &str) -> Result<String> {
        if location.starts_with("http://") || location.starts_with("https://") {
            let response = self
                .client
                .get(location)
                .send()
                .await
                .map_err(|err| DrillError::unavailable(location, err))?
                .error_for_status()
                .map_err(|err| DrillError::unavailable(location, err))?;
            return response
                .text()
                .await
                .map_err(|err| DrillError::unavailable(location, err));
        }
        let path = Path::new(location.strip_prefix("file://").unwrap_or(location));
        #[cfg(feature = "tokio")]
        let text = tokio::fs::read_to_string(path).await;
        #[cfg(not(feature = "tokio"))]
        let text = std::fs::read_to_string(path);
        text.map_err(|err| DrillError::unavailable(location, err))
    }
}

/// Loads word lists once per location and hands out shared copies afterwards.
///
/// Failed loads are not remembered, so the next request retries the fetch.
pub struct WordlistCache {
    source: Arc<dyn TextSource>,
    lists: RwLock<HashMap<String, Arc<WordList>>>,
}

impl WordlistCache {
    pub fn new(source: Arc<dyn TextSource>) -> Self {
        Self {
            source,
            lists: RwLock::new(HashMap::new()),
        }
    }

    pub fn http() -> Self {
        Self::new(Arc::new(HttpSource::new()))
    }

    pub async fn load(&self, location: &str) -> Result<Arc<WordList>> {
        let cached = self.lists.read().get(location).cloned();
        if let Some(list) = cached {
            return Ok(list);
        }
        let text = self.source.fetch(location).await.inspect_err(|err| {
            warn!(%location, error = %err, "word list fetch failed");
        })?;
        let list = Arc::new(parse_wordlist(location, &text)?);
        info!(%location, entries = list.len(), "word list loaded");
        let mut guard = self.lists.write();
        let cached = guard
            .entry(location.to_string())
            .or_insert_with(|| Arc::clone(&list));
        Ok(Arc::clone(cached))
    }

    pub fn is_cached(&self, location: &str) -> bool {
        self.lists.read().contains_key(location)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory sources keyed by location; counts every fetch.
    #[derive(Default)]
    pub(crate) struct StaticSource {
        pub(crate) texts: RwLock<HashMap<String, String>>,
        pub(crate) fetches: AtomicUsize,
    }

    impl StaticSource {
        pub(crate) fn with(location: &str, text: &str) -> Self {
            let source = Self::default();
            source.insert(location, text);
            source
        }

        pub(crate) fn insert(&self, location: &str, text: &str) {
            self.texts
                .write()
                .insert(location.to_string(), text.to_string());
        }
    }

    #[async_trait]
    impl TextSource for StaticSource {
        async fn fetch(&self, location: &str) -> Result<String> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.texts
                .read()
                .get(location)
                .cloned()
                .ok_or_else(|| DrillError::unavailable(location, "404 Not Found"))
        }
    }

    #[tokio::test]
    async fn lists_are_fetched_once_per_location() {
        let source = Arc::new(StaticSource::with("B2.txt", "SID\tWORD\n1\tacid\n"));
        let cache = WordlistCache::new(source.clone());
        let first = cache.load("B2.txt").await.unwrap();
        let second = cache.load("B2.txt").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert!(cache.is_cached("B2.txt"));
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let source = Arc::new(StaticSource::default());
        let cache = WordlistCache::new(source.clone());
        let err = cache.load("C1.txt").await.unwrap_err();
        assert!(matches!(err, DrillError::DataUnavailable { .. }));
        assert!(!cache.is_cached("C1.txt"));

        source.insert("C1.txt", "SID\tWORD\n1\tabolish\n");
        let list = cache.load("C1.txt").await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn local_files_are_read_from_disk() {
        let path = std::env::temp_dir().join(format!("cefr-drill-{}.csv", std::process::id()));
        std::fs::write(&path, "SID,WORD\n4,adapt\n").unwrap();
        let location = path.to_string_lossy().to_string();
        let text = HttpSource::new().fetch(&location).await.unwrap();
        std::fs::remove_file(&path).ok();
        assert!(text.contains("adapt"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn file_urls_load_on_a_single_threaded_runtime() {
        let path = std::env::temp_dir().join(format!("cefr-drill-url-{}.txt", std::process::id()));
        std::fs::write(&path, "SID\tWORD\n7\tabsorb\n").unwrap();
        let location = format!("file://{}", path.to_string_lossy());
        let cache = WordlistCache::http();
        let (list, ticks) = tokio::join!(cache.load(&location), async {
            tokio::task::yield_now().await;
            1
        });
        std::fs::remove_file(&path).ok();
        let list = list.unwrap();
        assert_eq!(ticks, 1);
        assert_eq!(list.get(7).map(|entry| entry.word.as_str()), Some("absorb"));
    }

    #[tokio::test]
    async fn missing_local_file_is_unavailable() {
        let err = HttpSource::new()
            .fetch("file:///definitely/not/here.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, DrillError::DataUnavailable { .. }));
    }
}
