//! In-memory spectrogram cache with single-flight computation
//!
//! Each track identifier owns a slot holding a [`OnceCell`]. Concurrent misses
//! for the same identifier share the slot, so exactly one of them runs the
//! computation while the others wait for its result. Failed computations leave
//! nothing behind and are retried on the next request. Entries live for the
//! lifetime of the cache; there is no eviction.

use crate::transform::Spectrogram;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OnceCell;

type Slot = Arc<OnceCell<Arc<Spectrogram>>>;

/// Result of [`SpectrogramCache::get_or_compute`]
#[derive(Debug, Clone)]
pub struct Lookup {
    pub spectrogram: Arc<Spectrogram>,
    /// This call ran the computation
    pub computed: bool,
}

#[derive(Default)]
pub struct SpectrogramCache {
    slots: Mutex<HashMap<String, Slot>>,
}

impl SpectrogramCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Completed spectrogram for `id`, if any
    pub fn get(&self, id: &str) -> Option<Arc<Spectrogram>> {
        self.slots().get(id).and_then(|slot| slot.get().cloned())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Insert or overwrite the entry for `id`
    pub fn store(&self, id: &str, spectrogram: Spectrogram) -> Arc<Spectrogram> {
        let spectrogram = Arc::new(spectrogram);
        let slot = Arc::new(OnceCell::new_with(Some(spectrogram.clone())));
        self.slots().insert(id.to_string(), slot);
        spectrogram
    }

    /// Number of completed entries
    pub fn len(&self) -> usize {
        self.slots().values().filter(|slot| slot.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the cached spectrogram for `id` or run `compute` exactly once
    /// across all concurrent callers
    ///
    /// On error nothing is cached; a waiter that was queued behind the failed
    /// attempt runs `compute` itself.
    pub async fn get_or_compute<F, Fut, E>(&self, id: &str, compute: F) -> Result<Lookup, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Spectrogram, E>>,
    {
        let slot = self.slots().entry(id.to_string()).or_default().clone();

        let mut computed = false;
        let result = slot
            .get_or_try_init(|| {
                computed = true;
                async move { compute().await.map(Arc::new) }
            })
            .await
            .cloned();

        match result {
            Ok(spectrogram) => Ok(Lookup {
                spectrogram,
                computed,
            }),
            Err(e) => {
                self.discard_if_idle(id, &slot);
                Err(e)
            }
        }
    }

    /// Drop an uninitialized slot once no other caller holds it
    fn discard_if_idle(&self, id: &str, slot: &Slot) {
        let mut slots = self.slots();
        let idle = slots
            .get(id)
            .is_some_and(|current| Arc::ptr_eq(current, slot) && !current.initialized() && Arc::strong_count(current) == 2);
        if idle {
            slots.remove(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::SpectralFrame;
    use crate::config::BAND_COUNT;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn spectrogram(fill: u8, frames: usize) -> Spectrogram {
        Spectrogram::new(vec![SpectralFrame::new([fill; BAND_COUNT]); frames], false)
    }

    #[test]
    fn test_store_and_get() {
        let cache = SpectrogramCache::new();
        assert!(cache.get("a").is_none());
        assert!(cache.is_empty());

        cache.store("a", spectrogram(1, 2));
        assert_eq!(cache.get("a").unwrap().len(), 2);
        assert!(cache.contains("a"));

        cache.store("a", spectrogram(2, 3));
        assert_eq!(cache.get("a").unwrap().len(), 3);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_second_lookup_is_cached() {
        let cache = SpectrogramCache::new();
        let calls = AtomicUsize::new(0);

        let first = cache
            .get_or_compute("id", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ()>(spectrogram(5, 4))
            })
            .await
            .unwrap();
        let second = cache
            .get_or_compute("id", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ()>(spectrogram(9, 1))
            })
            .await
            .unwrap();

        assert!(first.computed);
        assert!(!second.computed);
        assert!(Arc::ptr_eq(&first.spectrogram, &second.spectrogram));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let cache = SpectrogramCache::new();

        let err = cache
            .get_or_compute("bad", || async { Err::<Spectrogram, _>("boom") })
            .await
            .unwrap_err();
        assert_eq!(err, "boom");
        assert!(cache.get("bad").is_none());
        assert!(cache.slots().is_empty());

        let retry = cache
            .get_or_compute("bad", || async { Ok::<_, &str>(spectrogram(1, 1)) })
            .await
            .unwrap();
        assert!(retry.computed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_waiter_recomputes_after_failed_leader() {
        let cache = Arc::new(SpectrogramCache::new());

        let leader = tokio::spawn({
            let cache = cache.clone();
            async move {
                cache
                    .get_or_compute("flaky", || async {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Err::<Spectrogram, _>("renderer crashed")
                    })
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let waiter = tokio::spawn({
            let cache = cache.clone();
            async move {
                cache
                    .get_or_compute("flaky", || async { Ok::<_, &str>(spectrogram(4, 2)) })
                    .await
            }
        });

        assert_eq!(leader.await.unwrap().unwrap_err(), "renderer crashed");
        let recovered = waiter.await.unwrap().unwrap();

        assert!(recovered.computed);
        assert_eq!(recovered.spectrogram.len(), 2);
        assert!(Arc::ptr_eq(&cache.get("flaky").unwrap(), &recovered.spectrogram));
        assert_eq!(cache.slots().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_compute_once() {
        let cache = Arc::new(SpectrogramCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute("shared", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<_, ()>(spectrogram(3, 7))
                    })
                    .await
                    .unwrap()
            }));
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(results.iter().filter(|r| r.computed).count(), 1);
        for r in &results {
            assert!(Arc::ptr_eq(&r.spectrogram, &results[0].spectrogram));
        }
    }
}
