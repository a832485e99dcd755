//! Generation manager: issues caption requests and tracks them until they end.
//!
//! Every request follows the same bracket: pre-flight checks (backend exists
//! and is available), insertion into the in-flight table, the backend call,
//! removal from the table, delivery of exactly one result. Pre-flight failures
//! return before the table is touched.

use super::in_flight::{InFlightGuard, InFlightTable};
use super::task::{CaptionBatch, CaptionResult, CaptionTask, ResultSlot};
use crate::backend::Backend;
use crate::discovery::ImageSource;
use crate::error::{BackendError, CaptionError, CaptionerError};
use crate::registry::Registry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Semaphore};

/// Settings for the generation manager.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Maximum concurrent backend calls per batch
    pub parallel: usize,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self { parallel: 4 }
    }
}

/// Issues single and batched caption requests and supports cancelling them.
///
/// Cloning is cheap; clones share the registry and the in-flight table, so a
/// clone can cancel requests another clone started.
///
/// Asynchronous operations spawn tokio tasks and must be called from within
/// a tokio runtime.
#[derive(Clone)]
pub struct GenerationManager {
    registry: Arc<Registry>,
    in_flight: Arc<InFlightTable>,
    options: GenerateOptions,
}

impl GenerationManager {
    pub fn new(registry: Arc<Registry>, options: GenerateOptions) -> Self {
        Self {
            registry,
            in_flight: Arc::new(InFlightTable::default()),
            options,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Registered backend names, in registration order.
    pub fn list_backends(&self) -> Vec<String> {
        self.registry.list()
    }

    /// Number of requests currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_in_flight(&self, image_path: &Path) -> bool {
        self.in_flight.contains(image_path)
    }

    /// Resolve a backend and make sure it can be called.
    fn preflight(&self, backend_name: &str) -> Result<Arc<dyn Backend>, CaptionError> {
        let backend = self.registry.get(backend_name)?;
        if !backend.is_available() {
            return Err(CaptionError::BackendUnavailable(backend_name.to_string()));
        }
        Ok(backend)
    }

    /// Caption one image and wait for the text.
    ///
    /// The request is tracked like any other, so [`cancel`](Self::cancel)
    /// reaches it; a cancelled call returns a `Cancelled` backend error.
    pub async fn generate(
        &self,
        backend_name: &str,
        image_path: &Path,
        prompt: &str,
    ) -> Result<String, CaptionError> {
        let backend = self.preflight(backend_name)?;
        let guard = self.in_flight.try_insert(image_path)?;
        tracing::debug!("Captioning {:?} with {backend_name}", image_path);

        let outcome = run_call(backend.as_ref(), &guard, prompt).await;
        drop(guard);
        outcome.map_err(CaptionError::from)
    }

    /// Start captioning one image on its own task and return immediately.
    ///
    /// # Errors
    /// `NotFound`, `BackendUnavailable` or `AlreadyInFlight`, all before any
    /// work starts. Failures of the backend call itself arrive inside the
    /// task's [`CaptionResult`].
    pub fn generate_async(
        &self,
        backend_name: &str,
        image_path: &Path,
        prompt: &str,
    ) -> Result<CaptionTask, CaptionError> {
        let backend = self.preflight(backend_name)?;
        let guard = self.in_flight.try_insert(image_path)?;
        let cancel = guard.token().clone();
        let (tx, rx) = oneshot::channel();
        let prompt = prompt.to_string();

        tracing::debug!("Captioning {:?} with {backend_name} (async)", image_path);
        tokio::spawn(async move {
            let outcome = run_call(backend.as_ref(), &guard, &prompt).await;
            let image_path = guard.path().to_path_buf();
            // The entry must be gone before the result is observable.
            drop(guard);
            // The receiver may already be dropped; the result is simply discarded.
            let _ = tx.send(CaptionResult::from_outcome(image_path, outcome));
        });

        Ok(CaptionTask::new(image_path.to_path_buf(), cancel, rx))
    }

    /// Caption a batch of images with the configured worker pool size.
    pub fn generate_batch(
        &self,
        backend_name: &str,
        image_paths: Vec<PathBuf>,
        prompt: &str,
    ) -> Result<CaptionBatch, CaptionError> {
        self.generate_batch_with(backend_name, image_paths, prompt, self.options.parallel)
    }

    /// Caption a batch of images, at most `parallel` backend calls at a time.
    ///
    /// Every path is entered into the in-flight table up front, so a queued
    /// item can be cancelled before it ever reaches the backend. A path that
    /// is already in flight (or repeated within the batch) gets an
    /// `AlreadyInFlight` result. Either way the batch yields exactly one
    /// result per submitted path.
    ///
    /// # Errors
    /// `NotFound` or `BackendUnavailable`, before anything is submitted.
    pub fn generate_batch_with(
        &self,
        backend_name: &str,
        image_paths: Vec<PathBuf>,
        prompt: &str,
        parallel: usize,
    ) -> Result<CaptionBatch, CaptionError> {
        let backend = self.preflight(backend_name)?;
        let len = image_paths.len();
        // mpsc::channel panics on zero capacity.
        let (tx, rx) = mpsc::channel(len.max(1));
        let semaphore = Arc::new(Semaphore::new(parallel.max(1)));
        let prompt: Arc<str> = Arc::from(prompt);

        tracing::debug!(
            "Submitting batch of {len} images to {backend_name} (parallel {})",
            parallel.max(1)
        );

        for image_path in image_paths {
            let slot = ResultSlot::new(tx.clone(), image_path);
            let guard = match self.in_flight.try_insert(slot.image_path()) {
                Ok(guard) => guard,
                Err(e) => {
                    tracing::warn!("Skipping {:?}: {e}", slot.image_path());
                    let path = slot.image_path().to_path_buf();
                    slot.deliver(CaptionResult::failure(path, e));
                    continue;
                }
            };

            let backend = backend.clone();
            let semaphore = semaphore.clone();
            let prompt = prompt.clone();
            tokio::spawn(async move {
                let outcome = tokio::select! {
                    biased;
                    _ = guard.token().cancelled() => Err(BackendError::cancelled()),
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(_permit) => run_call(backend.as_ref(), &guard, &prompt).await,
                        Err(_) => Err(BackendError::unknown("batch worker pool closed")),
                    },
                };
                drop(guard);
                let path = slot.image_path().to_path_buf();
                slot.deliver(CaptionResult::from_outcome(path, outcome));
            });
        }

        // The channel closes once every slot has delivered.
        drop(tx);
        Ok(CaptionBatch::new(rx, len))
    }

    /// List the images in `folder` through `source` and caption them as a batch.
    pub fn generate_folder(
        &self,
        backend_name: &str,
        folder: &Path,
        prompt: &str,
        source: &dyn ImageSource,
    ) -> Result<CaptionBatch, CaptionerError> {
        self.preflight(backend_name)?;
        let image_paths = source.list_images(folder)?;
        Ok(self.generate_batch(backend_name, image_paths, prompt)?)
    }

    /// Ask the request for `image_path` to stop.
    ///
    /// Returns whether a request was found; finding none is not an error,
    /// since cancellation routinely races with completion.
    pub fn cancel(&self, image_path: &Path) -> bool {
        let found = self.in_flight.cancel(image_path);
        if found {
            tracing::debug!("Cancelled caption request for {:?}", image_path);
        }
        found
    }

    /// Cancel every in-flight request and clear the table.
    ///
    /// A request started concurrently with this call may or may not be
    /// included. Returns the number of requests signalled.
    pub fn cancel_all(&self) -> usize {
        let count = self.in_flight.cancel_all();
        if count > 0 {
            tracing::info!("Cancelled {count} in-flight caption requests");
        }
        count
    }
}

/// Run one backend call under its in-flight entry.
///
/// A token that fired before the backend looked at it always yields
/// `Cancelled`; a backend that is slow to notice cancellation is cut off.
async fn run_call(
    backend: &dyn Backend,
    guard: &InFlightGuard,
    prompt: &str,
) -> Result<String, BackendError> {
    let cancel = guard.token();
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(BackendError::cancelled()),
        result = backend.generate(guard.path(), prompt, cancel) => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};
    use tokio_util::sync::CancellationToken;

    /// Backend that sleeps, then answers with a caption derived from the path.
    struct MockBackend {
        model: &'static str,
        available: bool,
        latency: Duration,
        failing: HashSet<PathBuf>,
        calls: AtomicUsize,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl MockBackend {
        fn new(model: &'static str) -> Self {
            Self {
                model,
                available: true,
                latency: Duration::from_millis(5),
                failing: HashSet::new(),
                calls: AtomicUsize::new(0),
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }

        fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = latency;
            self
        }

        fn failing_on(mut self, path: &str) -> Self {
            self.failing.insert(PathBuf::from(path));
            self
        }

        fn unavailable(mut self) -> Self {
            self.available = false;
            self
        }
    }

    #[async_trait]
    impl Backend for MockBackend {
        fn kind(&self) -> &str {
            "mock"
        }

        fn model(&self) -> &str {
            self.model
        }

        fn is_available(&self) -> bool {
            self.available
        }

        async fn generate(
            &self,
            image: &Path,
            _prompt: &str,
            cancel: &CancellationToken,
        ) -> Result<String, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let outcome = tokio::select! {
                _ = cancel.cancelled() => Err(BackendError::cancelled()),
                _ = tokio::time::sleep(self.latency) => {
                    if self.failing.contains(image) {
                        Err(BackendError::malformed(format!("cannot decode {}", image.display())))
                    } else {
                        Ok(format!("{}: {}", self.model, image.display()))
                    }
                }
            };

            self.running.fetch_sub(1, Ordering::SeqCst);
            outcome
        }
    }

    fn manager_with(backends: Vec<(&str, Arc<MockBackend>)>) -> GenerationManager {
        let mut registry = Registry::new();
        for (name, backend) in backends {
            registry.register(name, backend).unwrap();
        }
        GenerationManager::new(Arc::new(registry), GenerateOptions::default())
    }

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[tokio::test]
    async fn test_generate_returns_caption_and_clears_table() {
        let manager = manager_with(vec![("mock", Arc::new(MockBackend::new("m")))]);

        let caption = manager
            .generate("mock", Path::new("/a.jpg"), "Describe")
            .await
            .unwrap();
        assert_eq!(caption, "m: /a.jpg");
        assert_eq!(manager.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_backend_leaves_table_untouched() {
        let manager = manager_with(vec![("mock", Arc::new(MockBackend::new("m")))]);

        let err = manager
            .generate("nope", Path::new("/a.jpg"), "Describe")
            .await
            .unwrap_err();
        assert_eq!(err, CaptionError::NotFound("nope".to_string()));

        let err = manager
            .generate_async("nope", Path::new("/a.jpg"), "Describe")
            .err()
            .unwrap();
        assert_eq!(err, CaptionError::NotFound("nope".to_string()));
        assert!(!manager.is_in_flight(Path::new("/a.jpg")));

        let err = manager
            .generate_batch("nope", paths(&["/a.jpg"]), "Describe")
            .err()
            .unwrap();
        assert_eq!(err, CaptionError::NotFound("nope".to_string()));
        assert_eq!(manager.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_backend_rejected_before_call() {
        let backend = Arc::new(MockBackend::new("m").unavailable());
        let manager = manager_with(vec![("off", backend.clone())]);

        let err = manager
            .generate_async("off", Path::new("/a.jpg"), "Describe")
            .err()
            .unwrap();
        assert_eq!(err, CaptionError::BackendUnavailable("off".to_string()));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        assert_eq!(manager.in_flight_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_batch_yields_one_result_per_path() {
        let manager = manager_with(vec![("mock", Arc::new(MockBackend::new("m")))]);
        let submitted = paths(&["/1.jpg", "/2.jpg", "/3.jpg", "/4.jpg", "/5.jpg", "/6.jpg"]);

        let batch = manager
            .generate_batch("mock", submitted.clone(), "Describe")
            .unwrap();
        assert_eq!(batch.len(), 6);

        let results = batch.collect().await;
        assert_eq!(results.len(), 6);
        let returned: HashSet<_> = results.iter().map(|r| r.image_path().to_path_buf()).collect();
        assert_eq!(returned, submitted.into_iter().collect::<HashSet<_>>());
        assert!(results.iter().all(|r| r.is_success()));
        assert_eq!(manager.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_batch_mixed_outcomes_across_backends() {
        let manager = manager_with(vec![
            (
                "openai-mini",
                Arc::new(MockBackend::new("gpt-4o-mini").failing_on("/missing.jpg")),
            ),
            ("mistral-small", Arc::new(MockBackend::new("mistral-small"))),
        ]);
        assert_eq!(manager.list_backends(), vec!["openai-mini", "mistral-small"]);

        let caption = manager
            .generate("mistral-small", Path::new("/cat.jpg"), "Describe")
            .await
            .unwrap();
        assert!(!caption.is_empty());

        let results = manager
            .generate_batch(
                "openai-mini",
                paths(&["/a.jpg", "/b.jpg", "/missing.jpg"]),
                "Describe",
            )
            .unwrap()
            .collect()
            .await;
        assert_eq!(results.len(), 3);

        let failed: Vec<_> = results.iter().filter(|r| !r.is_success()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].image_path(), Path::new("/missing.jpg"));
        assert_eq!(failed[0].error_kind(), Some(ErrorKind::Malformed));
        assert_eq!(failed[0].caption(), "");
        assert!(results
            .iter()
            .filter(|r| r.is_success())
            .all(|r| !r.caption().is_empty()));
    }

    #[tokio::test]
    async fn test_empty_batch_finishes_immediately() {
        let manager = manager_with(vec![("mock", Arc::new(MockBackend::new("m")))]);
        let batch = manager.generate_batch("mock", Vec::new(), "Describe").unwrap();
        assert!(batch.is_empty());
        assert!(batch.collect().await.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_slow_call() {
        let backend = Arc::new(MockBackend::new("slow").with_latency(Duration::from_millis(500)));
        let manager = manager_with(vec![("slow", backend)]);
        let image = Path::new("/slow.jpg");

        let started = Instant::now();
        let task = manager.generate_async("slow", image, "Describe").unwrap();
        assert!(manager.is_in_flight(image));

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(manager.cancel(image));

        let result = task.wait().await;
        assert_eq!(result.error_kind(), Some(ErrorKind::Cancelled));
        assert!(started.elapsed() < Duration::from_millis(400));
        assert!(!manager.is_in_flight(image));
    }

    #[tokio::test]
    async fn test_cancel_through_task_handle() {
        let backend = Arc::new(MockBackend::new("slow").with_latency(Duration::from_millis(500)));
        let manager = manager_with(vec![("slow", backend)]);
        let image = Path::new("/handle.jpg");

        let started = Instant::now();
        let task = manager.generate_async("slow", image, "Describe").unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        task.cancel();

        let result = task.wait().await;
        assert!(result.is_cancelled());
        assert_eq!(result.caption(), "");
        assert!(started.elapsed() < Duration::from_millis(400));
        assert!(!manager.is_in_flight(image));
    }

    #[tokio::test]
    async fn test_cancel_reaches_sync_generate() {
        let backend = Arc::new(MockBackend::new("slow").with_latency(Duration::from_secs(5)));
        let manager = manager_with(vec![("slow", backend)]);

        let canceller = manager.clone();
        tokio::spawn(async move {
            while !canceller.cancel(Path::new("/a.jpg")) {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        });

        let err = manager
            .generate("slow", Path::new("/a.jpg"), "Describe")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Cancelled));
        assert_eq!(manager.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_unknown_path_is_noop() {
        let manager = manager_with(vec![("mock", Arc::new(MockBackend::new("m")))]);
        assert!(!manager.cancel(Path::new("/never.jpg")));
        assert_eq!(manager.cancel_all(), 0);
    }

    #[tokio::test]
    async fn test_cancel_all_cancels_queued_and_running() {
        let backend = Arc::new(MockBackend::new("slow").with_latency(Duration::from_secs(5)));
        let manager = manager_with(vec![("slow", backend.clone())]);

        let batch = manager
            .generate_batch_with("slow", paths(&["/1.jpg", "/2.jpg", "/3.jpg", "/4.jpg"]), "Describe", 1)
            .unwrap();
        assert_eq!(manager.in_flight_count(), 4);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(manager.cancel_all(), 4);
        assert_eq!(manager.in_flight_count(), 0);

        let results = batch.collect().await;
        assert_eq!(results.len(), 4);
        assert!(results
            .iter()
            .all(|r| r.error_kind() == Some(ErrorKind::Cancelled)));
        // Only the item holding the single permit ever reached the backend.
        assert!(backend.calls.load(Ordering::SeqCst) <= 1);
    }

    #[tokio::test]
    async fn test_duplicate_path_rejected_while_in_flight() {
        let backend = Arc::new(MockBackend::new("slow").with_latency(Duration::from_millis(200)));
        let manager = manager_with(vec![("slow", backend)]);

        let first = manager
            .generate_async("slow", Path::new("/a.jpg"), "Describe")
            .unwrap();
        let err = manager
            .generate_async("slow", Path::new("/a.jpg"), "Describe")
            .err()
            .unwrap();
        assert_eq!(err, CaptionError::AlreadyInFlight(PathBuf::from("/a.jpg")));

        // Inside a batch the duplicate still gets its own result.
        let results = manager
            .generate_batch("slow", paths(&["/a.jpg", "/b.jpg"]), "Describe")
            .unwrap()
            .collect()
            .await;
        assert_eq!(results.len(), 2);
        let dup = results
            .iter()
            .find(|r| r.image_path() == Path::new("/a.jpg"))
            .unwrap();
        assert_eq!(
            dup.error(),
            Some(&CaptionError::AlreadyInFlight(PathBuf::from("/a.jpg")))
        );

        assert!(first.wait().await.is_success());
    }

    #[tokio::test]
    async fn test_same_path_sequential_calls() {
        let backend = Arc::new(MockBackend::new("m"));
        let manager = manager_with(vec![("mock", backend.clone())]);

        for _ in 0..2 {
            let result = manager
                .generate_async("mock", Path::new("/a.jpg"), "Describe")
                .unwrap()
                .wait()
                .await;
            assert!(result.is_success());
        }
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
        assert_eq!(manager.in_flight_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_batch_respects_parallel_limit() {
        let backend = Arc::new(MockBackend::new("m").with_latency(Duration::from_millis(20)));
        let manager = manager_with(vec![("mock", backend.clone())]);
        let submitted: Vec<PathBuf> = (0..8).map(|i| PathBuf::from(format!("/{i}.jpg"))).collect();

        let results = manager
            .generate_batch_with("mock", submitted, "Describe", 2)
            .unwrap()
            .collect()
            .await;

        assert_eq!(results.len(), 8);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 8);
        assert!(backend.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_dropped_task_handle_still_cleans_up() {
        let manager = manager_with(vec![("mock", Arc::new(MockBackend::new("m")))]);
        let task = manager
            .generate_async("mock", Path::new("/a.jpg"), "Describe")
            .unwrap();
        drop(task);

        for _ in 0..100 {
            if manager.in_flight_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(manager.in_flight_count(), 0);
    }
}
