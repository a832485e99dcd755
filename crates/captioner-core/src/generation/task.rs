//! Result records and the handles they are delivered through.

use crate::error::{BackendError, CaptionError, ErrorKind};
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// The outcome of captioning one image.
///
/// Exactly one is produced per requested image. On failure `caption` is empty
/// and `error` says why.
#[derive(Debug)]
pub struct CaptionResult {
    image_path: PathBuf,
    caption: String,
    error: Option<CaptionError>,
}

impl CaptionResult {
    pub(crate) fn success(image_path: PathBuf, caption: String) -> Self {
        Self {
            image_path,
            caption,
            error: None,
        }
    }

    pub(crate) fn failure(image_path: PathBuf, error: impl Into<CaptionError>) -> Self {
        Self {
            image_path,
            caption: String::new(),
            error: Some(error.into()),
        }
    }

    pub(crate) fn from_outcome(image_path: PathBuf, outcome: Result<String, BackendError>) -> Self {
        match outcome {
            Ok(caption) => Self::success(image_path, caption),
            Err(e) => Self::failure(image_path, e),
        }
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn error(&self) -> Option<&CaptionError> {
        self.error.as_ref()
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Whether the request was cancelled rather than failing on its own.
    pub fn is_cancelled(&self) -> bool {
        matches!(&self.error, Some(CaptionError::Backend(e)) if e.is_cancelled())
    }

    /// Backend error kind, if the backend call failed.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().and_then(CaptionError::kind)
    }

    pub fn into_result(self) -> Result<String, CaptionError> {
        match self.error {
            None => Ok(self.caption),
            Some(e) => Err(e),
        }
    }
}

/// Handle to a single asynchronous caption request.
///
/// The request runs on its own task; [`wait`](Self::wait) consumes the handle,
/// so its result can be observed exactly once.
#[derive(Debug)]
pub struct CaptionTask {
    image_path: PathBuf,
    cancel: CancellationToken,
    receiver: oneshot::Receiver<CaptionResult>,
}

impl CaptionTask {
    pub(crate) fn new(
        image_path: PathBuf,
        cancel: CancellationToken,
        receiver: oneshot::Receiver<CaptionResult>,
    ) -> Self {
        Self {
            image_path,
            cancel,
            receiver,
        }
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    /// Ask this request to stop. Harmless if it already finished.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the result.
    ///
    /// If the worker task died without reporting (it panicked), an `Unknown`
    /// failure is returned in its place.
    pub async fn wait(self) -> CaptionResult {
        match self.receiver.await {
            Ok(result) => result,
            Err(_) => CaptionResult::failure(
                self.image_path,
                BackendError::unknown("caption task ended without delivering a result"),
            ),
        }
    }
}

/// Receiving side of a batch.
///
/// Yields one [`CaptionResult`] per submitted path, in completion order, and
/// then `None` once every sub-call has delivered.
#[derive(Debug)]
pub struct CaptionBatch {
    receiver: mpsc::Receiver<CaptionResult>,
    len: usize,
}

impl CaptionBatch {
    pub(crate) fn new(receiver: mpsc::Receiver<CaptionResult>, len: usize) -> Self {
        Self { receiver, len }
    }

    /// Number of results this batch will deliver.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Next result to complete, or `None` when the batch is finished.
    pub async fn recv(&mut self) -> Option<CaptionResult> {
        self.receiver.recv().await
    }

    /// Wait for the whole batch.
    pub async fn collect(mut self) -> Vec<CaptionResult> {
        let mut results = Vec::with_capacity(self.len);
        while let Some(result) = self.recv().await {
            results.push(result);
        }
        results
    }
}

/// One batch item's right to send on the shared channel.
///
/// The channel's capacity equals the batch size and each slot sends at most
/// once, so `try_send` never fails for lack of room. A slot dropped without
/// delivering (its task panicked) sends an `Unknown` failure instead, keeping
/// the one-result-per-path guarantee. The channel closes when the last slot
/// is gone.
pub(crate) struct ResultSlot {
    sender: Option<mpsc::Sender<CaptionResult>>,
    image_path: PathBuf,
}

impl ResultSlot {
    pub(crate) fn new(sender: mpsc::Sender<CaptionResult>, image_path: PathBuf) -> Self {
        Self {
            sender: Some(sender),
            image_path,
        }
    }

    pub(crate) fn image_path(&self) -> &Path {
        &self.image_path
    }

    pub(crate) fn deliver(mut self, result: CaptionResult) {
        if let Some(sender) = self.sender.take() {
            send(&sender, result);
        }
    }
}

impl Drop for ResultSlot {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.take() {
            send(
                &sender,
                CaptionResult::failure(
                    std::mem::take(&mut self.image_path),
                    BackendError::unknown("caption task ended without delivering a result"),
                ),
            );
        }
    }
}

fn send(sender: &mpsc::Sender<CaptionResult>, result: CaptionResult) {
    if let Err(e) = sender.try_send(result) {
        // Only reachable when the consumer dropped the batch.
        tracing::debug!("Dropping caption result, batch receiver is gone: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_accessors() {
        let ok = CaptionResult::success(PathBuf::from("/a.jpg"), "A cat.".to_string());
        assert!(ok.is_success());
        assert_eq!(ok.caption(), "A cat.");
        assert_eq!(ok.error_kind(), None);

        let failed = CaptionResult::failure(PathBuf::from("/b.jpg"), BackendError::malformed("x"));
        assert!(!failed.is_success());
        assert_eq!(failed.caption(), "");
        assert_eq!(failed.error_kind(), Some(ErrorKind::Malformed));
        assert!(!failed.is_cancelled());
        assert!(failed.into_result().is_err());

        let cancelled = CaptionResult::failure(PathBuf::from("/c.jpg"), BackendError::cancelled());
        assert!(cancelled.is_cancelled());
        assert_eq!(cancelled.error_kind(), Some(ErrorKind::Cancelled));
    }

    #[tokio::test]
    async fn test_task_wait_reports_dropped_sender() {
        let (tx, rx) = oneshot::channel();
        let task = CaptionTask::new(PathBuf::from("/a.jpg"), CancellationToken::new(), rx);
        drop(tx);

        let result = task.wait().await;
        assert_eq!(result.image_path(), Path::new("/a.jpg"));
        assert_eq!(result.error_kind(), Some(ErrorKind::Unknown));
    }

    #[tokio::test]
    async fn test_dropped_slot_still_delivers() {
        let (tx, rx) = mpsc::channel(2);
        let batch = CaptionBatch::new(rx, 2);
        let delivered = ResultSlot::new(tx.clone(), PathBuf::from("/a.jpg"));
        let abandoned = ResultSlot::new(tx, PathBuf::from("/b.jpg"));

        delivered.deliver(CaptionResult::success(PathBuf::from("/a.jpg"), "ok".into()));
        drop(abandoned);

        let results = batch.collect().await;
        assert_eq!(results.len(), 2);
        let b = results
            .iter()
            .find(|r| r.image_path() == Path::new("/b.jpg"))
            .unwrap();
        assert_eq!(b.error_kind(), Some(ErrorKind::Unknown));
    }
}
