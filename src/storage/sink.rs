use crate::downloader::{ResultSink, Yielded};
use crate::storage::Storage;
use crate::ScrapeError;

/// Streams yielded datasets into the cache as they arrive
pub struct CacheSink<'a, S: Storage> {
    storage: &'a mut S,
    run_id: i64,
    stage: String,
    written: usize,
}

impl<'a, S: Storage> CacheSink<'a, S> {
    pub fn new(storage: &'a mut S, run_id: i64, stage: impl Into<String>) -> Self {
        Self {
            storage,
            run_id,
            stage: stage.into(),
            written: 0,
        }
    }

    /// Datasets written so far
    pub fn written(&self) -> usize {
        self.written
    }
}

impl<S: Storage> ResultSink for CacheSink<'_, S> {
    fn accept(&mut self, yielded: Yielded) -> Result<(), ScrapeError> {
        self.storage.write_dataset(self.run_id, &self.stage, &yielded)?;
        self.written += 1;
        Ok(())
    }
}
