//! Upload options and batch results.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::api::ApiResult;
use crate::transport::ProgressFn;

/// Per-file progress callback for batches: `(index, percent)`.
pub type FileProgressFn = Arc<dyn Fn(usize, u8) + Send + Sync>;

/// Options for a single generic upload.
#[derive(Clone, Default)]
pub struct UploadOptions {
    pub category: Option<String>,
    /// Sent as a JSON-encoded `metadata` form field.
    pub metadata: Option<Value>,
    /// Accepted MIME types; `None` accepts any.
    pub allowed_types: Option<Vec<String>>,
    pub on_progress: Option<ProgressFn>,
}

impl UploadOptions {
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn allowed_types(mut self, types: Vec<String>) -> Self {
        self.allowed_types = Some(types);
        self
    }

    pub fn on_progress(mut self, f: impl Fn(u8) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(f));
        self
    }
}

impl std::fmt::Debug for UploadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadOptions")
            .field("category", &self.category)
            .field("metadata", &self.metadata)
            .field("allowed_types", &self.allowed_types)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// Options for a sequential batch upload.
#[derive(Clone, Default)]
pub struct BatchUploadOptions {
    pub category: Option<String>,
    pub metadata: Option<Value>,
    pub allowed_types: Option<Vec<String>>,
    /// Overall progress across the batch.
    pub on_progress: Option<ProgressFn>,
    pub on_file_progress: Option<FileProgressFn>,
}

impl BatchUploadOptions {
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn on_progress(mut self, f: impl Fn(u8) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(f));
        self
    }

    pub fn on_file_progress(mut self, f: impl Fn(usize, u8) + Send + Sync + 'static) -> Self {
        self.on_file_progress = Some(Arc::new(f));
        self
    }
}

impl std::fmt::Debug for BatchUploadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchUploadOptions")
            .field("category", &self.category)
            .field("allowed_types", &self.allowed_types)
            .finish_non_exhaustive()
    }
}

/// Counts for a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
}

/// Outcome of a batch upload: one result per file, in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchUploadResult {
    /// True only when every file succeeded.
    pub success: bool,
    pub results: Vec<ApiResult>,
    pub summary: BatchSummary,
    pub message: String,
}

impl BatchUploadResult {
    pub fn from_results(results: Vec<ApiResult>) -> Self {
        let total = results.len();
        let success = results.iter().filter(|r| r.is_success()).count();
        let failed = total - success;
        Self {
            success: failed == 0,
            summary: BatchSummary {
                total,
                success,
                failed,
            },
            message: format!(
                "Batch upload finished: {} succeeded, {} failed",
                success, failed
            ),
            results,
        }
    }
}

/// Overall batch percentage while file `completed` (0-based count of
/// finished files) is at `current` percent.
pub fn batch_progress(completed: usize, current: u8, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let overall = (completed as f64 + f64::from(current) / 100.0) / total as f64 * 100.0;
    overall.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_batch_summary() {
        let results = vec![
            ApiResult::success(json!({"id": 1}), "ok"),
            ApiResult::failure("boom", "failed"),
            ApiResult::success(json!({"id": 3}), "ok"),
        ];
        let batch = BatchUploadResult::from_results(results);
        assert!(!batch.success);
        assert_eq!(
            batch.summary,
            BatchSummary {
                total: 3,
                success: 2,
                failed: 1
            }
        );
        assert_eq!(batch.results.len(), 3);
    }

    #[test]
    fn test_batch_progress() {
        assert_eq!(batch_progress(0, 0, 4), 0);
        assert_eq!(batch_progress(0, 50, 4), 13);
        assert_eq!(batch_progress(2, 0, 4), 50);
        assert_eq!(batch_progress(3, 100, 4), 100);
        assert_eq!(batch_progress(0, 0, 0), 100);
    }
}
