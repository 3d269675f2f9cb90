//! File storage endpoints.

use reqwest::multipart::Form;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::constants::{self, file as paths};
use super::{ApiResult, labels, normalize};
use crate::client::ChatdeskClient;
use crate::error::Error;
use crate::models::file::batch_progress;
use crate::models::{BatchUploadOptions, BatchUploadResult, UploadOptions};
use crate::transport::{ProgressFn, RequestDescriptor, UPLOAD_TIMEOUT, UploadFile, upload};

pub struct FileApi<'a> {
    client: &'a ChatdeskClient,
}

impl<'a> FileApi<'a> {
    pub(crate) fn new(client: &'a ChatdeskClient) -> Self {
        Self { client }
    }

    /// Upload one file as the `file` form field.
    ///
    /// The size limit comes from `upload.max_size_bytes`; types are only
    /// checked when `options.allowed_types` is set.
    pub async fn upload(&self, file: &UploadFile, options: &UploadOptions) -> ApiResult {
        let call = async {
            let max_size = self.client.config().upload.max_size_bytes;
            upload::validate(file, max_size, options.allowed_types.as_deref())?;

            let mut form = Form::new().part(
                "file",
                upload::file_part(file, options.on_progress.clone())?,
            );
            if let Some(category) = &options.category {
                form = form.text("category", category.clone());
            }
            if let Some(metadata) = &options.metadata {
                form = form.text("metadata", metadata.to_string());
            }

            self.client
                .http()
                .send(
                    RequestDescriptor::post(paths::UPLOAD)
                        .multipart(form)
                        .timeout(UPLOAD_TIMEOUT),
                )
                .await
        };
        normalize(labels("File uploaded", "File upload failed"), call).await
    }

    /// Upload files one after another. A failed file never stops the batch.
    pub async fn upload_multiple(
        &self,
        files: &[UploadFile],
        options: &BatchUploadOptions,
    ) -> BatchUploadResult {
        let total = files.len();
        let mut results = Vec::with_capacity(total);

        for (index, file) in files.iter().enumerate() {
            let overall = options.on_progress.clone();
            let per_file = options.on_file_progress.clone();
            let progress: ProgressFn = Arc::new(move |p: u8| {
                if let Some(f) = &per_file {
                    f(index, p);
                }
                if let Some(f) = &overall {
                    f(batch_progress(index, p, total));
                }
            });

            let single = UploadOptions {
                category: options.category.clone(),
                metadata: options.metadata.clone(),
                allowed_types: options.allowed_types.clone(),
                on_progress: Some(progress),
            };
            let result = self.upload(file, &single).await;
            debug!(index, name = %file.name, success = result.is_success(), "Batch item finished");
            results.push(result);
        }

        let batch = BatchUploadResult::from_results(results);
        info!(
            total = batch.summary.total,
            failed = batch.summary.failed,
            "Batch upload finished"
        );
        batch
    }

    /// Download a file into `dest_dir`, named `filename` or `file_<id>`.
    /// Returns the written path.
    pub async fn download(
        &self,
        file_id: &str,
        dest_dir: &Path,
        filename: Option<&str>,
    ) -> ApiResult<PathBuf> {
        let call = async {
            let path = constants::with_id(paths::DOWNLOAD, file_id);
            let bytes = self.client.http().download(RequestDescriptor::get(path)).await?;

            let name = match filename {
                Some(name) if !name.is_empty() => name.to_string(),
                _ => format!("file_{}", file_id),
            };
            let target = dest_dir.join(name);
            tokio::fs::write(&target, &bytes)
                .await
                .map_err(|e| Error::storage_io(&target, e.to_string()))?;
            debug!(path = %target.display(), bytes = bytes.len(), "File downloaded");
            Ok::<_, Error>(target)
        };
        normalize(labels("File downloaded", "File download failed"), call).await
    }

    pub async fn delete(&self, file_id: &str) -> ApiResult {
        let path = constants::with_id(paths::DELETE, file_id);
        normalize(
            labels("File deleted", "Failed to delete file"),
            self.client.http().delete(&path, Value::Null),
        )
        .await
    }

    pub async fn delete_multiple(&self, file_ids: &[String]) -> ApiResult {
        normalize(
            labels("Files deleted", "Failed to delete files"),
            self.client
                .http()
                .delete(paths::DELETE, json!({ "fileIds": file_ids })),
        )
        .await
    }

    pub async fn info(&self, file_id: &str) -> ApiResult {
        let path = constants::with_id(paths::INFO, file_id);
        normalize(
            labels("File info loaded", "Failed to load file info"),
            self.client.http().get(&path, None),
        )
        .await
    }

    pub async fn list(&self, params: &Value) -> ApiResult {
        normalize(
            labels("File list loaded", "Failed to load file list"),
            self.client.http().get(paths::LIST, Some(params)),
        )
        .await
    }

    pub async fn preview_url(&self, file_id: &str, options: &Value) -> ApiResult {
        let path = constants::with_id(paths::PREVIEW, file_id);
        normalize(
            labels("Preview URL loaded", "Failed to load preview URL"),
            self.client.http().get(&path, Some(options)),
        )
        .await
    }

    pub async fn rename(&self, file_id: &str, new_name: &str) -> ApiResult {
        let path = constants::with_id(paths::RENAME, file_id);
        normalize(
            labels("File renamed", "Failed to rename file"),
            self.client.http().put(&path, json!({ "name": new_name })),
        )
        .await
    }

    pub async fn move_to(&self, file_id: &str, category: &str) -> ApiResult {
        let path = constants::with_id(paths::MOVE, file_id);
        normalize(
            labels("File moved", "Failed to move file"),
            self.client.http().put(&path, json!({ "category": category })),
        )
        .await
    }

    pub async fn categories(&self) -> ApiResult {
        normalize(
            labels("File categories loaded", "Failed to load file categories"),
            self.client.http().get(paths::CATEGORIES, None),
        )
        .await
    }

    pub async fn check_exists(&self, filename: &str, hash: &str) -> ApiResult {
        let result = normalize(
            labels("", "File check failed"),
            self.client.http().get(
                paths::CHECK_EXISTS,
                Some(&json!({ "filename": filename, "hash": hash })),
            ),
        )
        .await;
        let exists = result
            .data()
            .and_then(|d| d.get("exists"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        result.with_success_message(if exists {
            "File already exists"
        } else {
            "File does not exist"
        })
    }
}
