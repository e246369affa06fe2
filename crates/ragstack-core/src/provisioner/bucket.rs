//! Bucket ensurer and document uploads.

use std::path::PathBuf;

use tracing::{info, warn};

use ragstack_contracts::{
    agent::ApiSchema,
    arn,
    error::{ProvisionError, ProvisionResult},
    record::{Disposition, ResourceKind},
};

use super::Provisioner;

/// Bucket key of the uploaded action-group schema.
pub const API_SCHEMA_KEY: &str = "schemas/password-reset.json";

impl Provisioner {
    /// Make sure the document bucket exists and return its name.
    pub fn ensure_bucket(&self) -> ProvisionResult<String> {
        let bucket = self.config.bucket_name(&self.run_id)?;
        let objects = &self.providers.objects;

        if objects.bucket_exists(&bucket)? {
            info!(bucket = %bucket, "bucket exists");
            self.record(ResourceKind::Bucket, &bucket, &arn::bucket(&bucket), Disposition::Reused)?;
            return Ok(bucket);
        }

        let disposition = match objects.create_bucket(&bucket, &self.config.region) {
            Ok(()) => Disposition::Created,
            Err(e) if e.is_already_exists() => Disposition::Reused,
            Err(e) => return Err(e),
        };
        info!(bucket = %bucket, disposition = ?disposition, "bucket ready");
        self.record(ResourceKind::Bucket, &bucket, &arn::bucket(&bucket), disposition)?;
        Ok(bucket)
    }

    /// Upload every regular file in the documents directory under the data
    /// prefix. Returns the number of files uploaded.
    ///
    /// A missing directory is not an error: ingestion then indexes whatever
    /// the prefix already holds.
    pub fn upload_documents(&self, bucket: &str) -> ProvisionResult<usize> {
        let dir = &self.config.documents_dir;
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "documents directory not found, skipping upload");
            return Ok(0);
        }

        let entries = std::fs::read_dir(dir).map_err(|e| ProvisionError::ConfigError {
            reason: format!("failed to list documents in '{}': {}", dir.display(), e),
        })?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        files.sort();

        for path in &files {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                warn!(path = %path.display(), "skipping document with non UTF-8 name");
                continue;
            };
            let body = std::fs::read(path).map_err(|e| ProvisionError::ConfigError {
                reason: format!("failed to read document '{}': {}", path.display(), e),
            })?;
            let key = format!("{}{}", self.config.data_prefix, file_name);
            self.providers.objects.put_object(bucket, &key, &body)?;
            self.record(
                ResourceKind::Object,
                &key,
                &arn::object(bucket, &key),
                Disposition::Created,
            )?;
        }

        info!(bucket = %bucket, count = files.len(), "documents uploaded");
        Ok(files.len())
    }

    /// Store the action-group schema in the bucket and return its ARN.
    pub fn upload_api_schema(&self, bucket: &str, schema: &ApiSchema) -> ProvisionResult<String> {
        self.providers
            .objects
            .put_object(bucket, API_SCHEMA_KEY, schema.payload().as_bytes())?;
        let object_arn = arn::object(bucket, API_SCHEMA_KEY);
        self.record(ResourceKind::Object, API_SCHEMA_KEY, &object_arn, Disposition::Created)?;
        Ok(object_arn)
    }
}
