//! Manifest loading: turns JSON manifests into download tasks.
//!
//! A manifest is a JSON object with an `images` array. Each record needs a non-empty
//! `filename` and `unsplash_url` string; records missing either are dropped without being
//! counted as failures or skips. Other fields are ignored.
//!
//! ```json
//! { "images": [ { "filename": "a/001.jpg", "unsplash_url": "https://..." } ] }
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::DownloadTask;

#[derive(Debug, Deserialize)]
struct ManifestFile {
    #[serde(default)]
    images: Vec<Value>,
}

/// Tasks gathered from every requested manifest
#[derive(Debug, Default)]
pub struct TaskList {
    /// Tasks in manifest order, duplicates preserved
    pub tasks: Vec<DownloadTask>,
    /// Records seen across all manifests, malformed ones included
    pub records: usize,
    /// Records dropped for lacking a filename or URL
    pub malformed: usize,
    /// Manifests that were read successfully
    pub loaded: usize,
    /// Manifest paths that did not exist
    pub missing: Vec<PathBuf>,
}

impl TaskList {
    /// Fail with [`Error::NoManifests`] if nothing could be read
    pub fn ensure_loaded(self) -> Result<Self> {
        if self.loaded == 0 {
            return Err(Error::NoManifests);
        }
        Ok(self)
    }
}

/// Read the `images` records of one manifest
pub async fn read_manifest(path: &Path) -> Result<Vec<Value>> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(Error::ManifestNotFound(path.to_path_buf()));
    }
    let raw = tokio::fs::read_to_string(path).await?;
    let manifest: ManifestFile = serde_json::from_str(&raw).map_err(|source| Error::Manifest {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(manifest.images)
}

/// Convert records into tasks rooted at `output_root`
///
/// Returns the tasks and the number of records that were dropped.
pub fn tasks_from_records(
    records: &[Value],
    output_root: &Path,
    source: &str,
) -> (Vec<DownloadTask>, usize) {
    let mut tasks = Vec::with_capacity(records.len());
    let mut malformed = 0;

    for record in records {
        match (string_field(record, "filename"), string_field(record, "unsplash_url")) {
            (Some(filename), Some(url)) => {
                tasks.push(DownloadTask::new(url, output_root.join(filename), source));
            }
            _ => malformed += 1,
        }
    }

    (tasks, malformed)
}

/// Load every manifest in order, skipping the ones that do not exist
///
/// Missing manifests are logged and recorded in [`TaskList::missing`]; a manifest that
/// exists but is not valid JSON aborts loading.
pub async fn load_tasks(manifests: &[PathBuf], output_root: &Path) -> Result<TaskList> {
    let mut list = TaskList::default();

    for path in manifests {
        let records = match read_manifest(path).await {
            Ok(records) => records,
            Err(Error::ManifestNotFound(missing)) => {
                tracing::warn!(path = %missing.display(), "Manifest not found, skipping");
                list.missing.push(missing);
                continue;
            }
            Err(e) => return Err(e),
        };

        let source = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let (tasks, malformed) = tasks_from_records(&records, output_root, &source);

        tracing::debug!(
            manifest = %source,
            records = records.len(),
            tasks = tasks.len(),
            malformed,
            "Loaded manifest"
        );

        list.records += records.len();
        list.malformed += malformed;
        list.loaded += 1;
        list.tasks.extend(tasks);
    }

    Ok(list)
}

fn string_field<'a>(record: &'a Value, key: &str) -> Option<&'a str> {
    record
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}
