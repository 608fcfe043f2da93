//! Model snapshot acquisition.
//!
//! Lists every file of a HuggingFace Hub repository revision, works out which
//! of them the target directory still needs, and fetches only those. Fetched
//! files are placed as real copies (never symlinks). Each placed file gets a
//! download record under `.cache/nowledge/download/` naming the blob it was
//! copied from, so a re-run skips files whose record still matches the remote
//! blob and refetches the rest, whatever state the hub cache is in.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use futures::stream::{self, StreamExt};
use hf_hub::api::tokio::{Api, ApiBuilder, ApiError, ApiRepo};
use hf_hub::{Repo, RepoType};
use nowledge_types::DownloadSettings;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::AcquireError;

/// Suffix for in-progress copies; renamed into place once complete.
const PARTIAL_SUFFIX: &str = ".part";

/// Download records, relative to the target directory.
const RECORD_DIR: &str = ".cache/nowledge/download";

const RECORD_SUFFIX: &str = ".metadata";

/// One file of the remote revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Repository-relative name
    pub name: String,
    /// Blob identity (LFS sha256 or git blob id), the hub's etag for the file
    pub etag: Option<String>,
    pub size: Option<u64>,
}

/// Written after a file is placed in the target directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRecord {
    /// Commit the file was fetched at
    pub commit: String,
    pub etag: Option<String>,
    /// Bytes written to the target
    pub size: u64,
}

/// What the target directory holds for one remote file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalFile {
    /// Length of the regular file at the target path, if there is one
    pub size: Option<u64>,
    pub record: Option<DownloadRecord>,
}

/// Split of a revision's files into those to fetch and those already in place.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SnapshotPlan {
    pub fetch: Vec<RemoteFile>,
    pub present: Vec<String>,
}

/// Summary of a completed snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotReport {
    pub model_id: String,
    /// Commit sha the revision resolved to
    pub sha: String,
    pub target_dir: PathBuf,
    /// Repository-relative file names, sorted
    pub files: Vec<String>,
    pub copied: usize,
    pub already_present: usize,
}

/// Fetch the configured model into `settings.target_dir()`.
///
/// Makes a single attempt. On error some files may already be in place; a
/// later run picks up from there.
pub async fn acquire_snapshot(settings: &DownloadSettings) -> Result<SnapshotReport, AcquireError> {
    let target_dir = settings.target_dir();
    fs::create_dir_all(&target_dir)
        .await
        .map_err(|e| AcquireError::io(&target_dir, e))?;

    let swept = sweep_partials(&target_dir)?;
    if swept > 0 {
        debug!(swept, "Removed leftover partial copies");
    }

    let api = build_api(settings)?;
    let repo = api.repo(Repo::with_revision(
        settings.model_id.clone(),
        RepoType::Model,
        settings.revision.clone(),
    ));

    info!(model = %settings.model_id, revision = %settings.revision, "Resolving snapshot...");
    let listing = list_revision(&repo)
        .await
        .map_err(|source| AcquireError::Registry {
            model_id: settings.model_id.clone(),
            source,
        })?;
    let sha = listing.sha;
    let mut remote: Vec<RemoteFile> = listing.siblings.into_iter().map(RemoteFile::from).collect();
    remote.sort_by(|a, b| a.name.cmp(&b.name));

    // Rejects unsafe names before anything is written
    let local = inspect_target(&target_dir, &remote)?;
    let plan = plan_snapshot(&sha, &remote, &local);

    info!(
        files = remote.len(),
        fetch = plan.fetch.len(),
        already_present = plan.present.len(),
        sha = %sha,
        workers = settings.max_workers,
        target = %target_dir.display(),
        "Fetching snapshot"
    );
    for file in &plan.present {
        debug!(file = %file, "Already present, skipping");
    }

    // Pin transfers to the resolved commit so a moving branch cannot mix revisions
    let pinned = api.repo(Repo::with_revision(
        settings.model_id.clone(),
        RepoType::Model,
        sha.clone(),
    ));

    let results: Vec<Result<u64, AcquireError>> = stream::iter(&plan.fetch)
        .map(|file| fetch_file(&pinned, &settings.model_id, &target_dir, &sha, file))
        .buffer_unordered(settings.max_workers)
        .collect()
        .await;

    let mut copied = 0;
    let mut first_error = None;
    for result in results {
        match result {
            Ok(_) => copied += 1,
            Err(err) => {
                warn!(error = %err, "File transfer failed");
                first_error.get_or_insert(err);
            }
        }
    }
    if let Some(err) = first_error {
        return Err(err);
    }

    info!(copied, already_present = plan.present.len(), "Snapshot complete");

    Ok(SnapshotReport {
        model_id: settings.model_id.clone(),
        sha,
        target_dir,
        files: remote.into_iter().map(|file| file.name).collect(),
        copied,
        already_present: plan.present.len(),
    })
}

fn build_api(settings: &DownloadSettings) -> Result<Api, AcquireError> {
    // Progress bars would interleave across concurrent transfers
    let mut builder = ApiBuilder::new().with_progress(false);
    if let Some(cache_dir) = settings.cache_path() {
        builder = builder.with_cache_dir(cache_dir);
    }
    if let Some(token) = &settings.token {
        builder = builder.with_token(Some(token.clone()));
    }
    builder.build().map_err(|source| AcquireError::Registry {
        model_id: settings.model_id.clone(),
        source,
    })
}

/// Revision listing with per-file blob details (`?blobs=true`).
#[derive(Debug, Deserialize)]
struct RevisionListing {
    sha: String,
    siblings: Vec<ListedFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListedFile {
    rfilename: String,
    #[serde(default)]
    blob_id: Option<String>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    lfs: Option<LfsPointer>,
}

#[derive(Debug, Deserialize)]
struct LfsPointer {
    sha256: String,
    #[serde(default)]
    size: Option<u64>,
}

impl From<ListedFile> for RemoteFile {
    fn from(file: ListedFile) -> Self {
        match file.lfs {
            // LFS files are served with the sha256 as etag
            Some(lfs) => RemoteFile {
                name: file.rfilename,
                etag: Some(lfs.sha256),
                size: lfs.size.or(file.size),
            },
            None => RemoteFile {
                name: file.rfilename,
                etag: file.blob_id,
                size: file.size,
            },
        }
    }
}

async fn list_revision(repo: &ApiRepo) -> Result<RevisionListing, ApiError> {
    let response = repo
        .info_request()
        .query(&[("blobs", "true")])
        .send()
        .await?
        .error_for_status()?;
    Ok(response.json().await?)
}

/// Decide which remote files need fetching given what the target holds.
///
/// A file counts as present only when the target has a regular file whose
/// download record matches both its length and the remote blob. Without a
/// remote blob id the record must come from the same commit.
pub fn plan_snapshot(
    commit: &str,
    remote: &[RemoteFile],
    local: &BTreeMap<String, LocalFile>,
) -> SnapshotPlan {
    let mut plan = SnapshotPlan::default();
    for file in remote {
        let current = local
            .get(&file.name)
            .is_some_and(|state| is_current(commit, file, state));
        if current {
            plan.present.push(file.name.clone());
        } else {
            plan.fetch.push(file.clone());
        }
    }
    plan
}

fn is_current(commit: &str, remote: &RemoteFile, local: &LocalFile) -> bool {
    let (Some(size), Some(record)) = (local.size, &local.record) else {
        return false;
    };
    if size != record.size || remote.size.is_some_and(|expected| expected != size) {
        return false;
    }
    match &remote.etag {
        Some(etag) => record.etag.as_deref() == Some(etag.as_str()),
        None => record.commit == commit,
    }
}

/// Read the target-side state of every remote file.
pub fn inspect_target(
    target_dir: &Path,
    remote: &[RemoteFile],
) -> Result<BTreeMap<String, LocalFile>, AcquireError> {
    let mut local = BTreeMap::new();
    for file in remote {
        let dest = target_path(target_dir, &file.name)?;
        let size = std::fs::symlink_metadata(&dest)
            .ok()
            .filter(|meta| meta.is_file())
            .map(|meta| meta.len());
        let record = read_record(&record_path(target_dir, &file.name));
        local.insert(file.name.clone(), LocalFile { size, record });
    }
    Ok(local)
}

fn record_path(target_dir: &Path, file: &str) -> PathBuf {
    target_dir
        .join(RECORD_DIR)
        .join(format!("{}{}", file, RECORD_SUFFIX))
}

fn read_record(path: &Path) -> Option<DownloadRecord> {
    let raw = std::fs::read(path).ok()?;
    match serde_json::from_slice(&raw) {
        Ok(record) => Some(record),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Ignoring unreadable download record");
            None
        }
    }
}

async fn write_record(path: &Path, record: &DownloadRecord) -> Result<(), AcquireError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| AcquireError::io(parent, e))?;
    }
    let body = serde_json::to_vec_pretty(record)
        .map_err(|e| AcquireError::io(path, std::io::Error::other(e)))?;
    fs::write(path, body)
        .await
        .map_err(|e| AcquireError::io(path, e))
}

async fn fetch_file(
    repo: &ApiRepo,
    model_id: &str,
    target_dir: &Path,
    commit: &str,
    file: &RemoteFile,
) -> Result<u64, AcquireError> {
    debug!(file = %file.name, "Fetching...");
    let dest = target_path(target_dir, &file.name)?;

    // The old record must not outlive the bytes it describes
    let record = record_path(target_dir, &file.name);
    match fs::remove_file(&record).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(AcquireError::io(&record, e)),
    }

    let cached = repo
        .get(&file.name)
        .await
        .map_err(|source| AcquireError::Transfer {
            model_id: model_id.to_string(),
            file: file.name.clone(),
            source,
        })?;

    let bytes = place_file(&cached, &dest).await?;
    write_record(
        &record,
        &DownloadRecord {
            commit: commit.to_string(),
            etag: file.etag.clone(),
            size: bytes,
        },
    )
    .await?;

    info!(file = %file.name, bytes, "Copied");
    Ok(bytes)
}

/// Join a repository-relative name onto the target, rejecting anything that
/// is not a plain relative path.
pub fn target_path(target_dir: &Path, file: &str) -> Result<PathBuf, AcquireError> {
    let relative = Path::new(file);
    let plain = !file.is_empty()
        && relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if !plain {
        return Err(AcquireError::UnsafePath {
            file: file.to_string(),
        });
    }
    Ok(target_dir.join(relative))
}

/// Copy `source` (usually a symlink into the hub cache) to `dest` as a regular
/// file, replacing whatever `dest` held. The copy goes to a `.part` sibling
/// first so `dest` is always either complete or untouched.
pub async fn place_file(source: &Path, dest: &Path) -> Result<u64, AcquireError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| AcquireError::io(parent, e))?;
    }

    let mut partial = dest.as_os_str().to_owned();
    partial.push(PARTIAL_SUFFIX);
    let partial = PathBuf::from(partial);

    // copy() follows the hub cache symlink to the blob
    let bytes = fs::copy(source, &partial)
        .await
        .map_err(|e| AcquireError::io(&partial, e))?;
    // rename() replaces a file or a link at dest, never its target
    fs::rename(&partial, dest)
        .await
        .map_err(|e| AcquireError::io(dest, e))?;

    Ok(bytes)
}

/// Delete `*.part` files left under `target_dir` by an interrupted run.
pub fn sweep_partials(target_dir: &Path) -> Result<usize, AcquireError> {
    let mut removed = 0;
    for entry in WalkDir::new(target_dir) {
        let entry = entry.map_err(|e| {
            let path = e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| target_dir.to_path_buf());
            AcquireError::io(path, e.into())
        })?;
        let partial = entry.file_type().is_file()
            && entry
                .file_name()
                .to_string_lossy()
                .ends_with(PARTIAL_SUFFIX);
        if partial {
            std::fs::remove_file(entry.path()).map_err(|e| AcquireError::io(entry.path(), e))?;
            removed += 1;
        }
    }
    Ok(removed)
}
