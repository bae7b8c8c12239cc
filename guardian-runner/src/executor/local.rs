//! One-way mirror between two local directories.
//!
//! Files whose content already matches (SHA-256) are left alone; everything
//! else is copied through a temporary sibling and renamed into place. Files and
//! directories under the destination with no counterpart in the source are
//! removed, so the destination ends up an exact copy.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use guardian_core::TransferStats;

use super::{io_err, Executor, ExecutorError, SyncFailure};

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalExecutor;

impl LocalExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    async fn sync(
        &self,
        cancel: CancellationToken,
        source: &str,
        destination: &str,
    ) -> Result<TransferStats, SyncFailure> {
        let source = PathBuf::from(source);
        let destination = PathBuf::from(destination);
        let dispatch = tracing::dispatcher::get_default(|current| current.clone());
        tokio::task::spawn_blocking(move || {
            tracing::dispatcher::with_default(&dispatch, || mirror(&source, &destination, &cancel))
        })
            .await
            .map_err(|err| ExecutorError::other(format!("local sync task failed: {err}")))?
    }
}

#[derive(Debug, Default)]
struct Progress {
    files: u64,
    bytes: u64,
}

impl Progress {
    fn stats(&self, duration: Duration) -> TransferStats {
        TransferStats {
            files_transferred: self.files,
            bytes_transferred: self.bytes,
            duration,
        }
    }
}

fn mirror(
    source: &Path,
    destination: &Path,
    cancel: &CancellationToken,
) -> Result<TransferStats, SyncFailure> {
    let started = Instant::now();
    let mut progress = Progress::default();

    match copy_tree(source, destination, cancel, &mut progress) {
        Ok(()) => {
            tracing::debug!(
                source = %source.display(),
                destination = %destination.display(),
                files = progress.files,
                bytes = progress.bytes,
                "local mirror complete"
            );
            Ok(progress.stats(started.elapsed()))
        }
        Err(error) => Err(SyncFailure::with_progress(
            error,
            progress.stats(started.elapsed()),
        )),
    }
}

fn copy_tree(
    source: &Path,
    destination: &Path,
    cancel: &CancellationToken,
    progress: &mut Progress,
) -> Result<(), ExecutorError> {
    let meta = fs::metadata(source).map_err(|e| io_err(source, e))?;
    if !meta.is_dir() {
        return Err(ExecutorError::other(format!(
            "source {} is not a directory",
            source.display()
        )));
    }

    let source_root = source.canonicalize().map_err(|e| io_err(source, e))?;
    let dest_root = resolve(destination)?;
    if dest_root.starts_with(&source_root) || source_root.starts_with(&dest_root) {
        return Err(ExecutorError::other(
            "source and destination must not contain each other",
        ));
    }
    fs::create_dir_all(&dest_root).map_err(|e| io_err(&dest_root, e))?;

    let wanted = collect_tree(&source_root)?;

    for dir in &wanted.dirs {
        let target = dest_root.join(dir);
        if fs::symlink_metadata(&target).is_ok_and(|meta| !meta.is_dir()) {
            fs::remove_file(&target).map_err(|e| io_err(&target, e))?;
        }
        fs::create_dir_all(&target).map_err(|e| io_err(&target, e))?;
    }

    for file in &wanted.files {
        if cancel.is_cancelled() {
            return Err(ExecutorError::Cancelled);
        }
        let from = source_root.join(file);
        let to = dest_root.join(file);
        if same_content(&from, &to)? {
            continue;
        }
        let copied = copy_file(&from, &to)?;
        progress.files += 1;
        progress.bytes += copied;
        tracing::trace!(file = %file.display(), bytes = copied, "copied");
    }

    if cancel.is_cancelled() {
        return Err(ExecutorError::Cancelled);
    }
    prune(&dest_root, &wanted)
}

/// Canonical form of `path`, which may not exist yet: the deepest existing
/// ancestor is canonicalized and the missing components are appended.
fn resolve(path: &Path) -> Result<PathBuf, ExecutorError> {
    let mut existing = path;
    let mut missing = Vec::new();
    loop {
        let base = if existing.as_os_str().is_empty() {
            Path::new(".")
        } else {
            existing
        };
        match base.canonicalize() {
            Ok(mut resolved) => {
                resolved.extend(missing.iter().rev());
                return Ok(resolved);
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                match (existing.parent(), existing.file_name()) {
                    (Some(parent), Some(name)) => {
                        missing.push(name.to_os_string());
                        existing = parent;
                    }
                    _ => return Err(io_err(path, err)),
                }
            }
            Err(err) => return Err(io_err(path, err)),
        }
    }
}

/// Relative paths of every directory and regular file under a root.
#[derive(Debug, Default)]
struct Tree {
    dirs: BTreeSet<PathBuf>,
    files: BTreeSet<PathBuf>,
}

fn collect_tree(root: &Path) -> Result<Tree, ExecutorError> {
    let mut tree = Tree::default();
    let mut queue = vec![root.to_path_buf()];
    let mut cursor = 0;
    while cursor < queue.len() {
        let current = queue[cursor].clone();
        cursor += 1;
        for entry in fs::read_dir(&current).map_err(|e| io_err(&current, e))? {
            let entry = entry.map_err(|e| io_err(&current, e))?;
            let path = entry.path();
            let ty = entry.file_type().map_err(|e| io_err(&path, e))?;
            let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
            if ty.is_dir() {
                tree.dirs.insert(relative);
                queue.push(path);
            } else if ty.is_file() {
                tree.files.insert(relative);
            } else {
                tracing::debug!(path = %path.display(), "skipping non-regular file");
            }
        }
    }
    Ok(tree)
}

/// Remove destination entries that no longer exist in the source.
fn prune(dest_root: &Path, wanted: &Tree) -> Result<(), ExecutorError> {
    let present = collect_tree(dest_root)?;

    for file in present.files.difference(&wanted.files) {
        let path = dest_root.join(file);
        remove_if_present(fs::remove_file(&path)).map_err(|e| io_err(&path, e))?;
        tracing::trace!(file = %file.display(), "removed");
    }

    // Deepest first, so children go before their parents.
    let stale: Vec<&PathBuf> = present.dirs.difference(&wanted.dirs).collect();
    for dir in stale.into_iter().rev() {
        let path = dest_root.join(dir);
        remove_if_present(fs::remove_dir_all(&path)).map_err(|e| io_err(&path, e))?;
    }
    Ok(())
}

fn remove_if_present(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn same_content(from: &Path, to: &Path) -> Result<bool, ExecutorError> {
    let dest_meta = match fs::metadata(to) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(io_err(to, err)),
    };
    if !dest_meta.is_file() {
        return Ok(false);
    }
    let source_meta = fs::metadata(from).map_err(|e| io_err(from, e))?;
    if source_meta.len() != dest_meta.len() {
        return Ok(false);
    }
    Ok(hash_file(from)? == hash_file(to)?)
}

fn hash_file(path: &Path) -> Result<String, ExecutorError> {
    let mut file = fs::File::open(path).map_err(|e| io_err(path, e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| io_err(path, e))?;
    Ok(hex::encode(hasher.finalize()))
}

/// Copy via `.<name>.partial` and rename, so readers never see a half file.
fn copy_file(from: &Path, to: &Path) -> Result<u64, ExecutorError> {
    let name = to
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = to.with_file_name(format!(".{name}.partial"));

    if let Ok(meta) = fs::symlink_metadata(to) {
        if meta.is_dir() {
            fs::remove_dir_all(to).map_err(|e| io_err(to, e))?;
        }
    }

    let copied = fs::copy(from, &tmp).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = fs::rename(&tmp, to) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(to, e));
    }
    Ok(copied)
}
