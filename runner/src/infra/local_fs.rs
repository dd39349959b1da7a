//! Infrastructure implementation of the `WorkspaceFs` port.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use walkdir::WalkDir;

use crate::application::ports::WorkspaceFs;

/// Local workspace directory access through `tokio::fs` and `walkdir`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalWorkspace;

/// Join a `/`-separated key onto `root`, refusing keys that would escape it.
fn resolve_key(root: &Path, key: &str) -> Result<PathBuf> {
    let relative = Path::new(key);
    if key.is_empty()
        || !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
    {
        bail!("refusing workspace key outside the workspace: {key:?}");
    }
    Ok(root.join(relative))
}

/// Relative `/`-separated key of `path` below `root`.
fn key_of(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .with_context(|| format!("{} is not below {}", path.display(), root.display()))?;
    let mut parts = Vec::new();
    for component in relative.components() {
        let Component::Normal(part) = component else {
            bail!("unexpected path component in {}", path.display());
        };
        let part = part
            .to_str()
            .with_context(|| format!("non UTF-8 file name in {}", path.display()))?;
        parts.push(part);
    }
    Ok(parts.join("/"))
}

fn list_files_sync(root: &Path) -> Result<Vec<String>> {
    let mut keys = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.with_context(|| format!("walking {}", root.display()))?;
        if entry.file_type().is_file() {
            keys.push(key_of(root, entry.path())?);
        }
    }
    keys.sort();
    Ok(keys)
}

impl WorkspaceFs for LocalWorkspace {
    async fn is_dir(&self, path: &Path) -> bool {
        tokio::fs::symlink_metadata(path)
            .await
            .is_ok_and(|meta| meta.is_dir())
    }

    async fn list_files(&self, root: &Path) -> Result<Vec<String>> {
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || list_files_sync(&root))
            .await
            .context("workspace listing task panicked")?
    }

    async fn read(&self, root: &Path, key: &str) -> Result<Vec<u8>> {
        let path = resolve_key(root, key)?;
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))
    }

    async fn write(&self, root: &Path, key: &str, contents: &[u8]) -> Result<()> {
        let path = resolve_key(root, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        tokio::fs::write(&path, contents)
            .await
            .with_context(|| format!("writing {}", path.display()))
    }
}
