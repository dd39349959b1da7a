//! Filter compiler: user glob lists → [`FilterChain`].

use std::path::Path;

use anyhow::Result;

use crate::application::ports::WorkspaceFs;
use crate::domain::filter::{FilterChain, FilterPattern, PatternSet};

/// Direction of a workspace sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    /// Local workspace → bucket, before the run.
    Up,
    /// Bucket → local workspace, after the run.
    Down,
}

async fn classify_all(
    fs: &impl WorkspaceFs,
    root: &Path,
    patterns: &[String],
) -> Vec<FilterPattern> {
    let mut classified = Vec::with_capacity(patterns.len());
    for raw in patterns {
        let is_dir = fs.is_dir(&root.join(raw)).await;
        classified.push(FilterPattern::classify(raw, is_dir));
    }
    classified
}

/// Compile `excludes` and `includes` into a chain for `direction`.
///
/// Entries naming a directory of the local workspace `root` are expanded to
/// match everything below that directory.
///
/// # Errors
///
/// Returns an error if a pattern is not a valid glob.
pub async fn compile_filters(
    fs: &impl WorkspaceFs,
    root: &Path,
    excludes: &[String],
    includes: &[String],
    direction: SyncDirection,
) -> Result<FilterChain> {
    let excludes = PatternSet::compile(classify_all(fs, root, excludes).await)?;
    let includes = PatternSet::compile(classify_all(fs, root, includes).await)?;
    let chain = FilterChain::new(excludes, includes);
    Ok(match direction {
        SyncDirection::Up => chain,
        SyncDirection::Down => chain.protect_vcs_metadata(),
    })
}
