//! Workspace synchronization filter chain.
//!
//! Keys are workspace-relative paths with `/` separators, e.g. `src/main.rs`.
//! A chain is evaluated rule by rule; the first rule that rejects a key wins.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::domain::error::SettingsError;

/// Prefix of version-control metadata that is never pulled back down.
pub const VCS_METADATA_PREFIX: &str = ".git/";

/// One user-supplied filter entry, classified against the local filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterPattern {
    /// Literal glob, matched as written.
    Glob(String),
    /// Names a local directory; matches everything below it.
    Directory(String),
}

impl FilterPattern {
    /// Classify `raw`; `is_dir` tells whether it names a local directory.
    #[must_use]
    pub fn classify(raw: &str, is_dir: bool) -> Self {
        let trimmed = raw.strip_prefix("./").unwrap_or(raw);
        if is_dir {
            FilterPattern::Directory(trimmed.trim_end_matches('/').to_string())
        } else {
            FilterPattern::Glob(trimmed.to_string())
        }
    }

    /// Glob text handed to the matcher.
    #[must_use]
    pub fn glob(&self) -> String {
        match self {
            FilterPattern::Glob(glob) => glob.clone(),
            FilterPattern::Directory(root) => format!("{root}/**"),
        }
    }
}

/// Compiled set of filter patterns.
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<FilterPattern>,
    set: GlobSet,
}

impl PatternSet {
    /// Compile `patterns`. `*` never crosses a `/`; dot-files are matched.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::InvalidPattern`] for malformed globs.
    pub fn compile(patterns: Vec<FilterPattern>) -> Result<Self, SettingsError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &patterns {
            let text = pattern.glob();
            let glob = GlobBuilder::new(&text)
                .literal_separator(true)
                .build()
                .map_err(|source| SettingsError::InvalidPattern {
                    pattern: text.clone(),
                    source,
                })?;
            builder.add(glob);
        }
        let set = builder
            .build()
            .map_err(|source| SettingsError::InvalidPattern {
                pattern: patterns
                    .iter()
                    .map(FilterPattern::glob)
                    .collect::<Vec<_>>()
                    .join(","),
                source,
            })?;
        Ok(Self { patterns, set })
    }

    #[must_use]
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            set: GlobSet::empty(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether any pattern matches `key`. A directory pattern never matches
    /// the directory itself, only what lies below it.
    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        self.set
            .matches(key)
            .into_iter()
            .any(|idx| match &self.patterns[idx] {
                FilterPattern::Directory(root) => key != root,
                FilterPattern::Glob(_) => true,
            })
    }
}

/// One step of a [`FilterChain`].
#[derive(Debug, Clone)]
pub enum FilterRule {
    /// Rejects every key matching the set.
    Exclude(PatternSet),
    /// Rejects every key matching nothing in the set, so a non-empty include
    /// list is a whitelist. An empty set rejects nothing. The teardown
    /// sidecar's sync arguments reproduce this with a leading `--exclude '*'`.
    Include(PatternSet),
    /// Rejects every key under a fixed prefix.
    ExcludePrefix(&'static str),
}

impl FilterRule {
    fn allows(&self, key: &str) -> bool {
        match self {
            FilterRule::Exclude(set) => !set.matches(key),
            FilterRule::Include(set) => set.is_empty() || set.matches(key),
            FilterRule::ExcludePrefix(prefix) => !key.starts_with(prefix),
        }
    }
}

/// Ordered predicate chain deciding which keys a sync transfers.
#[derive(Debug, Clone)]
pub struct FilterChain {
    rules: Vec<FilterRule>,
}

impl FilterChain {
    /// Exclude rule first, include rule second: excludes always win.
    #[must_use]
    pub fn new(excludes: PatternSet, includes: PatternSet) -> Self {
        Self {
            rules: vec![FilterRule::Exclude(excludes), FilterRule::Include(includes)],
        }
    }

    /// Append the rule protecting version-control metadata (download only).
    #[must_use]
    pub fn protect_vcs_metadata(mut self) -> Self {
        self.rules.push(FilterRule::ExcludePrefix(VCS_METADATA_PREFIX));
        self
    }

    #[must_use]
    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    #[must_use]
    pub fn allows(&self, key: &str) -> bool {
        self.rules.iter().all(|rule| rule.allows(key))
    }
}
