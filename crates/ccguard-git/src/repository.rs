// crates/ccguard-git/src/repository.rs
// ============================================================================
// Module: Git Repository
// Description: VersionControl implementation over a discovered repository.
// Purpose: Resolve revisions, merge bases, and paged ancestor windows.
// Dependencies: ccguard-core, git2, tracing
// ============================================================================

//! ## Overview
//! Revisions accept anything `git rev-parse` accepts (`HEAD`, `main`,
//! `HEAD^`, abbreviated ids). Ancestor windows are pulled from a revwalk on
//! demand; history is never materialized in full.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;

use ccguard_core::CommitBatches;
use ccguard_core::CommitId;
use ccguard_core::VcsError;
use ccguard_core::VersionControl;
use git2::Commit;
use git2::ErrorCode;
use git2::Repository;
use git2::Revwalk;
use git2::Sort;
use tracing::debug;

// ============================================================================
// SECTION: Repository
// ============================================================================

/// Git repository opened through libgit2.
pub struct GitRepository {
    /// Underlying libgit2 handle.
    repo: Repository,
}

impl GitRepository {
    /// Discovers the repository containing `path`.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError::Repository`] when no repository encloses `path`.
    pub fn discover(path: &Path) -> Result<Self, VcsError> {
        let repo = Repository::discover(path).map_err(|err| {
            VcsError::Repository(format!("{}: {}", path.display(), err.message()))
        })?;
        Ok(Self {
            repo,
        })
    }

    /// Resolves a revision expression to a commit id.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError::UnknownRevision`] when `spec` does not name a commit.
    pub fn resolve(&self, spec: &str) -> Result<CommitId, VcsError> {
        Ok(CommitId::new(self.commit(spec)?.id().to_string()))
    }

    /// Returns the checked-out branch name, or `None` for a detached or
    /// unborn `HEAD`.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError::Repository`] when `HEAD` cannot be read.
    pub fn current_branch(&self) -> Result<Option<String>, VcsError> {
        match self.repo.head() {
            Ok(head) if head.is_branch() => Ok(head.shorthand().map(str::to_string)),
            Ok(_) => Ok(None),
            Err(err) if err.code() == ErrorCode::UnbornBranch => Ok(None),
            Err(err) => Err(VcsError::Repository(err.message().to_string())),
        }
    }

    /// Returns the first line of a commit message.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError::UnknownRevision`] when the commit is unknown.
    pub fn commit_subject(&self, commit: &CommitId) -> Result<String, VcsError> {
        let commit = self.commit(commit.as_str())?;
        Ok(commit.summary().unwrap_or_default().to_string())
    }

    /// Resolves a revision expression to a commit object.
    fn commit(&self, spec: &str) -> Result<Commit<'_>, VcsError> {
        self.repo
            .revparse_single(spec)
            .and_then(|object| object.peel_to_commit())
            .map_err(|err| VcsError::UnknownRevision(format!("{spec}: {}", err.message())))
    }

    /// Starts a walk from `refs` (`HEAD` when empty).
    ///
    /// Sorting is applied before any push; changing it resets the walk.
    fn walk(&self, refs: &[String], sort: Sort) -> Result<Revwalk<'_>, VcsError> {
        let mut walk =
            self.repo.revwalk().map_err(|err| VcsError::Walk(err.message().to_string()))?;
        walk.set_sorting(sort).map_err(|err| VcsError::Walk(err.message().to_string()))?;
        if refs.is_empty() {
            walk.push(self.commit("HEAD")?.id())
                .map_err(|err| VcsError::Walk(err.message().to_string()))?;
        }
        for spec in refs {
            walk.push(self.commit(spec)?.id())
                .map_err(|err| VcsError::Walk(err.message().to_string()))?;
        }
        Ok(walk)
    }
}

impl VersionControl for GitRepository {
    fn repository_root_commit(&self) -> Result<CommitId, VcsError> {
        let walk = self.walk(&[], Sort::TOPOLOGICAL | Sort::TIME | Sort::REVERSE)?;
        for oid in walk {
            let oid = oid.map_err(|err| VcsError::Walk(err.message().to_string()))?;
            let commit =
                self.repo.find_commit(oid).map_err(|err| VcsError::Walk(err.message().to_string()))?;
            if commit.parent_count() == 0 {
                return Ok(CommitId::new(oid.to_string()));
            }
        }
        Err(VcsError::Walk("no root commit reachable from HEAD".to_string()))
    }

    fn current_commit(&self) -> Result<CommitId, VcsError> {
        self.resolve("HEAD")
    }

    fn merge_base(&self, branch: &str, reference: &str) -> Result<Option<CommitId>, VcsError> {
        let left = self.commit(branch)?.id();
        let right = self.commit(reference)?.id();
        match self.repo.merge_base(left, right) {
            Ok(oid) => Ok(Some(CommitId::new(oid.to_string()))),
            Err(err) if err.code() == ErrorCode::NotFound => {
                debug!(branch, reference, "no merge base");
                Ok(None)
            }
            Err(err) => Err(VcsError::Walk(err.message().to_string())),
        }
    }

    fn first_parent(&self, commit: &CommitId) -> Result<Option<CommitId>, VcsError> {
        let commit = self.commit(commit.as_str())?;
        Ok(commit.parent_ids().next().map(|oid| CommitId::new(oid.to_string())))
    }

    fn ancestor_batches(
        &self,
        refs: &[String],
        page_size: usize,
    ) -> Result<CommitBatches<'_>, VcsError> {
        let walk = self.walk(refs, Sort::TOPOLOGICAL | Sort::TIME)?;
        Ok(Box::new(AncestorBatches {
            walk,
            page_size: page_size.max(1),
            exhausted: false,
        }))
    }

    fn tracked_files(&self) -> Result<BTreeSet<String>, VcsError> {
        let index = self.repo.index().map_err(|err| VcsError::Repository(err.message().to_string()))?;
        Ok(index.iter().map(|entry| String::from_utf8_lossy(&entry.path).into_owned()).collect())
    }

    fn root_path(&self) -> Result<PathBuf, VcsError> {
        self.repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| VcsError::Repository("bare repository has no working tree".to_string()))
    }
}

// ============================================================================
// SECTION: Ancestor Windows
// ============================================================================

/// Lazy window iterator over a revwalk.
struct AncestorBatches<'repo> {
    /// Underlying walk, advanced one window at a time.
    walk: Revwalk<'repo>,
    /// Maximum commits per window.
    page_size: usize,
    /// Set once the walk ends or fails.
    exhausted: bool,
}

impl Iterator for AncestorBatches<'_> {
    type Item = Result<Vec<CommitId>, VcsError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        let mut window = Vec::with_capacity(self.page_size);
        while window.len() < self.page_size {
            match self.walk.next() {
                Some(Ok(oid)) => window.push(CommitId::new(oid.to_string())),
                Some(Err(err)) => {
                    self.exhausted = true;
                    return Some(Err(VcsError::Walk(err.message().to_string())));
                }
                None => {
                    self.exhausted = true;
                    break;
                }
            }
        }
        if window.is_empty() {
            return None;
        }
        debug!(size = window.len(), "ancestor window pulled");
        Some(Ok(window))
    }
}
