//! Git plumbing: current branch, remote URL, diff,
//! log, commit. Git operations are a core-engine responsibility (side
//! effects on the working tree), not an external collaborator, so this
//! lives directly on `git2` rather than behind a port trait.

use std::fmt;
use std::path::Path;

use git2::Repository;

#[derive(Debug)]
pub struct VcsError(pub String);

impl fmt::Display for VcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "git error: {}", self.0)
    }
}

impl std::error::Error for VcsError {}

impl From<git2::Error> for VcsError {
    fn from(e: git2::Error) -> Self {
        Self(e.message().to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CommitSummary {
    pub id: String,
    pub summary: String,
    pub author: String,
}

pub fn current_branch(repo_root: &Path) -> Result<String, VcsError> {
    let repo = Repository::open(repo_root)?;
    let head = repo.head()?;
    Ok(head.shorthand().unwrap_or("HEAD").to_string())
}

pub fn remote_url(repo_root: &Path, remote_name: &str) -> Result<Option<String>, VcsError> {
    let repo = Repository::open(repo_root)?;
    match repo.find_remote(remote_name) {
        Ok(remote) => Ok(remote.url().map(|s| s.to_string())),
        Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn diff_against_head(repo_root: &Path) -> Result<String, VcsError> {
    let repo = Repository::open(repo_root)?;
    let head_tree = repo.head()?.peel_to_tree()?;
    let mut opts = git2::DiffOptions::new();
    let diff = repo.diff_tree_to_workdir_with_index(Some(&head_tree), Some(&mut opts))?;

    let mut rendered = String::new();
    diff.print(git2::DiffFormat::Patch, |_, _, line| {
        rendered.push_str(&String::from_utf8_lossy(line.content()));
        true
    })?;
    Ok(rendered)
}

pub fn log(repo_root: &Path, limit: usize) -> Result<Vec<CommitSummary>, VcsError> {
    let repo = Repository::open(repo_root)?;
    let mut walker = repo.revwalk()?;
    walker.push_head()?;

    let mut commits = Vec::new();
    for oid in walker.take(limit) {
        let oid = oid?;
        let commit = repo.find_commit(oid)?;
        commits.push(CommitSummary {
            id: oid.to_string(),
            summary: commit.summary().unwrap_or("").to_string(),
            author: commit.author().name().unwrap_or("unknown").to_string(),
        });
    }
    Ok(commits)
}

/// Stages every path under `paths` (or the whole worktree when empty)
/// and commits with `message`.
pub fn commit(repo_root: &Path, paths: &[&str], message: &str) -> Result<String, VcsError> {
    let repo = Repository::open(repo_root)?;
    let mut index = repo.index()?;

    if paths.is_empty() {
        index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)?;
    } else {
        for path in paths {
            index.add_path(Path::new(path))?;
        }
    }
    index.write()?;

    let tree_oid = index.write_tree()?;
    let tree = repo.find_tree(tree_oid)?;
    let signature = repo.signature()?;

    let parent_commit = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent_commit.iter().collect();

    let oid = repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;
    Ok(oid.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_repo_with_commit(dir: &Path) {
        let repo = Repository::init(dir).unwrap();
        std::fs::write(dir.join("README.md"), "hello").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("README.md")).unwrap();
        index.write().unwrap();
        let tree_oid = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_oid).unwrap();
        let sig = git2::Signature::now("test", "test@example.com").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[]).unwrap();
    }

    #[test]
    fn reads_current_branch_name() {
        let dir = tempfile::tempdir().unwrap();
        init_repo_with_commit(dir.path());
        let branch = current_branch(dir.path()).unwrap();
        assert!(!branch.is_empty());
    }

    #[test]
    fn missing_remote_is_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        init_repo_with_commit(dir.path());
        assert!(remote_url(dir.path(), "origin").unwrap().is_none());
    }

    #[test]
    fn commit_creates_new_head() {
        let dir = tempfile::tempdir().unwrap();
        init_repo_with_commit(dir.path());
        std::fs::write(dir.path().join("new.txt"), "content").unwrap();
        let oid = commit(dir.path(), &["new.txt"], "add new.txt").unwrap();
        assert!(!oid.is_empty());
        let commits = log(dir.path(), 10).unwrap();
        assert_eq!(commits.len(), 2);
    }
}
