//! VCS plumbing against a real scratch repository (git2 directly, no
//! mocking — git is a core-engine responsibility, not a port).

use orchestrator_core::vcs;

use crate::fixtures::scratch_git_repo;

#[tokio::test]
async fn commit_advances_head_and_appears_in_log() {
    let dir = tempfile::tempdir().unwrap();
    let repo = scratch_git_repo(dir.path());
    drop(repo);

    std::fs::write(dir.path().join("feature.txt"), "new content\n").unwrap();
    let oid = vcs::commit(dir.path(), &["feature.txt"], "add feature").unwrap();
    assert!(!oid.is_empty());

    let log = vcs::log(dir.path(), 10).unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].summary, "add feature");
}

#[tokio::test]
async fn missing_remote_is_ok_none_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let repo = scratch_git_repo(dir.path());
    drop(repo);

    let remote = vcs::remote_url(dir.path(), "origin").unwrap();
    assert!(remote.is_none());
}

#[tokio::test]
async fn diff_reflects_unstaged_changes() {
    let dir = tempfile::tempdir().unwrap();
    let repo = scratch_git_repo(dir.path());
    drop(repo);

    std::fs::write(dir.path().join("README.md"), "scratch\nmore\n").unwrap();
    let diff = vcs::diff_against_head(dir.path()).unwrap();
    assert!(diff.contains("more"));
}

#[tokio::test]
async fn current_branch_reports_the_checked_out_branch() {
    let dir = tempfile::tempdir().unwrap();
    let repo = scratch_git_repo(dir.path());
    drop(repo);

    let branch = vcs::current_branch(dir.path()).unwrap();
    assert!(!branch.is_empty());
}
