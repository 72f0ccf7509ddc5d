use anyhow::{Context, Result};
use git2::{build::CheckoutBuilder, Branch, BranchType, Commit, Index, Oid, Repository, Signature, StatusOptions};
use graph::{CommitId, RebaseCallback, RebaseCommand, VcsActionHandler, VcsRef};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReplayError {
    #[error("{0} is not a local branch")]
    NotABranch(String),
    #[error("{branch} no longer points at {expected}")]
    BranchMoved { branch: String, expected: CommitId },
    #[error("working tree has uncommitted changes")]
    DirtyWorktree,
    #[error("replaying {commit} conflicts in {}", paths.join(", "))]
    Conflict { commit: CommitId, paths: Vec<String> },
}

/// Replays interactive rebase plans with in-memory cherry-picks.
///
/// New commits are built on top of the plan's base without touching the
/// working tree; only when every command succeeded is the branch moved.
pub struct GitRebaseHandler {
    repo: Repository,
    modifications_disabled: bool,
}

impl GitRebaseHandler {
    pub fn open<P: AsRef<Path>>(repo_path: P) -> Result<Self> {
        let repo = Repository::open(repo_path).context("Failed to open repository")?;
        Ok(Self {
            repo,
            modifications_disabled: false,
        })
    }

    /// Whether hosts should keep other edit actions locked
    pub fn modifications_disabled(&self) -> bool {
        self.modifications_disabled
    }

    fn replay(
        &self,
        subject: &VcsRef,
        base: &CommitId,
        commands: &[RebaseCommand],
        callback: &mut dyn RebaseCallback,
    ) -> Result<Oid> {
        self.subject_branch(subject)?;
        if !self.repo.is_bare() && !self.is_clean()? {
            return Err(ReplayError::DirtyWorktree.into());
        }
        let committer = self.get_signature()?;
        let base = self.find_commit(base)?;
        let mut tip = base.clone();

        for command in commands {
            let original = self.find_commit(command.commit())?;
            let index = self.pick_onto(&original, &tip)?;
            let tree = self.repo.find_tree(index_tree(&self.repo, index)?)?;

            let new_oid = match command {
                // Folding into the base itself would rewrite history we do not own.
                RebaseCommand::Fixup(_) if tip.id() != base.id() => {
                    let parents: Vec<Commit> = tip.parents().collect();
                    let parents: Vec<&Commit> = parents.iter().collect();
                    self.repo.commit(
                        None,
                        &tip.author(),
                        &committer,
                        tip.message().unwrap_or(""),
                        &tree,
                        &parents,
                    )?
                }
                RebaseCommand::Reword(_, message) => {
                    self.repo
                        .commit(None, &original.author(), &committer, message, &tree, &[&tip])?
                }
                RebaseCommand::Pick(_) | RebaseCommand::Fixup(_) => self.repo.commit(
                    None,
                    &original.author(),
                    &committer,
                    original.message().unwrap_or(""),
                    &tree,
                    &[&tip],
                )?,
            };
            tip = self.repo.find_commit(new_oid)?;
            debug!(%command, new = %new_oid, "applied rebase command");
            callback.interactive_command_applied(command);
        }

        self.move_branch(subject, tip.id())?;
        Ok(tip.id())
    }

    /// Apply `commit`'s changes on top of `onto` in memory.
    fn pick_onto(&self, commit: &Commit, onto: &Commit) -> Result<Index> {
        let mainline = if commit.parent_count() > 1 { 1 } else { 0 };
        let index = self
            .repo
            .cherrypick_commit(commit, onto, mainline, None)
            .with_context(|| format!("Failed to cherry-pick {}", commit.id()))?;
        if index.has_conflicts() {
            let paths = get_conflicts(&index)?;
            warn!(commit = %commit.id(), ?paths, "rebase stopped on conflict");
            return Err(ReplayError::Conflict {
                commit: CommitId::new(commit.id().to_string()),
                paths,
            }
            .into());
        }
        Ok(index)
    }

    /// The local branch named by `subject`, still at the planned tip.
    fn subject_branch(&self, subject: &VcsRef) -> Result<Branch<'_>> {
        let not_a_branch = || ReplayError::NotABranch(subject.name.clone());
        if !subject.is_branch() {
            return Err(not_a_branch().into());
        }
        let branch = self
            .repo
            .find_branch(&subject.name, BranchType::Local)
            .map_err(|_| not_a_branch())?;
        let tip = branch.get().target().map(|oid| CommitId::new(oid.to_string()));
        if tip.as_ref() != Some(&subject.target) {
            warn!(branch = %subject.name, expected = %subject.target, "branch moved since planning");
            return Err(ReplayError::BranchMoved {
                branch: subject.name.clone(),
                expected: subject.target.clone(),
            }
            .into());
        }
        Ok(branch)
    }

    fn move_branch(&self, subject: &VcsRef, target: Oid) -> Result<()> {
        let mut branch = self.subject_branch(subject)?;
        let reference = branch
            .get_mut()
            .set_target(target, "vcslog: interactive rebase")
            .with_context(|| format!("Failed to update branch {}", subject.name))?;

        let checked_out = self
            .repo
            .head()
            .ok()
            .and_then(|head| head.name().map(|name| Some(name) == reference.name()))
            .unwrap_or(false);
        if checked_out && !self.repo.is_bare() {
            self.repo
                .checkout_head(Some(CheckoutBuilder::new().force()))
                .context("Failed to check out rebased branch")?;
        }
        Ok(())
    }

    fn is_clean(&self) -> Result<bool> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(false).include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut opts))?;
        Ok(statuses.is_empty())
    }

    fn find_commit(&self, id: &CommitId) -> Result<Commit<'_>> {
        let oid = Oid::from_str(id.as_str()).with_context(|| format!("Invalid commit id {id}"))?;
        self.repo
            .find_commit(oid)
            .with_context(|| format!("Commit {id} not found"))
    }

    /// Get signature for rewritten commits
    fn get_signature(&self) -> Result<Signature<'static>> {
        let config = self.repo.config()?;

        let name = config
            .get_string("user.name")
            .unwrap_or_else(|_| "vcslog".to_string());
        let email = config
            .get_string("user.email")
            .unwrap_or_else(|_| "vcslog@localhost".to_string());

        Ok(Signature::now(&name, &email)?)
    }
}

impl VcsActionHandler for GitRebaseHandler {
    fn disable_modifications(&mut self) {
        self.modifications_disabled = true;
    }

    fn enable_modifications(&mut self) {
        self.modifications_disabled = false;
    }

    fn interactive_rebase(
        &mut self,
        subject: &VcsRef,
        base: &CommitId,
        commands: &[RebaseCommand],
        callback: &mut dyn RebaseCallback,
    ) -> Result<()> {
        let tip = self.replay(subject, base, commands, callback)?;
        info!(branch = %subject.name, %tip, commands = commands.len(), "interactive rebase finished");
        Ok(())
    }
}

fn index_tree(repo: &Repository, mut index: Index) -> Result<Oid> {
    Ok(index.write_tree_to(repo)?)
}

/// Get list of conflicted files
fn get_conflicts(index: &Index) -> Result<Vec<String>> {
    let mut conflicts = Vec::new();
    for conflict in index.conflicts()? {
        let conflict = conflict?;
        let entry = conflict.our.or(conflict.their).or(conflict.ancestor);
        if let Some(entry) = entry {
            let path = String::from_utf8_lossy(&entry.path).into_owned();
            if !conflicts.contains(&path) {
                conflicts.push(path);
            }
        }
    }
    Ok(conflicts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_repo() -> Result<(TempDir, Repository)> {
        let dir = TempDir::new()?;
        let repo = Repository::init(dir.path())?;

        let mut config = repo.config()?;
        config.set_str("user.name", "Test User")?;
        config.set_str("user.email", "test@example.com")?;

        Ok((dir, repo))
    }

    /// Write `file`, stage it and commit on HEAD.
    fn commit_file(repo: &Repository, dir: &TempDir, file: &str, content: &str, message: &str) -> Result<CommitId> {
        fs::write(dir.path().join(file), content)?;
        let mut index = repo.index()?;
        index.add_path(Path::new(file))?;
        index.write()?;
        let tree = repo.find_tree(index.write_tree()?)?;
        let sig = Signature::now("Test User", "test@example.com")?;
        let parents: Vec<Commit> = match repo.head() {
            Ok(head) => vec![head.peel_to_commit()?],
            Err(_) => Vec::new(),
        };
        let parents: Vec<&Commit> = parents.iter().collect();
        let oid = repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;
        Ok(CommitId::new(oid.to_string()))
    }

    /// Messages from HEAD down to the root
    fn history(repo: &Repository) -> Result<Vec<String>> {
        let mut commit = repo.head()?.peel_to_commit()?;
        let mut messages = vec![commit.summary().unwrap_or("").to_string()];
        while let Ok(parent) = commit.parent(0) {
            messages.push(parent.summary().unwrap_or("").to_string());
            commit = parent;
        }
        Ok(messages)
    }

    fn branch(repo: &Repository) -> Result<VcsRef> {
        let head = repo.head()?;
        let name = head.shorthand().unwrap_or("master").to_string();
        Ok(VcsRef::new(name, head.target().map(|o| o.to_string()).unwrap_or_default()))
    }

    fn run(handler: &mut GitRebaseHandler, subject: &VcsRef, base: &CommitId, commands: &[RebaseCommand]) -> Result<Vec<RebaseCommand>> {
        let mut applied = Vec::new();
        handler.interactive_rebase(subject, base, commands, &mut |c: &RebaseCommand| applied.push(c.clone()))?;
        Ok(applied)
    }

    #[test]
    fn reorders_and_rewords() -> Result<()> {
        let (dir, repo) = create_test_repo()?;
        let a = commit_file(&repo, &dir, "a.txt", "a", "A")?;
        let b = commit_file(&repo, &dir, "b.txt", "b", "B")?;
        let c = commit_file(&repo, &dir, "c.txt", "c", "C")?;
        let subject = branch(&repo)?;

        let mut handler = GitRebaseHandler::open(dir.path())?;
        let commands = vec![
            RebaseCommand::Pick(c),
            RebaseCommand::Reword(b, "B reworded".into()),
        ];
        let applied = run(&mut handler, &subject, &a, &commands)?;

        assert_eq!(applied, commands);
        assert_eq!(history(&repo)?, vec!["B reworded", "C", "A"]);
        assert!(dir.path().join("b.txt").exists());
        assert!(dir.path().join("c.txt").exists());
        Ok(())
    }

    #[test]
    fn fixup_folds_into_previous_commit() -> Result<()> {
        let (dir, repo) = create_test_repo()?;
        let a = commit_file(&repo, &dir, "a.txt", "a", "A")?;
        let b = commit_file(&repo, &dir, "b.txt", "b", "B")?;
        let c = commit_file(&repo, &dir, "c.txt", "c", "C")?;
        let subject = branch(&repo)?;

        let mut handler = GitRebaseHandler::open(dir.path())?;
        run(&mut handler, &subject, &a, &[RebaseCommand::Pick(b), RebaseCommand::Fixup(c)])?;

        assert_eq!(history(&repo)?, vec!["B", "A"]);
        let head = repo.head()?.peel_to_commit()?;
        let tree = head.tree()?;
        assert!(tree.get_name("b.txt").is_some());
        assert!(tree.get_name("c.txt").is_some());
        Ok(())
    }

    #[test]
    fn conflict_leaves_branch_alone() -> Result<()> {
        let (dir, repo) = create_test_repo()?;
        let a = commit_file(&repo, &dir, "f.txt", "one\n", "A")?;
        commit_file(&repo, &dir, "f.txt", "two\n", "B")?;
        let c = commit_file(&repo, &dir, "f.txt", "three\n", "C")?;
        let subject = branch(&repo)?;

        let mut handler = GitRebaseHandler::open(dir.path())?;
        let err = run(&mut handler, &subject, &a, &[RebaseCommand::Pick(c.clone())]).unwrap_err();
        match err.downcast_ref::<ReplayError>() {
            Some(ReplayError::Conflict { commit, paths }) => {
                assert_eq!(commit, &c);
                assert_eq!(paths, &vec!["f.txt".to_string()]);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(history(&repo)?, vec!["C", "B", "A"]);
        Ok(())
    }

    #[test]
    fn dirty_worktree_is_rejected() -> Result<()> {
        let (dir, repo) = create_test_repo()?;
        let a = commit_file(&repo, &dir, "a.txt", "a", "A")?;
        let b = commit_file(&repo, &dir, "b.txt", "b", "B")?;
        fs::write(dir.path().join("a.txt"), "edited")?;
        let subject = branch(&repo)?;

        let mut handler = GitRebaseHandler::open(dir.path())?;
        let err = run(&mut handler, &subject, &a, &[RebaseCommand::Pick(b)]).unwrap_err();
        assert_eq!(err.downcast_ref::<ReplayError>(), Some(&ReplayError::DirtyWorktree));
        Ok(())
    }

    #[test]
    fn only_local_branches_are_rewritten() -> Result<()> {
        let (dir, repo) = create_test_repo()?;
        let a = commit_file(&repo, &dir, "a.txt", "a", "A")?;
        commit_file(&repo, &dir, "b.txt", "b", "B")?;
        let c = commit_file(&repo, &dir, "c.txt", "c", "C")?;
        let tip = repo.find_commit(Oid::from_str(c.as_str())?)?;
        repo.tag_lightweight("v1", tip.as_object(), false)?;

        let mut handler = GitRebaseHandler::open(dir.path())?;
        let reword = [RebaseCommand::Reword(c.clone(), "X".into())];
        for subject in [
            VcsRef::new("HEAD", c.clone()),
            VcsRef::head(c.clone()),
            VcsRef::new("v1", c.clone()),
            VcsRef::tag("v1", c.clone()),
        ] {
            let mut applied = Vec::new();
            let err = handler
                .interactive_rebase(&subject, &a, &reword, &mut |c: &RebaseCommand| applied.push(c.clone()))
                .unwrap_err();
            assert_eq!(
                err.downcast_ref::<ReplayError>(),
                Some(&ReplayError::NotABranch(subject.name.clone()))
            );
            assert!(applied.is_empty());
        }

        assert!(repo.find_reference("refs/heads/HEAD").is_err());
        assert!(repo.find_reference("refs/heads/v1").is_err());
        assert_eq!(history(&repo)?, vec!["C", "B", "A"]);
        Ok(())
    }

    #[test]
    fn moved_branch_is_not_overwritten() -> Result<()> {
        let (dir, repo) = create_test_repo()?;
        let a = commit_file(&repo, &dir, "a.txt", "a", "A")?;
        let b = commit_file(&repo, &dir, "b.txt", "b", "B")?;
        let planned = branch(&repo)?;
        commit_file(&repo, &dir, "c.txt", "c", "C")?;

        let mut handler = GitRebaseHandler::open(dir.path())?;
        let err = run(&mut handler, &planned, &a, &[RebaseCommand::Reword(b, "B2".into())]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ReplayError>(),
            Some(&ReplayError::BranchMoved {
                branch: planned.name.clone(),
                expected: planned.target.clone(),
            })
        );
        assert_eq!(history(&repo)?, vec!["C", "B", "A"]);
        Ok(())
    }

    #[test]
    fn modification_lock_toggles() -> Result<()> {
        let (dir, _repo) = create_test_repo()?;
        let mut handler = GitRebaseHandler::open(dir.path())?;
        handler.disable_modifications();
        assert!(handler.modifications_disabled());
        handler.enable_modifications();
        assert!(!handler.modifications_disabled());
        Ok(())
    }
}
