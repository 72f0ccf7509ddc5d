use super::VcsLogProvider;
use crate::core::{Commit, CommitDetail, CommitId, VcsRef};
use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use git2::{Oid, Repository, Revwalk, Sort};
use std::collections::HashSet;
use tracing::debug;

/// Reads history pages from a git repository.
///
/// Every page walks the refs as they are now and skips commits already
/// handed out, so commits created between reads are picked up instead of
/// shifting the page boundaries.
pub struct GitLogProvider {
    repo: Repository,
    /// Commits handed out so far
    seen: HashSet<Oid>,
}

impl GitLogProvider {
    pub fn new(repo_path: Option<&str>) -> Result<Self> {
        let repo = match repo_path {
            Some(path) => Repository::open(path),
            None => Repository::open_from_env(),
        }
        .context("Failed to open repository")?;

        Ok(Self {
            repo,
            seen: HashSet::new(),
        })
    }

    pub fn loaded(&self) -> usize {
        self.seen.len()
    }

    /// Walk from HEAD and all local branches, newest first.
    fn revwalk(&self) -> Result<Revwalk<'_>> {
        let mut revwalk = self.repo.revwalk()?;
        if self.repo.head().is_ok() {
            revwalk.push_head()?;
        }
        for branch in self.repo.branches(Some(git2::BranchType::Local))? {
            let (branch, _) = branch?;
            if let Some(target) = branch.get().target() {
                revwalk.push(target)?;
            }
        }
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
        Ok(revwalk)
    }

    fn find_commit(&self, id: &CommitId) -> Result<git2::Commit<'_>> {
        let oid = Oid::from_str(id.as_str()).with_context(|| format!("Invalid commit id {id}"))?;
        self.repo
            .find_commit(oid)
            .with_context(|| format!("Commit {id} not found"))
    }
}

impl VcsLogProvider for GitLogProvider {
    fn read_next_part(&mut self, limit: usize) -> Result<Vec<Commit>> {
        let mut page = Vec::with_capacity(limit);
        let mut oids = Vec::with_capacity(limit);
        for oid in self.revwalk()? {
            if page.len() == limit {
                break;
            }
            let oid = oid?;
            if self.seen.contains(&oid) {
                continue;
            }
            let commit = self.repo.find_commit(oid)?;
            page.push(to_log_commit(&commit)?);
            oids.push(oid);
        }
        // Nothing counts as seen unless the whole page was read.
        self.seen.extend(oids);
        debug!(page = page.len(), loaded = self.seen.len(), "read history page");
        Ok(page)
    }

    fn read_commits_data(&self, ids: &[CommitId]) -> Result<Vec<CommitDetail>> {
        ids.iter()
            .map(|id| {
                let commit = self.find_commit(id)?;
                let author = commit.author();
                Ok(CommitDetail {
                    id: id.clone(),
                    author: author.name().unwrap_or("Unknown").to_string(),
                    email: author.email().unwrap_or("").to_string(),
                    subject: commit.summary().unwrap_or("").to_string(),
                    message: commit.message().unwrap_or("").to_string(),
                    timestamp: commit_time(&commit)?,
                })
            })
            .collect()
    }

    fn refs(&self) -> Result<Vec<VcsRef>> {
        let mut refs = Vec::new();

        if let Ok(head) = self.repo.head() {
            if let Some(target) = head.target() {
                refs.push(VcsRef::head(target.to_string()));
            }
        }

        for branch in self.repo.branches(Some(git2::BranchType::Local))? {
            let (branch, _) = branch?;
            if let (Some(name), Some(target)) = (branch.name()?, branch.get().target()) {
                refs.push(VcsRef::new(name, target.to_string()));
            }
        }

        // Tags, peeled to the commit they mark
        for reference in self.repo.references_glob("refs/tags/*")? {
            let reference = reference?;
            let (Some(name), Ok(commit)) = (reference.shorthand(), reference.peel_to_commit()) else {
                continue;
            };
            refs.push(VcsRef::tag(name, commit.id().to_string()));
        }

        Ok(refs)
    }
}

fn commit_time(commit: &git2::Commit) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(commit.time().seconds(), 0)
        .single()
        .context("Invalid commit timestamp")
}

fn to_log_commit(commit: &git2::Commit) -> Result<Commit> {
    Ok(Commit::new(
        commit.id().to_string(),
        commit.parent_ids().map(|oid| CommitId::new(oid.to_string())),
        commit_time(commit)?,
    ))
}
