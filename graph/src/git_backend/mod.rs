pub mod walker;

pub use walker::GitLogProvider;

use crate::core::{Commit, CommitDetail, CommitId, VcsRef};
use anyhow::Result;

/// Source of history pages and commit details.
pub trait VcsLogProvider {
    /// Next `limit` commits in log order. The read position only advances
    /// when the page is returned successfully.
    fn read_next_part(&mut self, limit: usize) -> Result<Vec<Commit>>;

    fn read_commits_data(&self, ids: &[CommitId]) -> Result<Vec<CommitDetail>>;

    fn refs(&self) -> Result<Vec<VcsRef>>;
}
