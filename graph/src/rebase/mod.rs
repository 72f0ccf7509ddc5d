//! Interactive rebase planning over the permanent graph.
//!
//! The builder never touches real commits. It keeps an overlay chain of
//! fake commits rooted at a real `branch_base` and turns it into an ordered
//! [`RebaseCommand`] list for a [`VcsActionHandler`] once the user confirms.

mod builder;
mod command;
mod handler;

pub use builder::{InteractiveRebaseBuilder, RebaseState};
pub use command::{ChainLink, FakeCommit, FakeHash, FakeRef, InsertPosition, RebaseCommand, RebasePlan};
pub use handler::{RebaseCallback, VcsActionHandler};
