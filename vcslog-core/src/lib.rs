pub mod rebase;

pub use rebase::{GitRebaseHandler, ReplayError};
