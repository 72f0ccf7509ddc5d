pub mod commit;
pub mod edge;
pub mod store;

pub use commit::{Commit, CommitDetail, CommitId, CommitIdx, RefKind, VcsRef};
pub use edge::{EdgeKind, GraphEdge, GraphElement};
pub use store::CommitStore;
