pub mod graph;
pub mod heads;
pub mod sort;

pub use graph::{GraphStats, NodeKind, NodeRow, PermanentGraph};
pub use heads::{stable_color, HeadColorManager, RefColorManager};
pub use sort::SortType;
