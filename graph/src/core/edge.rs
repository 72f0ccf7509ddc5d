/// An edge between two rows of the permanent graph.
///
/// `up` is the child (newer, rendered higher), `down` the parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphEdge {
    pub up: usize,
    pub down: usize,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Regular parent-child relationship
    Usual,
    /// Points at the end-of-loaded-history sentinel
    NotLoaded,
    /// Stands in for a collapsed fragment whose top interior row is given
    Long(usize),
}

impl GraphEdge {
    pub fn new(up: usize, down: usize) -> Self {
        Self {
            up,
            down,
            kind: EdgeKind::Usual,
        }
    }

    pub fn not_loaded(up: usize, down: usize) -> Self {
        Self {
            up,
            down,
            kind: EdgeKind::NotLoaded,
        }
    }

    pub fn long(up: usize, down: usize, first_hidden: usize) -> Self {
        Self {
            up,
            down,
            kind: EdgeKind::Long(first_hidden),
        }
    }

    pub fn is_long(&self) -> bool {
        matches!(self.kind, EdgeKind::Long(_))
    }
}

/// Anything the user can point at in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphElement {
    /// A node, by permanent row
    Node(usize),
    Edge(GraphEdge),
}
