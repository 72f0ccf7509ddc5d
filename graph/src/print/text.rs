use super::{GraphPrintCell, PrintElementKind, PrintModel};
use crate::core::{EdgeKind, GraphElement};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Box drawing characters for graph rendering
pub mod chars {
    pub const VERTICAL: char = '│';
    pub const HORIZONTAL: char = '─';
    pub const CROSS: char = '┼';
    pub const COMMIT: char = '●';
    pub const COMMIT_SELECTED: char = '◉';
    pub const NOT_LOADED: char = '○';
    pub const LONG_EDGE: char = '┆';
    pub const NOT_LOADED_EDGE: char = '╎';

    pub const FORK_RIGHT: char = '╮';
    pub const FORK_LEFT: char = '╭';
    pub const JOIN_RIGHT: char = '╯';
    pub const JOIN_LEFT: char = '╰';
    pub const SPACE: char = ' ';
    pub const ELLIPSIS: char = '…';
}

/// Plain-text renderer for a print model, two characters per lane.
#[derive(Debug, Clone, Copy)]
pub struct TextPrinter {
    /// Maximum label width in terminal cells, `None` for unlimited
    label_width: Option<usize>,
}

impl Default for TextPrinter {
    fn default() -> Self {
        Self { label_width: None }
    }
}

impl TextPrinter {
    pub fn new(label_width: Option<usize>) -> Self {
        Self { label_width }
    }

    /// Render every visible row; `label` receives the permanent row.
    pub fn print(&self, model: &PrintModel, mut label: impl FnMut(usize) -> String) -> String {
        let cells: Vec<GraphPrintCell> = (0..model.visible_row_count())
            .filter_map(|row| model.get_graph_print_cell(row))
            .collect();
        let width = cells.iter().map(GraphPrintCell::width).max().unwrap_or(0);

        let mut out = String::new();
        for cell in &cells {
            let graph = self.render_cell(cell, width);
            out.push_str(graph.trim_end());
            let text = label(cell.permanent_row);
            if !text.is_empty() {
                out.push(chars::SPACE);
                out.push_str(&self.truncate(&text));
            }
            out.push('\n');
        }
        out
    }

    /// Graph part of one row, padded to `lanes` lanes.
    pub fn render_cell(&self, cell: &GraphPrintCell, lanes: usize) -> String {
        let mut grid = vec![chars::SPACE; lanes.max(cell.width()) * 2];

        for e in &cell.elements {
            if let PrintElementKind::EdgePass { column } = e.kind {
                grid[column * 2] = edge_char(&e.element);
            }
        }
        for e in &cell.elements {
            match e.kind {
                PrintElementKind::EdgeStart { from, to } if to > from => {
                    horizontal(&mut grid, from * 2 + 1, to * 2);
                    grid[to * 2] = chars::FORK_RIGHT;
                }
                PrintElementKind::EdgeStart { from, to } if to < from => {
                    horizontal(&mut grid, to * 2 + 1, from * 2);
                    grid[to * 2] = chars::FORK_LEFT;
                }
                PrintElementKind::EdgeEnd { from, to } if from > to => {
                    horizontal(&mut grid, to * 2 + 1, from * 2);
                    grid[from * 2] = chars::JOIN_RIGHT;
                }
                PrintElementKind::EdgeEnd { from, to } if from < to => {
                    horizontal(&mut grid, from * 2 + 1, to * 2);
                    grid[from * 2] = chars::JOIN_LEFT;
                }
                _ => {}
            }
        }
        for e in &cell.elements {
            if let PrintElementKind::Node { column } = e.kind {
                grid[column * 2] = match e.element {
                    GraphElement::Node(_) if e.selected => chars::COMMIT_SELECTED,
                    _ => chars::COMMIT,
                };
            }
        }
        if cell.not_loaded {
            grid[cell.node_column * 2] = chars::NOT_LOADED;
        }
        grid.into_iter().collect()
    }

    fn truncate(&self, text: &str) -> String {
        let Some(max) = self.label_width else {
            return text.to_string();
        };
        if text.width() <= max {
            return text.to_string();
        }
        let mut out = String::new();
        let mut used = 0;
        for g in text.graphemes(true) {
            let w = g.width();
            if used + w + 1 > max {
                break;
            }
            out.push_str(g);
            used += w;
        }
        out.push(chars::ELLIPSIS);
        out
    }
}

fn horizontal(grid: &mut [char], from: usize, to: usize) {
    for slot in &mut grid[from..to] {
        *slot = match *slot {
            chars::SPACE => chars::HORIZONTAL,
            chars::HORIZONTAL => chars::HORIZONTAL,
            _ => chars::CROSS,
        };
    }
}

fn edge_char(element: &GraphElement) -> char {
    match element {
        GraphElement::Edge(edge) => match edge.kind {
            EdgeKind::Usual => chars::VERTICAL,
            EdgeKind::NotLoaded => chars::NOT_LOADED_EDGE,
            EdgeKind::Long(_) => chars::LONG_EDGE,
        },
        GraphElement::Node(_) => chars::VERTICAL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Commit, CommitId, CommitStore};
    use crate::fragment::{FragmentManager, GraphFragment};
    use crate::permanent::{PermanentGraph, RefColorManager, SortType};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn build(commits: &[(&str, &[&str])]) -> PermanentGraph {
        let mut store = CommitStore::new();
        store
            .extend(commits.iter().map(|(id, parents)| {
                Commit::new(*id, parents.iter().map(|p| CommitId::from(*p)), Utc::now())
            }))
            .unwrap();
        PermanentGraph::build(store, &RefColorManager::default(), SortType::LogOrder).unwrap()
    }

    fn label(graph: &PermanentGraph) -> impl FnMut(usize) -> String + '_ {
        move |row| {
            graph
                .commit_id_at(row)
                .map(|id| id.to_string())
                .unwrap_or_default()
        }
    }

    #[test]
    fn renders_merge() {
        let g = build(&[("m", &["a", "f"]), ("a", &["base"]), ("f", &["base"]), ("base", &[])]);
        let model = PrintModel::build(&g, &FragmentManager::default(), false);
        let text = TextPrinter::default().print(&model, label(&g));
        assert_eq!(
            text,
            "●─╮ m\n\
             ● │ a\n\
             │ ● f\n\
             ●─╯ base\n"
        );
    }

    #[test]
    fn renders_long_edge_and_sentinel() {
        let g = build(&[("m", &["x1", "y1"]), ("x1", &["x2"]), ("x2", &["b"]), ("y1", &["b"]), ("b", &["gone"])]);
        let mut fm = FragmentManager::default();
        fm.set_collapsed(
            &g,
            &GraphFragment {
                upper: 0,
                lower: 4,
                interior: vec![1, 2],
            },
            true,
        );
        let model = PrintModel::build(&g, &fm, false);
        let text = TextPrinter::default().print(&model, label(&g));
        assert_eq!(
            text,
            "●─╮ m\n\
             ┆ ● y1\n\
             ●─╯ b\n\
             ○\n"
        );
    }

    #[test]
    fn labels_are_truncated_by_width() {
        let printer = TextPrinter::new(Some(5));
        assert_eq!(printer.truncate("abc"), "abc");
        assert_eq!(printer.truncate("abcdefgh"), "abcd…");
        // Wide characters take two cells.
        assert_eq!(printer.truncate("日本語です"), "日本…");
    }
}
