use super::command::{ChainLink, FakeCommit, FakeHash, FakeRef, InsertPosition, RebaseCommand, RebasePlan};
use super::handler::{RebaseCallback, VcsActionHandler};
use crate::core::{CommitId, CommitIdx, VcsRef};
use crate::error::RebaseError;
use crate::permanent::PermanentGraph;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebaseState {
    Idle,
    /// A fake chain exists
    Planning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Node {
    idx: CommitIdx,
    id: CommitId,
}

/// Plans a history rewrite as a chain of fake commits layered over the
/// real graph. Nothing is written until the plan is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InteractiveRebaseBuilder {
    subject: Option<VcsRef>,
    branch_base: Option<Node>,
    /// Newest first
    fake_branch: Vec<Node>,
    reworded: HashMap<FakeHash, String>,
    fixed_up: HashSet<FakeHash>,
    selected: BTreeSet<FakeHash>,
    insert_after: Option<usize>,
    result_ref: Option<FakeRef>,
}

impl InteractiveRebaseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RebaseState {
        if self.branch_base.is_some() {
            RebaseState::Planning
        } else {
            RebaseState::Idle
        }
    }

    pub fn subject(&self) -> Option<&VcsRef> {
        self.subject.as_ref()
    }

    pub fn branch_base(&self) -> Option<&CommitId> {
        self.branch_base.as_ref().map(|n| &n.id)
    }

    pub fn result_ref(&self) -> Option<&FakeRef> {
        self.result_ref.as_ref()
    }

    pub fn selected(&self) -> &BTreeSet<FakeHash> {
        &self.selected
    }

    /// Real row the fake chain is drawn after
    pub fn insert_after(&self) -> Option<usize> {
        self.insert_after
    }

    /// Rebase `subject` onto `onto`, taking every first-parent commit of
    /// the subject that `onto` does not already contain.
    pub fn start_rebase(
        &mut self,
        graph: &PermanentGraph,
        subject: &VcsRef,
        onto: CommitIdx,
    ) -> Result<(), RebaseError> {
        require_branch(subject)?;
        let head = resolve(graph, &subject.target)?;
        let contained = graph.ancestors(graph.row_of(onto));
        let mut path = Vec::new();
        let mut current = Some(head);
        loop {
            let Some(idx) = current else {
                warn!(subject = %subject.name, "no common ancestor with rebase target");
                return Err(RebaseError::NoCommonAncestor {
                    subject: subject.name.clone(),
                    onto: graph.store().id(onto).clone(),
                });
            };
            if contained[graph.row_of(idx)] {
                break;
            }
            path.push(idx);
            current = first_parent(graph, idx);
        }
        if path.is_empty() {
            return Err(RebaseError::NothingToRebase(subject.name.clone()));
        }
        self.start_rebase_onto(graph, subject, onto, &path)
    }

    /// Start a fresh plan that replays `nodes` on top of `base`. The chain
    /// follows graph row order whatever order `nodes` come in.
    pub fn start_rebase_onto(
        &mut self,
        graph: &PermanentGraph,
        subject: &VcsRef,
        base: CommitIdx,
        nodes: &[CommitIdx],
    ) -> Result<(), RebaseError> {
        require_branch(subject)?;
        self.reset();
        let mut chain: Vec<CommitIdx> = nodes.to_vec();
        chain.sort_by_key(|&idx| graph.row_of(idx));
        chain.dedup();

        self.subject = Some(subject.clone());
        self.branch_base = Some(node(graph, base));
        self.fake_branch = chain.iter().map(|&idx| node(graph, idx)).collect();
        self.selected = self
            .fake_branch
            .first()
            .map(|head| FakeHash::of(&head.id))
            .into_iter()
            .collect();
        self.insert_after = chain.iter().map(|&idx| graph.row_of(idx) + 1).max();
        self.update_result_ref();
        debug!(
            subject = %subject.name,
            base = %graph.store().id(base),
            commits = self.fake_branch.len(),
            "rebase plan started"
        );
        Ok(())
    }

    /// Re-insert `nodes` next to `anchor` and rebuild the whole fake chain.
    pub fn move_commits(
        &mut self,
        graph: &PermanentGraph,
        subject: &VcsRef,
        anchor: CommitIdx,
        position: InsertPosition,
        nodes: &[CommitIdx],
    ) -> Result<(), RebaseError> {
        require_branch(subject)?;
        let same_session = self
            .subject
            .as_ref()
            .is_some_and(|s| s.name == subject.name);
        let (lineage, chain_len) = if same_session {
            (self.lineage(graph), self.fake_branch.len())
        } else {
            (first_parent_walk(graph, resolve(graph, &subject.target)?), 0)
        };
        let pos = |idx: CommitIdx| lineage.iter().position(|&l| l == idx);

        let Some(anchor_pos) = pos(anchor) else {
            let id = graph.store().id(anchor).clone();
            warn!(anchor = %id, "move anchor is not on the rebased branch");
            return Err(RebaseError::NotOnBranch(id));
        };

        // The oldest commit that has to be rewritten decides the base.
        let mut base_pos = match position {
            InsertPosition::Above => anchor_pos,
            InsertPosition::Below => anchor_pos + 1,
        };
        base_pos = base_pos.max(chain_len);
        for &n in nodes {
            if let Some(p) = pos(n) {
                base_pos = base_pos.max(p + 1);
            }
        }
        let Some(&base) = lineage.get(base_pos) else {
            let root = lineage[lineage.len() - 1];
            let id = graph.store().id(root).clone();
            warn!(commit = %id, "cannot rebase below a root commit");
            return Err(RebaseError::RootAnchor(id));
        };

        let mut on_lineage: Vec<(usize, CommitIdx)> = Vec::new();
        let mut off_lineage: Vec<CommitIdx> = Vec::new();
        for &n in nodes {
            match pos(n) {
                Some(p) if !on_lineage.iter().any(|&(_, o)| o == n) => on_lineage.push((p, n)),
                None if !off_lineage.contains(&n) => off_lineage.push(n),
                _ => {}
            }
        }
        on_lineage.sort_by(|a, b| b.0.cmp(&a.0));
        let inserted: Vec<CommitIdx> = on_lineage
            .into_iter()
            .map(|(_, n)| n)
            .chain(off_lineage)
            .collect();

        // Oldest to newest
        let mut out: Vec<CommitIdx> = Vec::with_capacity(base_pos + inserted.len());
        if anchor == base && position == InsertPosition::Above {
            out.extend(&inserted);
        }
        for &c in lineage[..base_pos].iter().rev() {
            if c == anchor && position == InsertPosition::Below {
                out.extend(&inserted);
            }
            if !inserted.contains(&c) {
                out.push(c);
            }
            if c == anchor && position == InsertPosition::Above {
                out.extend(&inserted);
            }
        }

        if !same_session {
            self.reset();
            self.subject = Some(subject.clone());
        }
        self.branch_base = Some(node(graph, base));
        self.fake_branch = out.iter().rev().map(|&idx| node(graph, idx)).collect();
        self.selected = inserted
            .iter()
            .map(|&idx| FakeHash::of(graph.store().id(idx)))
            .collect();
        self.insert_after = inserted.iter().map(|&idx| graph.row_of(idx) + 1).max();
        self.update_result_ref();
        debug!(
            base = %graph.store().id(base),
            moved = inserted.len(),
            ?position,
            "rebase plan rebuilt"
        );
        Ok(())
    }

    pub fn reword(
        &mut self,
        graph: &PermanentGraph,
        subject: &VcsRef,
        commit: CommitIdx,
        message: impl Into<String>,
    ) -> Result<(), RebaseError> {
        self.move_commits(graph, subject, commit, InsertPosition::Above, &[commit])?;
        self.reworded
            .insert(FakeHash::of(graph.store().id(commit)), message.into());
        Ok(())
    }

    /// Squash `nodes` into `target`, keeping the target's message.
    pub fn fix_up(
        &mut self,
        graph: &PermanentGraph,
        subject: &VcsRef,
        target: CommitIdx,
        nodes: &[CommitIdx],
    ) -> Result<(), RebaseError> {
        self.move_commits(graph, subject, target, InsertPosition::Below, nodes)?;
        for &n in nodes {
            self.fixed_up.insert(FakeHash::of(graph.store().id(n)));
        }
        Ok(())
    }

    /// The fake chain, newest first, each entry linked to its parent.
    pub fn fake_chain(&self) -> Vec<FakeCommit> {
        let Some(base) = &self.branch_base else {
            return Vec::new();
        };
        self.fake_branch
            .iter()
            .enumerate()
            .map(|(i, n)| {
                let hash = FakeHash::of(&n.id);
                let parent = match self.fake_branch.get(i + 1) {
                    Some(older) => ChainLink::Fake(FakeHash::of(&older.id)),
                    None => ChainLink::Real(base.id.clone()),
                };
                FakeCommit {
                    reworded: self.reworded.get(&hash).cloned(),
                    fixed_up: self.fixed_up.contains(&hash),
                    hash,
                    parent,
                }
            })
            .collect()
    }

    /// Replay steps, oldest first. A fixup is emitted right after the
    /// next non-fixup entry; trailing fixups follow the last one.
    pub fn get_rebase_commands(&self) -> Vec<RebaseCommand> {
        let mut commands = Vec::with_capacity(self.fake_branch.len());
        let mut held: Vec<RebaseCommand> = Vec::new();
        let mut seen_target = false;
        for n in self.fake_branch.iter().rev() {
            let hash = FakeHash::of(&n.id);
            if self.fixed_up.contains(&hash) {
                held.push(RebaseCommand::Fixup(n.id.clone()));
                continue;
            }
            commands.push(match self.reworded.get(&hash) {
                Some(message) => RebaseCommand::Reword(n.id.clone(), message.clone()),
                None => RebaseCommand::Pick(n.id.clone()),
            });
            commands.append(&mut held);
            seen_target = true;
        }
        if seen_target {
            commands.append(&mut held);
        } else {
            // Nothing to fold into
            commands.extend(held.into_iter().map(|c| RebaseCommand::Pick(c.commit().clone())));
        }
        commands
    }

    pub fn plan(&self) -> Option<RebasePlan> {
        Some(RebasePlan {
            subject: self.subject.clone()?,
            base: self.branch_base.as_ref()?.id.clone(),
            chain: self.fake_chain(),
            selected: self.selected.iter().cloned().collect(),
            insert_after: self.insert_after,
            result_ref: self.result_ref.clone()?,
            commands: self.get_rebase_commands(),
        })
    }

    /// Hand the plan to `handler` and return to idle whatever the outcome.
    /// Without a plan this does nothing.
    pub fn apply(
        &mut self,
        handler: &mut dyn VcsActionHandler,
        callback: &mut dyn RebaseCallback,
    ) -> anyhow::Result<()> {
        if self.result_ref.is_none() {
            return Ok(());
        }
        let (Some(subject), Some(base)) = (self.subject.clone(), self.branch_base.clone()) else {
            self.reset();
            return Ok(());
        };
        let commands = self.get_rebase_commands();
        info!(subject = %subject.name, base = %base.id, commands = commands.len(), "applying interactive rebase");

        handler.disable_modifications();
        let result = handler.interactive_rebase(&subject, &base.id, &commands, callback);
        handler.enable_modifications();
        self.reset();
        result
    }

    pub fn cancel(&mut self) {
        self.reset();
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn lineage(&self, graph: &PermanentGraph) -> Vec<CommitIdx> {
        let mut lineage: Vec<CommitIdx> = self.fake_branch.iter().map(|n| n.idx).collect();
        if let Some(base) = &self.branch_base {
            lineage.extend(first_parent_walk(graph, base.idx));
        }
        lineage
    }

    fn update_result_ref(&mut self) {
        self.result_ref = match (&self.subject, &self.branch_base) {
            (Some(subject), Some(base)) => Some(FakeRef {
                name: subject.name.clone(),
                target: match self.fake_branch.first() {
                    Some(head) => ChainLink::Fake(FakeHash::of(&head.id)),
                    None => ChainLink::Real(base.id.clone()),
                },
            }),
            _ => None,
        };
    }
}

fn node(graph: &PermanentGraph, idx: CommitIdx) -> Node {
    Node {
        idx,
        id: graph.store().id(idx).clone(),
    }
}

fn require_branch(subject: &VcsRef) -> Result<(), RebaseError> {
    if subject.is_branch() {
        return Ok(());
    }
    warn!(subject = %subject.name, kind = ?subject.kind, "only local branches can be rebased");
    Err(RebaseError::NotABranch(subject.name.clone()))
}

fn resolve(graph: &PermanentGraph, id: &CommitId) -> Result<CommitIdx, RebaseError> {
    graph
        .store()
        .resolve(id)
        .ok_or_else(|| RebaseError::UnknownCommit(id.clone()))
}

/// Merges are followed through their first parent only.
fn first_parent(graph: &PermanentGraph, idx: CommitIdx) -> Option<CommitIdx> {
    graph
        .first_parent(graph.row_of(idx))
        .and_then(|row| graph.commit_at(row))
}

fn first_parent_walk(graph: &PermanentGraph, from: CommitIdx) -> Vec<CommitIdx> {
    let mut walk = vec![from];
    while let Some(next) = walk.last().and_then(|&idx| first_parent(graph, idx)) {
        walk.push(next);
    }
    walk
}
