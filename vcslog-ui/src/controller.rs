use crate::actions::{GraphAction, GraphAnswer, Notification};
use crate::cache::CommitDetailCache;
use crate::config::LogConfig;
use crate::tasks::TaskQueue;
use anyhow::Result;
use graph::{
    Commit, CommitDetail, CommitId, CommitIdx, EdgeKind, FragmentManager, GraphElement, InsertPosition,
    InteractiveRebaseBuilder, PermanentGraph, PrintModel, RebaseCommand, RebaseError, RebasePlan, RebaseState,
    RefColorManager, UpdateRequest, VcsActionHandler, VcsLogProvider, VcsRef,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Result of one background read
struct LogPage {
    commits: Vec<Commit>,
    refs: Vec<VcsRef>,
    requested: usize,
}

/// What `poll` folded into the graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogUpdate {
    pub pages: usize,
    /// Commits new to the graph; repeats of loaded commits are not counted
    pub commits: usize,
    /// Commit details that arrived in the cache
    pub details: usize,
    pub failures: usize,
}

impl LogUpdate {
    pub fn is_empty(&self) -> bool {
        self.pages == 0 && self.details == 0 && self.failures == 0
    }
}

/// Remembers the last hovered element so repeated mouse moves are free.
#[derive(Debug, Default)]
struct HoverCache {
    last: Option<Option<GraphElement>>,
}

impl HoverCache {
    /// False when `element` repeats the previous hover
    fn update(&mut self, element: Option<GraphElement>) -> bool {
        if self.last == Some(element) {
            return false;
        }
        self.last = Some(element);
        true
    }

    fn clear(&mut self) {
        self.last = None;
    }
}

/// Owns the graph state for a log view.
///
/// Everything here is mutated on the owning thread only. Background reads
/// produce raw pages which [`poll`](Self::poll) folds in; a failed read is
/// reported as a notification and leaves the graph as it was. Commit details
/// are fetched by a second worker into a shared cache, so the owning thread
/// never waits on the provider.
pub struct VcsLogController<P, H> {
    provider: Arc<Mutex<P>>,
    handler: H,
    config: LogConfig,
    tasks: TaskQueue<LogPage>,
    detail_tasks: TaskQueue<usize>,
    /// Ids of each detail batch in flight, in submission order
    detail_batches: VecDeque<Vec<CommitId>>,
    details: Arc<CommitDetailCache>,
    refs: Vec<VcsRef>,
    graph: PermanentGraph,
    fragments: FragmentManager,
    print: PrintModel,
    rebase: InteractiveRebaseBuilder,
    hover: HoverCache,
    applied: Vec<RebaseCommand>,
    notifications: Vec<Notification>,
    exhausted: bool,
}

impl<P, H> VcsLogController<P, H>
where
    P: VcsLogProvider + Send + 'static,
    H: VcsActionHandler,
{
    pub fn new(provider: P, handler: H, config: LogConfig) -> Result<Self> {
        let graph = PermanentGraph::empty();
        let fragments = FragmentManager::new(config.min_fragment_len);
        let print = PrintModel::build(&graph, &fragments, config.long_edges_hidden);
        Ok(Self {
            provider: Arc::new(Mutex::new(provider)),
            handler,
            tasks: TaskQueue::new("vcslog-reader")?,
            detail_tasks: TaskQueue::new("vcslog-details")?,
            detail_batches: VecDeque::new(),
            details: Arc::new(CommitDetailCache::new(config.detail_cache_capacity)),
            refs: Vec::new(),
            graph,
            fragments,
            print,
            rebase: InteractiveRebaseBuilder::new(),
            hover: HoverCache::default(),
            applied: Vec::new(),
            notifications: Vec::new(),
            exhausted: false,
            config,
        })
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    pub fn graph(&self) -> &PermanentGraph {
        &self.graph
    }

    pub fn fragments(&self) -> &FragmentManager {
        &self.fragments
    }

    pub fn print_model(&self) -> &PrintModel {
        &self.print
    }

    pub fn refs(&self) -> &[VcsRef] {
        &self.refs
    }

    pub fn find_ref(&self, name: &str) -> Option<&VcsRef> {
        self.refs.iter().find(|r| r.name == name)
    }

    /// The local branch called `name`; HEAD and tags never match.
    pub fn find_branch(&self, name: &str) -> Option<&VcsRef> {
        self.refs.iter().find(|r| r.is_branch() && r.name == name)
    }

    /// False once a short page showed the history is fully loaded
    pub fn has_more(&self) -> bool {
        !self.exhausted
    }

    pub fn pending_reads(&self) -> usize {
        self.tasks.pending() + self.detail_tasks.pending()
    }

    /// Queue a read of the next history page. Pages are applied in request order.
    pub fn request_more(&mut self) -> bool {
        if self.exhausted {
            return false;
        }
        let provider = Arc::clone(&self.provider);
        let limit = self.config.page_size;
        self.tasks.submit(move || {
            let mut provider = provider.lock();
            // Refs first: the read position must not move if anything fails.
            let refs = provider.refs()?;
            let commits = provider.read_next_part(limit)?;
            Ok(LogPage {
                commits,
                refs,
                requested: limit,
            })
        });
        debug!(limit, pending = self.tasks.pending(), "requested history page");
        true
    }

    /// Queue a background fetch of the details of `ids` that are neither
    /// cached nor already requested. False when there is nothing to fetch.
    pub fn request_details(&mut self, ids: &[CommitId]) -> bool {
        let mut missing: Vec<CommitId> = Vec::new();
        for id in ids {
            let requested = missing.contains(id) || self.detail_batches.iter().any(|batch| batch.contains(id));
            if !requested && self.details.get(id).is_none() {
                missing.push(id.clone());
            }
        }
        if missing.is_empty() {
            return false;
        }

        let provider = Arc::clone(&self.provider);
        let cache = Arc::clone(&self.details);
        let batch = missing.clone();
        self.detail_tasks.submit(move || {
            let details = cache.get_or_fetch(&batch, |ids| provider.lock().read_commits_data(ids))?;
            Ok(details.len())
        });
        debug!(commits = missing.len(), "requested commit details");
        self.detail_batches.push_back(missing);
        true
    }

    /// Cached details of `id`; never touches the provider.
    pub fn commit_detail(&self, id: &CommitId) -> Option<CommitDetail> {
        self.details.get(id)
    }

    /// Cached details of `ids` in the given order, skipping those not fetched yet.
    pub fn cached_details(&self, ids: &[CommitId]) -> Vec<CommitDetail> {
        ids.iter().filter_map(|id| self.details.get(id)).collect()
    }

    /// Fold in every page and detail batch that has arrived, without blocking.
    pub fn poll(&mut self) -> LogUpdate {
        let mut update = LogUpdate::default();
        while let Some(result) = self.tasks.try_next() {
            self.fold(result, &mut update);
        }
        while let Some(result) = self.detail_tasks.try_next() {
            self.detail_arrived(result, &mut update);
        }
        update
    }

    /// Block until all requested work is folded in or `timeout` passes.
    pub fn wait_for_pending(&mut self, timeout: Duration) -> LogUpdate {
        let deadline = Instant::now() + timeout;
        let mut update = LogUpdate::default();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            if self.tasks.pending() > 0 {
                match self.tasks.wait_next(remaining) {
                    Some(result) => self.fold(result, &mut update),
                    None => break,
                }
            } else if self.detail_tasks.pending() > 0 {
                match self.detail_tasks.wait_next(remaining) {
                    Some(result) => self.detail_arrived(result, &mut update),
                    None => break,
                }
            } else {
                break;
            }
        }
        update
    }

    fn detail_arrived(&mut self, result: Result<usize>, update: &mut LogUpdate) {
        let batch = self.detail_batches.pop_front().unwrap_or_default();
        match result {
            Ok(count) => update.details += count,
            Err(err) => {
                warn!(commits = batch.len(), "commit details read failed: {err:#}");
                self.notifications
                    .push(Notification::warning(format!("Failed to read commit details: {err:#}")));
                update.failures += 1;
            }
        }
    }

    fn fold(&mut self, result: Result<LogPage>, update: &mut LogUpdate) {
        let page = match result {
            Ok(page) => page,
            Err(err) => {
                warn!("history read failed: {err:#}");
                self.notifications
                    .push(Notification::error(format!("Failed to read history: {err:#}")));
                update.failures += 1;
                return;
            }
        };
        if page.commits.len() < page.requested {
            self.exhausted = true;
        }

        // The log may have moved between reads; commits already in the graph
        // come back as repeats and are skipped.
        let received = page.commits.len();
        let fresh: Vec<Commit> = page
            .commits
            .into_iter()
            .filter(|commit| self.graph.store().resolve(&commit.id).is_none())
            .collect();
        if fresh.len() < received {
            debug!(repeated = received - fresh.len(), "skipped commits already loaded");
        }

        let count = fresh.len();
        let known = FragmentManager::fragment_keys(&self.graph);
        let mut store = self.graph.store().clone();
        if let Err(err) = store.extend(fresh) {
            warn!("rejected history page: {err}");
            self.notifications
                .push(Notification::warning(format!("Ignored invalid history page: {err}")));
            update.failures += 1;
            return;
        }
        let colors = RefColorManager::new(&page.refs, self.config.head_priority.clone());
        let graph = match PermanentGraph::build(store, &colors, self.config.sort) {
            Ok(graph) => graph,
            Err(err) => {
                warn!("rejected history page: {err}");
                self.notifications
                    .push(Notification::warning(format!("Ignored invalid history page: {err}")));
                update.failures += 1;
                return;
            }
        };

        self.graph = graph;
        self.refs = page.refs;
        self.fragments.retain_valid(&self.graph);
        if self.config.hide_long_branches {
            // Fragments the user already saw keep whatever state they are in.
            self.fragments.hide_new(&self.graph, &known);
        }
        self.refresh_print();
        update.pages += 1;
        update.commits += count;
        debug!(
            commits = self.graph.store().len(),
            visible = self.print.visible_row_count(),
            "history page applied"
        );
    }

    pub fn perform(&mut self, action: GraphAction) -> GraphAnswer {
        match action {
            GraphAction::Click { row, column } => self.click(row, column),
            GraphAction::Hover { row, column } => self.hover(row, column),
            GraphAction::DoubleClick { row } => {
                let last = self.print.visible_row_count().saturating_sub(1);
                let on_sentinel = self
                    .print
                    .permanent_row(row)
                    .is_some_and(|p| !self.graph.is_commit_row(p));
                if row >= last || on_sentinel {
                    self.load_more()
                } else {
                    GraphAnswer::Unchanged
                }
            }
        }
    }

    fn click(&mut self, row: usize, column: usize) -> GraphAnswer {
        match self.print.element_at(row, column) {
            None => self.deselect(),
            Some(GraphElement::Node(p)) if !self.graph.is_commit_row(p) => self.load_more(),
            Some(GraphElement::Node(p)) => {
                self.print
                    .select_controller_mut()
                    .select_branch(&self.graph, &self.fragments, p);
                self.repaint_all()
            }
            Some(GraphElement::Edge(edge)) if edge.kind == EdgeKind::NotLoaded => self.load_more(),
            Some(element) => {
                let Some(fragment) = self.fragments.relate_fragment(&self.graph, &element) else {
                    return GraphAnswer::Unchanged;
                };
                let request = self.fragments.change_visibility(&self.graph, &fragment);
                self.apply_request(request)
            }
        }
    }

    fn hover(&mut self, row: usize, column: usize) -> GraphAnswer {
        let element = self.print.element_at(row, column);
        if !self.hover.update(element) {
            return GraphAnswer::Unchanged;
        }
        match element.and_then(|e| self.fragments.relate_fragment(&self.graph, &e)) {
            Some(fragment) => {
                self.print.select_controller_mut().select_fragment(&fragment);
                self.repaint_all()
            }
            None => self.deselect(),
        }
    }

    fn load_more(&mut self) -> GraphAnswer {
        if self.request_more() {
            GraphAnswer::LoadRequested
        } else {
            GraphAnswer::Unchanged
        }
    }

    fn deselect(&mut self) -> GraphAnswer {
        let select = self.print.select_controller_mut();
        if select.is_empty() {
            return GraphAnswer::Unchanged;
        }
        select.deselect_all();
        self.repaint_all()
    }

    fn repaint_all(&self) -> GraphAnswer {
        GraphAnswer::Repaint(0..self.print.visible_row_count())
    }

    fn apply_request(&mut self, request: UpdateRequest) -> GraphAnswer {
        if request == UpdateRequest::Nothing {
            return GraphAnswer::Unchanged;
        }
        self.refresh_print();
        match self.print.visible_range(&request) {
            Some(range) => GraphAnswer::Repaint(range),
            None => GraphAnswer::Unchanged,
        }
    }

    fn refresh_print(&mut self) {
        self.print.refresh(&self.graph, &self.fragments);
        self.hover.clear();
    }

    pub fn show_all(&mut self) -> GraphAnswer {
        let request = self.fragments.show_all();
        self.apply_request(request)
    }

    pub fn hide_all(&mut self) -> GraphAnswer {
        let request = self.fragments.hide_all(&self.graph);
        self.apply_request(request)
    }

    pub fn set_long_edges_hidden(&mut self, hidden: bool) -> GraphAnswer {
        if self.print.are_long_edges_hidden() == hidden {
            return GraphAnswer::Unchanged;
        }
        self.print
            .set_long_edge_visibility(&self.graph, &self.fragments, !hidden);
        self.hover.clear();
        self.repaint_all()
    }

    fn idx(&self, id: &CommitId) -> Result<CommitIdx, RebaseError> {
        self.graph
            .store()
            .resolve(id)
            .ok_or_else(|| RebaseError::UnknownCommit(id.clone()))
    }

    fn indices(&self, ids: &[CommitId]) -> Result<Vec<CommitIdx>, RebaseError> {
        ids.iter().map(|id| self.idx(id)).collect()
    }

    pub fn start_rebase(&mut self, subject: &VcsRef, onto: &CommitId) -> Result<(), RebaseError> {
        let onto = self.idx(onto)?;
        self.rebase.start_rebase(&self.graph, subject, onto)
    }

    pub fn start_rebase_onto(
        &mut self,
        subject: &VcsRef,
        base: &CommitId,
        nodes: &[CommitId],
    ) -> Result<(), RebaseError> {
        let base = self.idx(base)?;
        let nodes = self.indices(nodes)?;
        self.rebase.start_rebase_onto(&self.graph, subject, base, &nodes)
    }

    pub fn move_commits(
        &mut self,
        subject: &VcsRef,
        anchor: &CommitId,
        position: InsertPosition,
        nodes: &[CommitId],
    ) -> Result<(), RebaseError> {
        let anchor = self.idx(anchor)?;
        let nodes = self.indices(nodes)?;
        self.rebase
            .move_commits(&self.graph, subject, anchor, position, &nodes)
    }

    pub fn reword(&mut self, subject: &VcsRef, commit: &CommitId, message: &str) -> Result<(), RebaseError> {
        let commit = self.idx(commit)?;
        self.rebase.reword(&self.graph, subject, commit, message)
    }

    pub fn fix_up(&mut self, subject: &VcsRef, target: &CommitId, nodes: &[CommitId]) -> Result<(), RebaseError> {
        let target = self.idx(target)?;
        let nodes = self.indices(nodes)?;
        self.rebase.fix_up(&self.graph, subject, target, &nodes)
    }

    pub fn rebase_state(&self) -> RebaseState {
        self.rebase.state()
    }

    pub fn rebase_plan(&self) -> Option<RebasePlan> {
        self.rebase.plan()
    }

    /// Replay the plan through the action handler. Without a plan this does nothing.
    pub fn apply_interactive_rebase(&mut self) -> Result<()> {
        if self.rebase.state() == RebaseState::Idle {
            return Ok(());
        }
        let before = self.applied.len();
        let applied = &mut self.applied;
        let result = self
            .rebase
            .apply(&mut self.handler, &mut |c: &RebaseCommand| applied.push(c.clone()));
        match &result {
            Ok(()) => {
                let count = self.applied.len() - before;
                info!(commands = count, "interactive rebase applied");
                self.notifications
                    .push(Notification::info(format!("Rebased {count} commits")));
            }
            Err(err) => {
                self.notifications
                    .push(Notification::error(format!("Rebase failed: {err:#}")));
            }
        }
        result
    }

    pub fn cancel_interactive_rebase(&mut self) {
        self.rebase.cancel();
    }

    /// Commands the handler has reported as done, across sessions
    pub fn applied_commands(&self) -> &[RebaseCommand] {
        &self.applied
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }
}
