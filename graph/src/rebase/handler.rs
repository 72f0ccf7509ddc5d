use super::RebaseCommand;
use crate::core::{CommitId, VcsRef};

/// Progress reports from a running rebase.
pub trait RebaseCallback {
    fn interactive_command_applied(&mut self, command: &RebaseCommand);
}

impl<F: FnMut(&RebaseCommand)> RebaseCallback for F {
    fn interactive_command_applied(&mut self, command: &RebaseCommand) {
        self(command)
    }
}

/// Performs the actual repository rewrite for a finished plan.
pub trait VcsActionHandler {
    /// Lock other edit actions while a rebase runs
    fn disable_modifications(&mut self);
    fn enable_modifications(&mut self);

    /// Replay `commands` (oldest first) onto `base` and move `subject` to the result.
    fn interactive_rebase(
        &mut self,
        subject: &VcsRef,
        base: &CommitId,
        commands: &[RebaseCommand],
        callback: &mut dyn RebaseCallback,
    ) -> anyhow::Result<()>;
}
