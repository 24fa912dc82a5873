//! The commit engine: atomic two-pass application of an effect list.

use log::debug;

use crate::error::TrappedError;
use crate::fiber::{EffectTag, FiberId};
use crate::host::HostConfig;
use crate::reconciler::Reconciler;

use super::Scheduler;

impl<H: HostConfig, R: Reconciler> Scheduler<H, R> {
    /// Applies a finished tree's effect list to the host.
    ///
    /// Pass one mutates the host tree in effect-list order (children
    /// before parents); pass two fires lifecycles in the same order, so
    /// every sibling mutation is visible before any sibling lifecycle
    /// runs. Errors raised by user code along the way are collected and
    /// returned instead of raised, keeping the commit atomic; the
    /// caller feeds them to the error pipeline afterwards.
    ///
    /// With `ignore_unmounting_errors` set (a commit driven by an error
    /// boundary re-render), deletion errors are swallowed so a failing
    /// unmount cannot loop the pipeline forever.
    pub(crate) fn commit_all_work(
        &mut self,
        finished: FiberId,
        ignore_unmounting_errors: bool,
    ) -> Vec<TrappedError> {
        let mut trapped = Vec::new();
        debug!("commit {:?} begins", finished);

        // Pass 1: mutations.
        let mut effect = self.fibers[finished].first_effect;
        while let Some(fiber) = effect {
            let tag = self.fibers[fiber].effect_tag;
            let current = self.fibers[fiber].alternate;
            if tag.contains(EffectTag::PLACEMENT) {
                self.reconciler.commit_insertion(&mut self.fibers, fiber);
                self.fibers[fiber].effect_tag.remove(EffectTag::PLACEMENT);
                if tag.contains(EffectTag::UPDATE) {
                    self.reconciler.commit_work(&mut self.fibers, current, fiber);
                }
            } else if tag.contains(EffectTag::UPDATE) {
                self.reconciler.commit_work(&mut self.fibers, current, fiber);
            } else if tag.contains(EffectTag::DELETION) {
                let errors = self.reconciler.commit_deletion(&mut self.fibers, fiber);
                if !ignore_unmounting_errors {
                    trapped.extend(errors);
                }
            }
            effect = self.fibers[fiber].next_effect;
        }

        // Pass 2: lifecycles. The list is unlinked on the way through
        // so no fiber keeps a stale next_effect edge.
        let mut effect = self.fibers[finished].first_effect;
        while let Some(fiber) = effect {
            let tag = self.fibers[fiber].effect_tag;
            if tag.intersects(EffectTag::UPDATE | EffectTag::CALLBACK) {
                let current = self.fibers[fiber].alternate;
                if let Some(error) =
                    self.reconciler
                        .commit_lifecycles(&mut self.fibers, current, fiber)
                {
                    trapped.push(error);
                }
            }
            self.fibers[fiber].effect_tag = EffectTag::empty();
            effect = self.fibers[fiber].next_effect.take();
        }
        self.fibers[finished].first_effect = None;
        self.fibers[finished].last_effect = None;

        // The root is never on its own effect list; apply its effect
        // separately.
        if !self.fibers[finished].effect_tag.is_empty() {
            let current = self.fibers[finished].alternate;
            self.reconciler
                .commit_work(&mut self.fibers, current, finished);
            if let Some(error) =
                self.reconciler
                    .commit_lifecycles(&mut self.fibers, current, finished)
            {
                trapped.push(error);
            }
            self.fibers[finished].effect_tag = EffectTag::empty();
        }

        debug!(
            "commit {:?} done, {} trapped error(s)",
            finished,
            trapped.len()
        );
        trapped
    }
}
