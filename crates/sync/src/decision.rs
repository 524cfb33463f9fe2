//! The conflict-decision capability.
//!
//! The engine never talks to a terminal. Drifted items are put to an
//! `InteractiveAdapter`; the CLI provides a prompting implementation,
//! while `--force`/`--yes` runs and tests use the deterministic
//! [`AutoAdapter`].

use crate::Result;

/// What to do with one drifted item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Replace the local copy with the repo's.
    Overwrite,
    /// Keep the local copy.
    Skip,
    /// Abort the rest of the sync.
    CancelAll,
}

/// Resolves conflicts, one drifted item at a time.
pub trait InteractiveAdapter {
    /// `label` names the item, e.g. `command 'review'`.
    fn resolve_conflict(&mut self, label: &str) -> Result<Decision>;
}

/// Fulfils every request with a fixed decision, without blocking.
#[derive(Debug, Clone, Copy)]
pub struct AutoAdapter(pub Decision);

impl AutoAdapter {
    /// The `--force` adapter: overwrite everything.
    pub fn overwrite_all() -> Self {
        AutoAdapter(Decision::Overwrite)
    }

    /// The `--yes` adapter: keep local copies, install only new items.
    pub fn skip_all() -> Self {
        AutoAdapter(Decision::Skip)
    }
}

impl InteractiveAdapter for AutoAdapter {
    fn resolve_conflict(&mut self, _label: &str) -> Result<Decision> {
        Ok(self.0)
    }
}
