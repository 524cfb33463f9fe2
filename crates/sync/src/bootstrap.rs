//! First-run bootstrap.
//!
//! When no repo is configured and the user invokes a sync operation, the
//! reserved `system` slot is initialized from a hard-coded default source
//! and marked readonly.

use corral_core::RepoRef;
use corral_state::{RepoRecord, Store, SLOT_SYSTEM};
use std::path::PathBuf;

use crate::git::GitTransport;
use crate::Result;

/// Source cloned into the `system` slot on first use.
pub const DEFAULT_SYSTEM_SOURCE: &str = "gh:corral-dev/corral-config";

/// Resolves the active repo, bootstrapping the `system` slot if nothing
/// is configured. Returns the slot name and the clone directory, with the
/// clone freshly pulled.
pub fn ensure_repo(store: &Store, git: &dyn GitTransport) -> Result<(String, PathBuf)> {
    let meta = store.read_meta();

    if let Some((slot, record)) = meta.highest_priority_repo() {
        let slot = slot.to_string();
        let source = RepoRef::parse(&record.source)?;
        let target = store.repo_dir(&slot);
        let (commit, _is_new) = git.clone_or_pull(&source, &target)?;

        let mut updated = record.clone();
        updated.commit = Some(commit);
        // Machinery update, allowed even on the readonly system slot.
        store.set_repo_unchecked(&slot, updated)?;
        return Ok((slot, target));
    }

    tracing::info!(source = DEFAULT_SYSTEM_SOURCE, "bootstrapping system repo");
    let source = RepoRef::parse(DEFAULT_SYSTEM_SOURCE)?;
    let target = store.repo_dir(SLOT_SYSTEM);
    let (commit, _is_new) = git.clone_or_pull(&source, &target)?;

    let mut record = RepoRecord::new(
        DEFAULT_SYSTEM_SOURCE,
        source.reference(),
        corral_state::Meta::reserved_priority(SLOT_SYSTEM).unwrap_or(0),
    );
    record.commit = Some(commit);
    record.readonly = true;
    store.set_repo_unchecked(SLOT_SYSTEM, record)?;
    Ok((SLOT_SYSTEM.to_string(), target))
}
