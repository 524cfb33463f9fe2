//! Interactive conflict prompts.

use corral_sync::{Decision, InteractiveAdapter};
use inquire::{InquireError, Select};

use crate::Result;

/// Prompting adapter backed by `inquire`. Ctrl-C maps to cancel-all so
/// the command can exit cleanly with status 0.
pub struct InquirePrompt;

const CHOICES: &[&str] = &["overwrite", "skip", "cancel all"];

impl InteractiveAdapter for InquirePrompt {
    fn resolve_conflict(&mut self, label: &str) -> Result<Decision> {
        let answer = Select::new(&format!("{label} has local changes"), CHOICES.to_vec())
            .with_help_message("overwrite with the repo copy, keep yours, or stop here")
            .prompt();
        match answer {
            Ok("overwrite") => Ok(Decision::Overwrite),
            Ok("skip") => Ok(Decision::Skip),
            Ok(_) => Ok(Decision::CancelAll),
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                Ok(Decision::CancelAll)
            }
            Err(err) => Err(err.into()),
        }
    }
}
