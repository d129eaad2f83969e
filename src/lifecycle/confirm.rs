//! Confirmation gate in front of update and delete.

use tracing::{debug, warn};

use crate::context::ExecutionContext;
use crate::error::{LifecycleError, Result};
use crate::prompt::Prompter;

/// Asks for confirmation when the context requires it.
///
/// Passes when forced, when no confirmation is required, or when the operator
/// already confirmed in this run. An accepted prompt is remembered for the
/// rest of the run.
///
/// # Errors
///
/// Returns `LifecycleError::Canceled` when the operator declines.
pub fn confirm_mutation(ctx: &mut ExecutionContext, prompter: &dyn Prompter) -> Result<()> {
    if ctx.is_forced() {
        debug!("Confirmation skipped (force)");
        return Ok(());
    }

    let Some(message) = ctx.confirmation_message().map(String::from) else {
        return Ok(());
    };

    if ctx.is_confirmed() {
        return Ok(());
    }

    if prompter.confirm(&message)? {
        ctx.mark_confirmed();
        Ok(())
    } else {
        warn!("Operation canceled by operator");
        Err(LifecycleError::Canceled { message }.into())
    }
}
