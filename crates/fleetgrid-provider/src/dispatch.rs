//! Scaling action dispatch.

use std::time::Duration;

use tracing::info;

use fleetgrid_state::ScaleAction;

use crate::BoxFuture;
use crate::command::run_command;
use crate::error::{ProviderError, ProviderResult};

/// Executes an elected scaling action.
pub trait ActionDispatcher: Send + Sync {
    fn dispatch(&self, action: ScaleAction) -> BoxFuture<'_, ProviderResult<()>>;
}

/// Runs the configured action command with the literal action name
/// (`expand` or `contract`) appended as its final argument.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    argv: Vec<String>,
    timeout: Duration,
}

impl CommandDispatcher {
    pub fn new(argv: Vec<String>, timeout: Duration) -> Self {
        Self { argv, timeout }
    }
}

impl ActionDispatcher for CommandDispatcher {
    fn dispatch(&self, action: ScaleAction) -> BoxFuture<'_, ProviderResult<()>> {
        Box::pin(async move {
            let mut argv = self.argv.clone();
            argv.push(action.as_str().to_string());

            let out = run_command(&argv, self.timeout)
                .await
                .map_err(|e| ProviderError::Dispatch {
                    action: action.to_string(),
                    reason: e.to_string(),
                })?;

            if !out.success {
                return Err(ProviderError::Dispatch {
                    action: action.to_string(),
                    reason: format!("exit {:?}: {}", out.code, out.stderr.trim()),
                });
            }
            info!(%action, command = %argv.join(" "), "action command completed");
            Ok(())
        })
    }
}
