//! The provider's authoritative view of the pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::debug;

use fleetgrid_state::InstanceInfo;

use crate::BoxFuture;
use crate::command::run_command;
use crate::error::{ProviderError, ProviderResult};

/// Authoritative instance counts and scaling status for this node's pool.
pub trait CloudProvider: Send + Sync {
    /// Every pool member the provider knows about, in any status.
    fn instances(&self) -> BoxFuture<'_, ProviderResult<Vec<InstanceInfo>>>;

    /// Whether the pool is already mid-way through a scaling operation.
    fn scaling_in_progress(&self) -> BoxFuture<'_, ProviderResult<bool>>;
}

/// A fixed (or externally updated) instance list.
///
/// Used when no provider command is configured: the pool is assumed to be
/// exactly the configured peers plus this node, all running.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    instances: Arc<RwLock<Vec<InstanceInfo>>>,
    scaling: Arc<AtomicBool>,
}

impl StaticProvider {
    pub fn new(instances: Vec<InstanceInfo>) -> Self {
        Self {
            instances: Arc::new(RwLock::new(instances)),
            scaling: Arc::new(AtomicBool::new(false)),
        }
    }

    /// All given ips, status running.
    pub fn running<I, S>(ips: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ips.into_iter().map(InstanceInfo::running).collect())
    }

    pub fn set_instances(&self, instances: Vec<InstanceInfo>) {
        *self.instances.write().unwrap_or_else(|e| e.into_inner()) = instances;
    }

    pub fn set_scaling_in_progress(&self, scaling: bool) {
        self.scaling.store(scaling, Ordering::Relaxed);
    }
}

impl CloudProvider for StaticProvider {
    fn instances(&self) -> BoxFuture<'_, ProviderResult<Vec<InstanceInfo>>> {
        let instances = self.instances.read().unwrap_or_else(|e| e.into_inner()).clone();
        Box::pin(async move { Ok(instances) })
    }

    fn scaling_in_progress(&self) -> BoxFuture<'_, ProviderResult<bool>> {
        let scaling = self.scaling.load(Ordering::Relaxed);
        Box::pin(async move { Ok(scaling) })
    }
}

/// Asks external commands for the pool state.
///
/// - `instances` must print a JSON array of `{"ip": ..., "status": ...}`.
/// - `scaling_status` (optional) exits 0 while a scaling operation is in
///   progress and non-zero otherwise.
#[derive(Debug, Clone)]
pub struct CommandProvider {
    instances: Vec<String>,
    scaling_status: Option<Vec<String>>,
    timeout: Duration,
}

impl CommandProvider {
    pub fn new(instances: Vec<String>, scaling_status: Option<Vec<String>>, timeout: Duration) -> Self {
        Self {
            instances,
            scaling_status,
            timeout,
        }
    }
}

impl CloudProvider for CommandProvider {
    fn instances(&self) -> BoxFuture<'_, ProviderResult<Vec<InstanceInfo>>> {
        Box::pin(async move {
            let out = run_command(&self.instances, self.timeout).await?;
            if !out.success {
                return Err(ProviderError::Command {
                    program: self.instances.join(" "),
                    reason: format!("exit {:?}: {}", out.code, out.stderr.trim()),
                });
            }
            let instances: Vec<InstanceInfo> =
                serde_json::from_str(&out.stdout).map_err(|e| ProviderError::Decode(e.to_string()))?;
            debug!(count = instances.len(), "provider listed instances");
            Ok(instances)
        })
    }

    fn scaling_in_progress(&self) -> BoxFuture<'_, ProviderResult<bool>> {
        Box::pin(async move {
            match &self.scaling_status {
                Some(argv) => Ok(run_command(argv, self.timeout).await?.success),
                None => Ok(false),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetgrid_state::InstanceStatus;

    #[tokio::test]
    async fn static_provider_reports_what_it_was_given() {
        let provider = StaticProvider::running(["10.0.0.1", "10.0.0.2"]);
        let instances = provider.instances().await.unwrap();
        assert_eq!(instances.len(), 2);
        assert!(instances.iter().all(InstanceInfo::is_running));
        assert!(!provider.scaling_in_progress().await.unwrap());

        provider.set_scaling_in_progress(true);
        provider.set_instances(vec![InstanceInfo {
            ip: "10.0.0.3".to_string(),
            status: InstanceStatus::Pending,
        }]);
        assert!(provider.scaling_in_progress().await.unwrap());
        assert_eq!(provider.instances().await.unwrap()[0].ip, "10.0.0.3");
    }

    #[cfg(unix)]
    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_provider_parses_instances() {
        let provider = CommandProvider::new(
            sh(r#"echo '[{"ip":"10.0.0.1","status":"running"},{"ip":"10.0.0.2","status":"pending"}]'"#),
            Some(sh("exit 1")),
            Duration::from_secs(5),
        );
        let instances = provider.instances().await.unwrap();
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[1].status, InstanceStatus::Pending);
        assert!(!provider.scaling_in_progress().await.unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_provider_scaling_status_exit_zero() {
        let provider = CommandProvider::new(sh("echo '[]'"), Some(sh("exit 0")), Duration::from_secs(5));
        assert!(provider.scaling_in_progress().await.unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_provider_rejects_bad_json() {
        let provider = CommandProvider::new(sh("echo nope"), None, Duration::from_secs(5));
        let err = provider.instances().await.unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_provider_nonzero_exit() {
        let provider = CommandProvider::new(sh("echo boom >&2; exit 2"), None, Duration::from_secs(5));
        let err = provider.instances().await.unwrap_err();
        assert!(matches!(err, ProviderError::Command { .. }));
    }
}
