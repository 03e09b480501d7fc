//! fleetgrid-provider — the autoscaler's view of the outside world.
//!
//! The coordinator never shells out or calls a cloud API directly; it talks
//! to three capability traits, each independently mockable:
//!
//! | Trait | Question it answers | Default implementation |
//! |---|---|---|
//! | [`MetricsSource`] | How loaded is this host? | [`LoadAverage`] (`/proc/loadavg`, then `uptime`) |
//! | [`CloudProvider`] | Which pool members are running? Is a scaling operation in flight? | [`CommandProvider`], [`StaticProvider`] |
//! | [`ActionDispatcher`] | Grow or shrink the pool. | [`CommandDispatcher`] |
//!
//! Every process-backed implementation runs under a bounded timeout; a
//! timeout surfaces as [`ProviderError::Timeout`] and is treated by callers
//! as "no data", never as a vote.

pub mod cloud;
pub mod command;
pub mod dispatch;
pub mod error;
pub mod identity;
pub mod metrics;

use std::future::Future;
use std::pin::Pin;

/// Boxed future alias used by the collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub use cloud::{CloudProvider, CommandProvider, StaticProvider};
pub use command::{CommandOutput, run_command};
pub use dispatch::{ActionDispatcher, CommandDispatcher};
pub use error::{ProviderError, ProviderResult};
pub use identity::detect_local_ip;
pub use metrics::{LoadAverage, MetricsSource};
