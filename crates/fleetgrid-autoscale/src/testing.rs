//! Test doubles for the collaborator traits.

use std::future::pending;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use fleetgrid_provider::{ActionDispatcher, BoxFuture, CloudProvider, MetricsSource, ProviderError, ProviderResult};
use fleetgrid_state::{InstanceInfo, ScaleAction};

/// Records every dispatched action; optionally fails each one.
#[derive(Default)]
pub struct RecordingDispatcher {
    calls: Mutex<Vec<ScaleAction>>,
    fail: bool,
}

impl RecordingDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::default(),
            fail: true,
        })
    }

    pub fn calls(&self) -> Vec<ScaleAction> {
        self.calls.lock().unwrap().clone()
    }
}

impl ActionDispatcher for RecordingDispatcher {
    fn dispatch(&self, action: ScaleAction) -> BoxFuture<'_, ProviderResult<()>> {
        self.calls.lock().unwrap().push(action);
        let fail = self.fail;
        Box::pin(async move {
            if fail {
                Err(ProviderError::Dispatch {
                    action: action.to_string(),
                    reason: "exit Some(1): provider refused".to_string(),
                })
            } else {
                Ok(())
            }
        })
    }
}

/// A load value the test can change or make unavailable.
pub struct FixedLoad {
    value: Mutex<f64>,
    failing: AtomicBool,
}

impl FixedLoad {
    pub fn new(value: f64) -> Arc<Self> {
        Arc::new(Self {
            value: Mutex::new(value),
            failing: AtomicBool::new(false),
        })
    }

    pub fn set(&self, value: f64) {
        *self.value.lock().unwrap() = value;
        self.failing.store(false, Ordering::Relaxed);
    }

    pub fn fail(&self) {
        self.failing.store(true, Ordering::Relaxed);
    }
}

impl MetricsSource for FixedLoad {
    fn current_load(&self) -> BoxFuture<'_, ProviderResult<f64>> {
        let result = if self.failing.load(Ordering::Relaxed) {
            Err(ProviderError::MetricUnavailable("load not reported".to_string()))
        } else {
            Ok(*self.value.lock().unwrap())
        };
        Box::pin(async move { result })
    }
}

/// A provider whose calls never complete.
pub struct StalledProvider;

impl CloudProvider for StalledProvider {
    fn instances(&self) -> BoxFuture<'_, ProviderResult<Vec<InstanceInfo>>> {
        Box::pin(pending())
    }

    fn scaling_in_progress(&self) -> BoxFuture<'_, ProviderResult<bool>> {
        Box::pin(pending())
    }
}

/// A dispatcher whose action command never returns.
#[derive(Default)]
pub struct HungDispatcher {
    calls: AtomicUsize,
}

impl HungDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl ActionDispatcher for HungDispatcher {
    fn dispatch(&self, _action: ScaleAction) -> BoxFuture<'_, ProviderResult<()>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Box::pin(pending())
    }
}
