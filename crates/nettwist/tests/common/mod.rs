//! Common test utilities for integration tests.

use std::sync::Arc;
use std::time::Duration;

use nettwist::interface::Interface;
use nettwist::testing::{MockLoader, MockRunner};
use nettwist::{Config, ControlPlane};

/// A control plane wired to in-memory mechanisms.
pub struct Harness {
    pub control: Arc<ControlPlane>,
    pub loader: MockLoader,
    pub runner: MockRunner,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Same as [`Harness::new`] with a short stop window, for tests on real time.
    #[allow(dead_code)]
    pub fn fast() -> Self {
        Self::with_config(
            Config::default()
                .with_stop_poll_interval(Duration::from_millis(5))
                .with_stop_timeout(Duration::from_millis(50)),
        )
    }

    pub fn with_config(config: Config) -> Self {
        let loader = MockLoader::new();
        let runner = MockRunner::new();
        let control = Arc::new(ControlPlane::with_parts(
            config,
            loader.clone(),
            Arc::new(runner.clone()),
        ));
        Self {
            control,
            loader,
            runner,
        }
    }
}

/// Interface index of `lo`.
pub fn lo_index() -> u32 {
    Interface::resolve("lo").expect("loopback interface").index()
}
