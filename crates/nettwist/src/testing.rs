//! Test doubles for the kernel and the `tc` binary.
//!
//! [`MockLoader`] stands in for the aya loader and [`MockRunner`] for the
//! host `tc` binary, so the full control plane can run without privileges.
//! Both are cheap to clone and share state between clones, so a test keeps
//! one handle for assertions and hands the other to the control plane.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::command::{self, CommandRunner, Output, RunFuture, command_line};
use crate::xdp::{LoadedProgram, ProgramLoader, Table};
use crate::{Error, Result};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct LoaderState {
    attaches: usize,
    detaches: usize,
    fail_attach: bool,
    fail_writes: bool,
    stuck: bool,
    /// Table contents of live attachments, by interface index.
    tables: HashMap<u32, HashMap<Table, u64>>,
}

/// In-memory [`ProgramLoader`].
#[derive(Debug, Clone, Default)]
pub struct MockLoader {
    state: Arc<Mutex<LoaderState>>,
}

impl MockLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent attach fail.
    pub fn fail_attach(&self, fail: bool) {
        lock(&self.state).fail_attach = fail;
    }

    /// Make every subsequent table write fail.
    pub fn fail_writes(&self, fail: bool) {
        lock(&self.state).fail_writes = fail;
    }

    /// Ignore writes of 0 so tables never go inactive.
    pub fn stuck(&self, stuck: bool) {
        lock(&self.state).stuck = stuck;
    }

    /// Number of successful attaches so far.
    pub fn attach_count(&self) -> usize {
        lock(&self.state).attaches
    }

    /// Number of detaches so far.
    pub fn detach_count(&self) -> usize {
        lock(&self.state).detaches
    }

    /// Whether a program is attached to `ifindex`.
    pub fn is_attached(&self, ifindex: u32) -> bool {
        lock(&self.state).tables.contains_key(&ifindex)
    }

    /// Value of `table` on `ifindex`, if attached and written.
    pub fn table(&self, ifindex: u32, table: Table) -> Option<u64> {
        lock(&self.state)
            .tables
            .get(&ifindex)
            .and_then(|tables| tables.get(&table))
            .copied()
    }
}

impl ProgramLoader for MockLoader {
    fn attach(&self, ifindex: u32) -> Result<Box<dyn LoadedProgram>> {
        let mut state = lock(&self.state);
        if state.fail_attach {
            return Err(Error::bpf("attach XDP program", "injected failure"));
        }
        state.attaches += 1;
        state.tables.insert(ifindex, HashMap::new());
        Ok(Box::new(MockProgram {
            ifindex,
            state: self.state.clone(),
        }))
    }
}

#[derive(Debug)]
struct MockProgram {
    ifindex: u32,
    state: Arc<Mutex<LoaderState>>,
}

impl LoadedProgram for MockProgram {
    fn write(&mut self, table: Table, value: u64) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_writes {
            return Err(Error::bpf(format!("update {table}"), "injected failure"));
        }
        if state.stuck && value == 0 {
            return Ok(());
        }
        state
            .tables
            .entry(self.ifindex)
            .or_default()
            .insert(table, value);
        Ok(())
    }

    fn read(&self, table: Table) -> Result<Option<u64>> {
        Ok(lock(&self.state)
            .tables
            .get(&self.ifindex)
            .and_then(|tables| tables.get(&table))
            .copied())
    }

    fn detach(self: Box<Self>) -> Result<()> {
        let mut state = lock(&self.state);
        state.detaches += 1;
        state.tables.remove(&self.ifindex);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RunnerState {
    missing: bool,
    stuck: bool,
    hang: bool,
    fail_add: bool,
    fail_change: bool,
    calls: Vec<Vec<String>>,
    /// netem arguments of the root qdisc, by device.
    qdiscs: HashMap<String, Vec<String>>,
}

/// In-memory `tc` that tracks netem root qdiscs per device.
#[derive(Debug, Clone, Default)]
pub struct MockRunner {
    state: Arc<Mutex<RunnerState>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend `tc` is not installed.
    pub fn missing(&self, missing: bool) {
        lock(&self.state).missing = missing;
    }

    /// Make `qdisc del` succeed without removing anything.
    pub fn stuck(&self, stuck: bool) {
        lock(&self.state).stuck = stuck;
    }

    /// Make every subsequent invocation block until its future is dropped.
    pub fn hang(&self, hang: bool) {
        lock(&self.state).hang = hang;
    }

    /// Make `qdisc add` fail.
    pub fn fail_add(&self, fail: bool) {
        lock(&self.state).fail_add = fail;
    }

    /// Make `qdisc change` fail.
    pub fn fail_change(&self, fail: bool) {
        lock(&self.state).fail_change = fail;
    }

    /// Every argument list `tc` was run with.
    pub fn calls(&self) -> Vec<Vec<String>> {
        lock(&self.state).calls.clone()
    }

    /// The netem arguments installed on `dev`.
    pub fn netem(&self, dev: &str) -> Option<Vec<String>> {
        lock(&self.state).qdiscs.get(dev).cloned()
    }
}

impl CommandRunner for MockRunner {
    fn resolve(&self, program: &str) -> Option<PathBuf> {
        if lock(&self.state).missing {
            return None;
        }
        Some(Path::new("/usr/sbin").join(program))
    }

    fn run<'a>(&'a self, program: &'a Path, args: &'a [String]) -> RunFuture<'a> {
        Box::pin(async move {
            let hang = {
                let mut state = lock(&self.state);
                state.calls.push(args.to_vec());
                state.hang
            };
            if hang {
                return std::future::pending::<command::Result<Output>>().await;
            }
            self.execute(program, args)
        })
    }
}

impl MockRunner {
    fn execute(&self, program: &Path, args: &[String]) -> command::Result<Output> {
        let mut state = lock(&self.state);

        let fail = |stderr: &str| command::Error::NonZero {
            command: command_line(program, args),
            output: Output::failed(2, stderr),
        };

        let argv: Vec<&str> = args.iter().map(String::as_str).collect();
        match argv.as_slice() {
            ["qdisc", "show", "dev", dev] => Ok(Output::ok(match state.qdiscs.get(*dev) {
                Some(netem) => format!("qdisc netem 8001: root refcnt 2 limit 1000 {}\n", netem.join(" ")),
                None => "qdisc noqueue 0: root refcnt 2\n".to_string(),
            })),
            ["qdisc", "add", "dev", dev, "root", "netem", netem @ ..] => {
                if state.fail_add {
                    return Err(fail("Error: Exclusivity flag on, cannot modify."));
                }
                if state.qdiscs.contains_key(*dev) {
                    return Err(fail("RTNETLINK answers: File exists"));
                }
                let netem = netem.iter().map(|s| s.to_string()).collect();
                state.qdiscs.insert(dev.to_string(), netem);
                Ok(Output::ok(""))
            }
            ["qdisc", "change", "dev", dev, "root", "netem", netem @ ..] => {
                if state.fail_change {
                    return Err(fail("RTNETLINK answers: Invalid argument"));
                }
                let netem: Vec<String> = netem.iter().map(|s| s.to_string()).collect();
                match state.qdiscs.get_mut(*dev) {
                    Some(current) => {
                        *current = netem;
                        Ok(Output::ok(""))
                    }
                    None => Err(fail("Error: Qdisc not found.")),
                }
            }
            ["qdisc", "del", "dev", dev, "root"] => {
                if !state.qdiscs.contains_key(*dev) {
                    return Err(fail("Error: Cannot delete qdisc with handle of zero."));
                }
                if !state.stuck {
                    state.qdiscs.remove(*dev);
                }
                Ok(Output::ok(""))
            }
            _ => Err(fail("Command line is not complete.")),
        }
    }
}
