use parking_lot::Mutex;
use sysinfo::{Pid, ProcessRefreshKind, RefreshKind, System};

/// Instantaneous resource usage of a target process.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceSnapshot {
    pub memory_mb: f64,
    pub cpu_percent: f64,
}

/// Samples memory and CPU usage for target processes by pid.
///
/// A metrics lookup must never abort a latency measurement in progress, so
/// `sample` cannot fail: an unknown pid or a failed OS query degrades to a
/// zero-valued snapshot. One `System` is kept alive behind a mutex so that
/// successive refreshes observe CPU time deltas.
pub struct ProcessSampler {
    system: Mutex<System>,
}

impl ProcessSampler {
    pub fn new() -> Self {
        let system = System::new_with_specifics(
            RefreshKind::new().with_processes(ProcessRefreshKind::everything()),
        );
        Self {
            system: Mutex::new(system),
        }
    }

    /// Returns the current (memory, cpu) snapshot for `pid`, or zeros when the
    /// process cannot be observed.
    pub fn sample(&self, pid: u32) -> ResourceSnapshot {
        let pid = Pid::from_u32(pid);
        let mut system = self.system.lock();
        system.refresh_processes_specifics(
            sysinfo::ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::everything(),
        );

        match system.process(pid) {
            Some(process) => ResourceSnapshot {
                memory_mb: process.memory() as f64 / (1024.0 * 1024.0),
                cpu_percent: process.cpu_usage() as f64,
            },
            None => ResourceSnapshot::default(),
        }
    }
}

impl Default for ProcessSampler {
    fn default() -> Self {
        Self::new()
    }
}
