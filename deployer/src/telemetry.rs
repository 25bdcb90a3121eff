//! Process and host memory figures for the metrics endpoint

use serde::{Deserialize, Serialize};
use sysinfo::{get_current_pid, ProcessesToUpdate, System};

/// Memory usage in bytes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryMetrics {
    /// Resident memory of the server process
    pub process_memory: u64,

    /// Virtual memory of the server process
    pub process_virtual_memory: u64,

    /// Memory used on the host
    pub memory_used: u64,

    /// Total memory on the host
    pub memory_total: u64,

    /// Number of CPU cores
    pub cpu_count: usize,
}

/// Collect memory metrics
pub fn collect_memory() -> MemoryMetrics {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.refresh_cpu_list(sysinfo::CpuRefreshKind::nothing());

    let (process_memory, process_virtual_memory) = match get_current_pid() {
        Ok(pid) => {
            sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
            sys.process(pid)
                .map(|p| (p.memory(), p.virtual_memory()))
                .unwrap_or_default()
        }
        Err(_) => (0, 0),
    };

    MemoryMetrics {
        process_memory,
        process_virtual_memory,
        memory_used: sys.used_memory(),
        memory_total: sys.total_memory(),
        cpu_count: sys.cpus().len(),
    }
}
