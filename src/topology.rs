//! Hardware thread detection.

use sysinfo::{CpuRefreshKind, System};

/// Number of hardware threads to size the default pool with.
///
/// Queries the system CPU list; falls back to the standard library's
/// parallelism hint when the probe reports nothing.
pub fn hardware_thread_count() -> u32 {
    let mut system = System::new();
    system.refresh_cpu_specifics(CpuRefreshKind::everything());

    let detected = system.cpus().len();
    if detected > 0 {
        detected as u32
    } else {
        std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(4)
    }
}
