#[cfg(feature = "cli")]
use std::sync::Mutex;
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessesToUpdate, System};

#[derive(Debug, Clone)]
pub struct SystemStats {
    pub cpu_usage: f32,
    pub memory_usage_mb: u64,
    pub peak_memory_mb: u64,
    pub elapsed_time: Duration,
}

#[cfg(feature = "cli")]
struct ProcessProbe {
    system: System,
    pid: Pid,
    peak_memory_mb: u64,
}

/// 追蹤目前行程的 CPU / 記憶體使用量，每個 ETL 階段記錄一次
pub struct SystemMonitor {
    #[cfg(feature = "cli")]
    probe: Option<Mutex<ProcessProbe>>,
    start_time: Instant,
}

impl SystemMonitor {
    #[cfg(feature = "cli")]
    pub fn new(enabled: bool) -> Self {
        let probe = if enabled {
            match sysinfo::get_current_pid() {
                Ok(pid) => {
                    let mut system = System::new();
                    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                    Some(Mutex::new(ProcessProbe {
                        system,
                        pid,
                        peak_memory_mb: 0,
                    }))
                }
                Err(e) => {
                    tracing::warn!("⚠️ System monitoring unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Self {
            probe,
            start_time: Instant::now(),
        }
    }

    #[cfg(not(feature = "cli"))]
    pub fn new(_enabled: bool) -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    #[cfg(feature = "cli")]
    pub fn get_stats(&self) -> Option<SystemStats> {
        let mut probe = self.probe.as_ref()?.lock().ok()?;
        let pid = probe.pid;
        probe
            .system
            .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

        let (cpu_usage, memory_usage_mb) = {
            let process = probe.system.process(pid)?;
            (process.cpu_usage(), process.memory() / 1024 / 1024)
        };
        probe.peak_memory_mb = probe.peak_memory_mb.max(memory_usage_mb);

        Some(SystemStats {
            cpu_usage,
            memory_usage_mb,
            peak_memory_mb: probe.peak_memory_mb,
            elapsed_time: self.start_time.elapsed(),
        })
    }

    #[cfg(not(feature = "cli"))]
    pub fn get_stats(&self) -> Option<SystemStats> {
        None
    }

    pub fn log_stats(&self, phase: &str) {
        if let Some(stats) = self.get_stats() {
            tracing::info!(
                "📊 {} - CPU: {:.1}%, Memory: {}MB, Peak: {}MB, Time: {:?}",
                phase,
                stats.cpu_usage,
                stats.memory_usage_mb,
                stats.peak_memory_mb,
                stats.elapsed_time
            );
        }
    }

    pub fn log_final_stats(&self) {
        if let Some(stats) = self.get_stats() {
            tracing::info!(
                "📊 Final Stats - Total Time: {:?}, Peak Memory: {}MB",
                stats.elapsed_time,
                stats.peak_memory_mb
            );
        }
    }

    pub fn is_enabled(&self) -> bool {
        #[cfg(feature = "cli")]
        {
            self.probe.is_some()
        }
        #[cfg(not(feature = "cli"))]
        {
            false
        }
    }
}

impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}
