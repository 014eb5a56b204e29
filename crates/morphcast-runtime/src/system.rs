//! Host and process resource sampling

use serde::Serialize;
use sysinfo::{Pid, System};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One resource sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SystemSample {
    /// Global CPU usage, percent
    pub cpu_percent: f64,
    /// Host memory in use
    pub memory_mb: f64,
    /// Resident memory of this process
    pub process_memory_mb: f64,
    /// CPU usage of this process, percent of one core
    pub process_cpu_percent: f64,
}

/// Reusable sysinfo handle. CPU figures need two refreshes to be meaningful,
/// so keep one sampler alive and call `sample` periodically.
pub struct SystemSampler {
    system: System,
    pid: Option<Pid>,
}

impl SystemSampler {
    pub fn new() -> Self {
        SystemSampler {
            system: System::new(),
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    pub fn sample(&mut self) -> SystemSample {
        self.system.refresh_cpu();
        self.system.refresh_memory();

        let mut sample = SystemSample {
            cpu_percent: self.system.global_cpu_info().cpu_usage() as f64,
            memory_mb: self.system.used_memory() as f64 / BYTES_PER_MB,
            ..Default::default()
        };
        if let Some(pid) = self.pid {
            if self.system.refresh_process(pid) {
                if let Some(process) = self.system.process(pid) {
                    sample.process_memory_mb = process.memory() as f64 / BYTES_PER_MB;
                    sample.process_cpu_percent = process.cpu_usage() as f64;
                }
            }
        }
        sample
    }
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_reports_own_process() {
        let mut sampler = SystemSampler::new();
        let sample = sampler.sample();
        assert!(sample.cpu_percent >= 0.0);
        assert!(sample.process_memory_mb > 0.0);
    }

    #[test]
    fn test_sample_serializes() {
        let value = serde_json::to_value(SystemSample::default()).unwrap();
        assert_eq!(value["cpu_percent"], 0.0);
    }
}
