//! Process resource sampling.
//!
//! CPU usage is derived from the `utime + stime` delta between two samples
//! of `/proc/<pid>/stat`; memory from the resident set in `/proc/<pid>/statm`
//! relative to `MemTotal`. Other platforms report no telemetry.

use std::time::Instant;

/// Kernel clock ticks per second as exposed through `/proc` (USER_HZ).
const CLOCK_TICKS_PER_SEC: f64 = 100.0;
const PAGE_SIZE_BYTES: u64 = 4096;

/// Stateful CPU/memory sampler for one pid.
#[derive(Debug)]
pub struct UsageSampler {
    pid: u32,
    last_ticks: u64,
    last_at: Instant,
}

impl UsageSampler {
    /// The first CPU sample averages over the time since this call.
    pub fn new(pid: u32) -> Self {
        Self {
            pid,
            last_ticks: 0,
            last_at: Instant::now(),
        }
    }

    /// CPU percent of one core used since the previous sample.
    pub fn cpu_percent(&mut self) -> Option<f64> {
        let ticks = read_cpu_ticks(self.pid)?;
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_at).as_secs_f64();
        let delta = ticks.saturating_sub(self.last_ticks) as f64;

        self.last_ticks = ticks;
        self.last_at = now;

        if elapsed <= 0.0 {
            return Some(0.0);
        }
        Some(delta / CLOCK_TICKS_PER_SEC / elapsed * 100.0)
    }

    /// Resident memory in percent of total system memory.
    pub fn memory_percent(&self) -> Option<f64> {
        let resident_bytes = read_resident_pages(self.pid)? * PAGE_SIZE_BYTES;
        let total_bytes = read_mem_total_kb()? * 1024;
        if total_bytes == 0 {
            return None;
        }
        Some(resident_bytes as f64 / total_bytes as f64 * 100.0)
    }
}

#[cfg(target_os = "linux")]
fn read_cpu_ticks(pid: u32) -> Option<u64> {
    let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
    parse_stat_ticks(&stat)
}

#[cfg(target_os = "linux")]
fn read_resident_pages(pid: u32) -> Option<u64> {
    let statm = std::fs::read_to_string(format!("/proc/{}/statm", pid)).ok()?;
    parse_statm_resident(&statm)
}

#[cfg(target_os = "linux")]
fn read_mem_total_kb() -> Option<u64> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    parse_mem_total_kb(&meminfo)
}

#[cfg(not(target_os = "linux"))]
fn read_cpu_ticks(_pid: u32) -> Option<u64> {
    None
}

#[cfg(not(target_os = "linux"))]
fn read_resident_pages(_pid: u32) -> Option<u64> {
    None
}

#[cfg(not(target_os = "linux"))]
fn read_mem_total_kb() -> Option<u64> {
    None
}

/// `utime + stime` from a `/proc/<pid>/stat` line.
///
/// The command name is parenthesised and may contain spaces, so fields are
/// counted from the last `)`.
pub fn parse_stat_ticks(stat: &str) -> Option<u64> {
    let rest = &stat[stat.rfind(')')? + 1..];
    let fields: Vec<&str> = rest.split_whitespace().collect();
    // fields[0] is the state (field 3); utime and stime are fields 14 and 15.
    let utime: u64 = fields.get(11)?.parse().ok()?;
    let stime: u64 = fields.get(12)?.parse().ok()?;
    Some(utime + stime)
}

/// Resident page count from `/proc/<pid>/statm`.
pub fn parse_statm_resident(statm: &str) -> Option<u64> {
    statm.split_whitespace().nth(1)?.parse().ok()
}

/// `MemTotal` in kB from `/proc/meminfo`.
pub fn parse_mem_total_kb(meminfo: &str) -> Option<u64> {
    meminfo
        .lines()
        .find(|line| line.starts_with("MemTotal:"))?
        .split_whitespace()
        .nth(1)?
        .parse()
        .ok()
}
