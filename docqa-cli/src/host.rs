//! Host introspection for the `server_data` section of the result record.
//!
//! Every probe degrades to a placeholder when its source is unavailable;
//! collecting host facts never fails a run.

use std::collections::HashSet;
use std::process::Command;

use docqa_rag::{DiskSpace, SystemInfo};
use tracing::debug;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const NO_GPU: &str = "No GPU detected";

/// Collect a [`SystemInfo`] snapshot of the current host.
pub fn system_info() -> SystemInfo {
    let fallback = SystemInfo::unknown();
    let logical_cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(0);
    let cpuinfo = std::fs::read_to_string("/proc/cpuinfo").ok();
    let (gpu, gpu_count) = gpu_info();

    SystemInfo {
        operating_system: operating_system(),
        version: command_output("uname", &["-v"]).unwrap_or(fallback.version),
        architecture: std::env::consts::ARCH.to_string(),
        processor: cpuinfo
            .as_deref()
            .and_then(parse_cpu_model)
            .or_else(|| command_output("sysctl", &["-n", "machdep.cpu.brand_string"]))
            .unwrap_or(fallback.processor),
        physical_cores: cpuinfo
            .as_deref()
            .and_then(parse_physical_cores)
            .or_else(|| command_output("sysctl", &["-n", "hw.physicalcpu"]).and_then(|s| s.parse().ok()))
            .unwrap_or(logical_cores),
        logical_cores,
        ram_gb: ram_bytes().map(to_gib).unwrap_or(fallback.ram_gb),
        disk_space_gb: command_output("df", &["-kP", "/"])
            .as_deref()
            .and_then(parse_df)
            .unwrap_or(fallback.disk_space_gb),
        app_version: env!("CARGO_PKG_VERSION").to_string(),
        gpu,
        gpu_count,
    }
}

/// Name used to address records in the sink.
pub fn hostname() -> String {
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| command_output("hostname", &[]))
        .unwrap_or_else(|| "unknown-host".to_string())
}

fn operating_system() -> String {
    let name = command_output("uname", &["-s"]).unwrap_or_else(|| capitalize(std::env::consts::OS));
    match command_output("uname", &["-r"]) {
        Some(release) => format!("{name} {release}"),
        None => name,
    }
}

fn ram_bytes() -> Option<u64> {
    if let Some(kib) = std::fs::read_to_string("/proc/meminfo").ok().as_deref().and_then(parse_meminfo_kib) {
        return Some(kib * 1024);
    }
    command_output("sysctl", &["-n", "hw.memsize"]).and_then(|s| s.parse().ok())
}

fn gpu_info() -> (String, usize) {
    if cfg!(all(target_os = "macos", target_arch = "aarch64")) {
        return ("Apple GPU (integrated)".to_string(), 1);
    }
    match command_output("nvidia-smi", &["--query-gpu=name", "--format=csv,noheader"]) {
        Some(out) => parse_gpu_names(&out),
        None => (NO_GPU.to_string(), 0),
    }
}

/// Trimmed stdout of a successful command, `None` on any failure.
fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = match Command::new(program).args(args).output() {
        Ok(output) => output,
        Err(e) => {
            debug!(program, error = %e, "host probe unavailable");
            return None;
        }
    };
    if !output.status.success() {
        debug!(program, status = %output.status, "host probe failed");
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn parse_cpu_model(cpuinfo: &str) -> Option<String> {
    cpuinfo.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        (key.trim() == "model name").then(|| value.trim().to_string())
    })
}

/// Distinct `(physical id, core id)` pairs, when the kernel reports them.
fn parse_physical_cores(cpuinfo: &str) -> Option<usize> {
    let mut cores = HashSet::new();
    for block in cpuinfo.split("\n\n") {
        let mut physical = None;
        let mut core = None;
        for line in block.lines() {
            if let Some((key, value)) = line.split_once(':') {
                match key.trim() {
                    "physical id" => physical = Some(value.trim().to_string()),
                    "core id" => core = Some(value.trim().to_string()),
                    _ => {}
                }
            }
        }
        if let (Some(p), Some(c)) = (physical, core) {
            cores.insert((p, c));
        }
    }
    (!cores.is_empty()).then_some(cores.len())
}

fn parse_meminfo_kib(meminfo: &str) -> Option<u64> {
    meminfo
        .lines()
        .find_map(|line| line.strip_prefix("MemTotal:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kib| kib.parse().ok())
}

/// Parse POSIX `df -kP` output for the first filesystem row.
fn parse_df(output: &str) -> Option<DiskSpace> {
    let row = output.lines().nth(1)?;
    let fields: Vec<&str> = row.split_whitespace().collect();
    let kib = |i: usize| fields.get(i)?.parse::<u64>().ok();
    Some(DiskSpace {
        total: to_gib(kib(1)? * 1024),
        used: to_gib(kib(2)? * 1024),
        free: to_gib(kib(3)? * 1024),
    })
}

fn parse_gpu_names(output: &str) -> (String, usize) {
    let names: Vec<&str> = output.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    if names.is_empty() {
        return (NO_GPU.to_string(), 0);
    }
    (names.join(", "), names.len())
}

/// Bytes to GiB, rounded to two decimals.
fn to_gib(bytes: u64) -> f64 {
    (bytes as f64 / GIB * 100.0).round() / 100.0
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
