//! Stable machine identity for binding credentials to this hardware.
//!
//! A firmware-backed identifier is preferred; when none is readable the id
//! degrades silently to a composite of hostname, CPU model and memory size.
//! This function never fails. A changed identifier only ever invalidates
//! machine-bound credentials, it cannot unlock anything.

use std::sync::OnceLock;
use tracing::debug;

static HARDWARE_ID: OnceLock<String> = OnceLock::new();

/// Cached for the lifetime of the process.
pub fn hardware_id() -> &'static str {
    HARDWARE_ID.get_or_init(|| {
        platform_id().unwrap_or_else(|| {
            debug!("no platform hardware id, using composite fallback");
            fallback_id()
        })
    })
}

#[cfg(target_os = "macos")]
fn platform_id() -> Option<String> {
    let out = std::process::Command::new("ioreg")
        .args(["-rd1", "-c", "IOPlatformExpertDevice"])
        .output()
        .ok()?;
    let text = String::from_utf8_lossy(&out.stdout);
    for line in text.lines() {
        if line.contains("IOPlatformUUID") {
            // "IOPlatformUUID" = "XXXXXXXX-XXXX-..."
            if let Some(value) = line.split('"').nth(3) {
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

#[cfg(target_os = "windows")]
fn platform_id() -> Option<String> {
    let out = std::process::Command::new("wmic")
        .args(["csproduct", "get", "uuid"])
        .output()
        .ok()?;
    let text = String::from_utf8_lossy(&out.stdout);
    let value = text.lines().nth(1)?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(target_os = "linux")]
fn platform_id() -> Option<String> {
    for candidate in ["/etc/machine-id", "/sys/class/dmi/id/product_uuid"] {
        if let Ok(contents) = std::fs::read_to_string(candidate) {
            let value = contents.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

#[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
fn platform_id() -> Option<String> {
    None
}

fn fallback_id() -> String {
    format!("{}{}{}", host_name(), cpu_model(), total_memory_bytes())
}

fn host_name() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(target_os = "linux")]
fn cpu_model() -> String {
    std::fs::read_to_string("/proc/cpuinfo")
        .ok()
        .and_then(|info| {
            info.lines()
                .find(|line| line.starts_with("model name"))
                .and_then(|line| line.split(':').nth(1))
                .map(|value| value.trim().to_string())
        })
        .unwrap_or_default()
}

#[cfg(target_os = "macos")]
fn cpu_model() -> String {
    std::process::Command::new("sysctl")
        .args(["-n", "machdep.cpu.brand_string"])
        .output()
        .ok()
        .map(|out| String::from_utf8_lossy(&out.stdout).trim().to_string())
        .unwrap_or_default()
}

#[cfg(target_os = "windows")]
fn cpu_model() -> String {
    std::process::Command::new("wmic")
        .args(["cpu", "get", "name"])
        .output()
        .ok()
        .and_then(|out| {
            String::from_utf8_lossy(&out.stdout)
                .lines()
                .nth(1)
                .map(|line| line.trim().to_string())
        })
        .unwrap_or_default()
}

#[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
fn cpu_model() -> String {
    String::new()
}

#[cfg(target_os = "linux")]
fn total_memory_bytes() -> u64 {
    std::fs::read_to_string("/proc/meminfo")
        .ok()
        .and_then(|info| {
            info.lines()
                .find(|line| line.starts_with("MemTotal"))
                .and_then(|line| line.split_whitespace().nth(1))
                .and_then(|kb| kb.parse::<u64>().ok())
        })
        .map(|kb| kb * 1024)
        .unwrap_or(0)
}

#[cfg(target_os = "macos")]
fn total_memory_bytes() -> u64 {
    std::process::Command::new("sysctl")
        .args(["-n", "hw.memsize"])
        .output()
        .ok()
        .and_then(|out| String::from_utf8_lossy(&out.stdout).trim().parse().ok())
        .unwrap_or(0)
}

#[cfg(target_os = "windows")]
fn total_memory_bytes() -> u64 {
    std::process::Command::new("wmic")
        .args(["ComputerSystem", "get", "TotalPhysicalMemory"])
        .output()
        .ok()
        .and_then(|out| {
            String::from_utf8_lossy(&out.stdout)
                .lines()
                .nth(1)
                .and_then(|line| line.trim().parse().ok())
        })
        .unwrap_or(0)
}

#[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
fn total_memory_bytes() -> u64 {
    0
}
