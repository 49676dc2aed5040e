//! Summary of the host read from `/proc`.
//!
//! Every field is optional: a file that is missing or unparsable is skipped
//! without a diagnostic.

use regex::Regex;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

pub const PROC_ROOT: &str = "/proc";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemInfo {
    pub hostname: Option<String>,
    pub kernel: Option<String>,
    pub cpu_model: Option<String>,
    pub cpu_count: Option<usize>,
    pub mem_total_kib: Option<u64>,
    pub mem_available_kib: Option<u64>,
    pub uptime_secs: Option<f64>,
    pub load_average: Option<[f64; 3]>,
}

impl SystemInfo {
    pub fn collect() -> Self {
        Self::collect_from(Path::new(PROC_ROOT))
    }

    /// Read the summary from a `/proc`-shaped directory tree.
    pub fn collect_from(root: &Path) -> Self {
        let read = |rel: &str| fs::read_to_string(root.join(rel)).ok();

        let mut info = SystemInfo {
            hostname: read("sys/kernel/hostname").and_then(first_line),
            kernel: read("sys/kernel/osrelease").and_then(first_line),
            ..Default::default()
        };
        if let Some(text) = read("cpuinfo") {
            info.cpu_model = cpu_model(&text);
            info.cpu_count = cpu_count(&text);
        }
        if let Some(text) = read("meminfo") {
            info.mem_total_kib = meminfo_field(&text, "MemTotal");
            info.mem_available_kib = meminfo_field(&text, "MemAvailable");
        }
        info.uptime_secs = read("uptime").and_then(|t| uptime(&t));
        info.load_average = read("loadavg").and_then(|t| load_average(&t));
        info
    }

    pub fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        if let Some(host) = &self.hostname {
            writeln!(out, "Host:    {}", host)?;
        }
        if let Some(kernel) = &self.kernel {
            writeln!(out, "Kernel:  {}", kernel)?;
        }
        match (&self.cpu_model, self.cpu_count) {
            (Some(model), Some(n)) => writeln!(out, "CPU:     {} ({} logical)", model, n)?,
            (Some(model), None) => writeln!(out, "CPU:     {}", model)?,
            (None, Some(n)) => writeln!(out, "CPU:     {} logical", n)?,
            (None, None) => {}
        }
        match (self.mem_available_kib, self.mem_total_kib) {
            (Some(avail), Some(total)) => writeln!(
                out,
                "Memory:  {} available / {} total",
                format_kib(avail),
                format_kib(total)
            )?,
            (None, Some(total)) => writeln!(out, "Memory:  {} total", format_kib(total))?,
            _ => {}
        }
        if let Some(secs) = self.uptime_secs {
            writeln!(out, "Uptime:  {}", format_uptime(secs))?;
        }
        if let Some([one, five, fifteen]) = self.load_average {
            writeln!(out, "Load:    {:.2} {:.2} {:.2}", one, five, fifteen)?;
        }
        Ok(())
    }
}

fn first_line(text: String) -> Option<String> {
    let line = text.lines().next()?.trim();
    (!line.is_empty()).then(|| line.to_string())
}

fn cpu_model(cpuinfo: &str) -> Option<String> {
    let re = Regex::new(r"(?m)^(?:model name|Model|cpu model)\s*:\s*(.+?)\s*$").ok()?;
    re.captures(cpuinfo).map(|c| c[1].to_string())
}

fn cpu_count(cpuinfo: &str) -> Option<usize> {
    let re = Regex::new(r"(?m)^processor\s*:").ok()?;
    let n = re.find_iter(cpuinfo).count();
    (n > 0).then_some(n)
}

fn meminfo_field(meminfo: &str, key: &str) -> Option<u64> {
    let re = Regex::new(&format!(r"(?m)^{}:\s+(\d+)\s*kB", regex::escape(key))).ok()?;
    re.captures(meminfo)?[1].parse().ok()
}

fn uptime(text: &str) -> Option<f64> {
    text.split_whitespace().next()?.parse().ok()
}

fn load_average(text: &str) -> Option<[f64; 3]> {
    let mut fields = text.split_whitespace().map(|f| f.parse::<f64>().ok());
    Some([fields.next()??, fields.next()??, fields.next()??])
}

fn format_kib(kib: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    let mut value = kib as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

fn format_uptime(secs: f64) -> String {
    let total = secs as u64;
    let days = total / 86400;
    let hours = (total % 86400) / 3600;
    let minutes = (total % 3600) / 60;
    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}
