//! Parsers for the procfs files the sampler reads

/// Memory figures from `/proc/meminfo`, in kilobytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemInfo {
    pub total_kb: u64,
    pub free_kb: u64,
    /// `MemAvailable`, absent on very old kernels
    pub available_kb: Option<u64>,
}

impl MemInfo {
    /// Memory considered free for usage purposes; prefers `MemAvailable`
    pub fn usable_kb(&self) -> u64 {
        self.available_kb.unwrap_or(self.free_kb)
    }

    /// Used memory as a percentage of total; 0 when total is unknown
    pub fn usage_percent(&self) -> f64 {
        if self.total_kb == 0 {
            return 0.0;
        }

        let used = self.total_kb.saturating_sub(self.usable_kb());
        used as f64 / self.total_kb as f64 * 100.0
    }
}

/// 1-minute load average from `/proc/loadavg`
pub fn parse_loadavg(content: &str) -> Option<f64> {
    content
        .split_whitespace()
        .next()
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/// Logical processor count from `/proc/cpuinfo`. Never less than 1.
pub fn count_processors(content: &str) -> usize {
    content
        .lines()
        .filter(|line| {
            line.split(':')
                .next()
                .map(|key| key.trim() == "processor")
                .unwrap_or(false)
        })
        .count()
        .max(1)
}

/// Parse `/proc/meminfo`. Missing fields stay at zero.
pub fn parse_meminfo(content: &str) -> MemInfo {
    let mut info = MemInfo::default();

    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        let Ok(value) = value.parse::<u64>() else {
            continue;
        };

        match key {
            "MemTotal:" => info.total_kb = value,
            "MemFree:" => info.free_kb = value,
            "MemAvailable:" => info.available_kb = Some(value),
            _ => {}
        }
    }

    info
}
