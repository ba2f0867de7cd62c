// Nano PoW Server - Free and Open Source Software Statement
//
// This project, nano-pow-server, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/utils/format.rs
// Version: 1.1.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file provides formatting helpers for log output, located in the utils
// subdirectory. It formats hashrates, durations and large counts.
//
// Tree Location:
// - src/utils/format.rs (formatting utilities)
// - Depends on: std

use std::time::Duration;

pub struct FormatUtils;

impl FormatUtils {
    /// Format hashrate in appropriate units (H/s, KH/s, MH/s, GH/s)
    pub fn format_hashrate(hashrate: f64) -> String {
        if hashrate >= 1_000_000_000.0 {
            format!("{:.2} GH/s", hashrate / 1_000_000_000.0)
        } else if hashrate >= 1_000_000.0 {
            format!("{:.2} MH/s", hashrate / 1_000_000.0)
        } else if hashrate >= 1_000.0 {
            format!("{:.2} KH/s", hashrate / 1_000.0)
        } else {
            format!("{:.2} H/s", hashrate)
        }
    }

    /// Format an elapsed time: milliseconds below one second, then seconds, then minutes
    pub fn format_duration(duration: Duration) -> String {
        let millis = duration.as_millis();
        if millis < 1_000 {
            format!("{}ms", millis)
        } else if millis < 60_000 {
            format!("{:.2}s", duration.as_secs_f64())
        } else {
            let secs = duration.as_secs();
            format!("{}m {}s", secs / 60, secs % 60)
        }
    }

    /// Format large numbers with suffixes (K, M, B)
    pub fn format_number(num: u64) -> String {
        if num >= 1_000_000_000 {
            format!("{:.1}B", num as f64 / 1_000_000_000.0)
        } else if num >= 1_000_000 {
            format!("{:.1}M", num as f64 / 1_000_000.0)
        } else if num >= 1_000 {
            format!("{:.1}K", num as f64 / 1_000.0)
        } else {
            num.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_hashrate() {
        assert_eq!(FormatUtils::format_hashrate(950.0), "950.00 H/s");
        assert_eq!(FormatUtils::format_hashrate(12_500_000.0), "12.50 MH/s");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(FormatUtils::format_duration(Duration::from_millis(420)), "420ms");
        assert_eq!(FormatUtils::format_duration(Duration::from_millis(2_500)), "2.50s");
        assert_eq!(FormatUtils::format_duration(Duration::from_secs(125)), "2m 5s");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(FormatUtils::format_number(999), "999");
        assert_eq!(FormatUtils::format_number(2_000_000), "2.0M");
    }
}

// Changelog:
// - v1.1.0 (2025-07-02): format_duration reports elapsed search time instead of "ago" strings.
// - v1.0.0 (2025-06-14): Extracted from monolithic main.rs.
