// Nano PoW Server - Free and Open Source Software Statement
//
// This project, nano-pow-server, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/core/difficulty.rs
// Version: 1.0.1
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file contains the threshold constants and conversions between the
// 64-bit work threshold, its hex wire form and the multiplier reported to
// clients, located in the core subdirectory of the work server source tree.

use log::warn;

const LOG_TARGET: &str = "nano_pow::difficulty";

/// Threshold a work value must reach (send/change blocks)
pub const DEFAULT_THRESHOLD: u64 = 0xffff_fff9_3c41_ec94;

/// Render a threshold or work value as 16 upper-case hex digits
pub fn format_difficulty(value: u64) -> String {
    format!("{:016X}", value)
}

/// Parse a 16-hex threshold, with or without a 0x prefix
pub fn parse_difficulty(hex: &str) -> Result<u64, String> {
    let digits = hex.strip_prefix("0x").unwrap_or(hex);
    if digits.is_empty() || digits.len() > 16 {
        return Err(format!("expected up to 16 hex digits, got {}", digits.len()));
    }
    u64::from_str_radix(digits, 16).map_err(|e| format!("invalid hex '{}': {}", hex, e))
}

/// How many times harder `value` is than `base`: (2^64 - base) / (2^64 - value)
pub fn to_multiplier(value: u64, base: u64) -> f64 {
    let span = 1u128 << 64;
    (span - base as u128) as f64 / (span - value as u128) as f64
}

/// Threshold corresponding to a multiplier of `base`
pub fn from_multiplier(multiplier: f64, base: u64) -> u64 {
    if !(multiplier > 0.0) {
        warn!(target: LOG_TARGET, "Invalid multiplier {}, keeping base threshold", multiplier);
        return base;
    }
    let span = (1u128 << 64) as f64;
    let reverse = (span - base as f64) / multiplier;
    if reverse >= span {
        return 0;
    }
    (span - reverse).min(u64::MAX as f64) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_difficulty() {
        assert_eq!(format_difficulty(DEFAULT_THRESHOLD), "FFFFFFF93C41EC94");
        assert_eq!(format_difficulty(1), "0000000000000001");
    }

    #[test]
    fn test_parse_difficulty() {
        assert_eq!(parse_difficulty("fffffff93c41ec94"), Ok(DEFAULT_THRESHOLD));
        assert_eq!(parse_difficulty("0xFFFFFFF93C41EC94"), Ok(DEFAULT_THRESHOLD));
        assert!(parse_difficulty("").is_err());
        assert!(parse_difficulty("1ffffffffffffffff").is_err());
        assert!(parse_difficulty("ghij").is_err());
    }

    #[test]
    fn test_multiplier() {
        assert_eq!(to_multiplier(DEFAULT_THRESHOLD, DEFAULT_THRESHOLD), 1.0);
        let harder = to_multiplier(u64::MAX, DEFAULT_THRESHOLD);
        assert!(harder > 1.0);
        let easier = to_multiplier(0, DEFAULT_THRESHOLD);
        assert!(easier < 1.0);
    }

    #[test]
    fn test_from_multiplier() {
        assert_eq!(from_multiplier(-1.0, DEFAULT_THRESHOLD), DEFAULT_THRESHOLD);
        let doubled = from_multiplier(2.0, 0xfffffe0000000000);
        assert_eq!(doubled, 0xffffff0000000000);
    }
}

// Changelog:
// - v1.0.1 (2025-07-08): Added multiplier conversions for work_validate.
// - v1.0.0 (2025-07-02): Replaced target/difficulty parsing with the 64-bit
//   Nano threshold helpers.
