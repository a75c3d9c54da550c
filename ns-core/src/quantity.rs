//! CPU and memory quantity parsing.
//!
//! CPU accepts millicores (`250m`) or whole/fractional cores (`2`, `0.5`,
//! at most millicore precision). Memory accepts binary mebibytes and
//! gibibytes (`128Mi`, `2Gi`). Parsed values are normalized to millicores
//! and bytes so request/limit pairs can be compared.

use once_cell::sync::Lazy;
use regex::Regex;

static CPU_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?P<milli>\d+)m|(?P<cores>\d+)(?:\.(?P<frac>\d{1,3}))?)$")
        .expect("CPU quantity pattern is valid")
});

static MEMORY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<value>\d+)(?P<unit>Mi|Gi)$").expect("memory quantity pattern is valid")
});

const MEBIBYTE: u64 = 1024 * 1024;
const GIBIBYTE: u64 = 1024 * MEBIBYTE;

pub const CPU_GRAMMAR: &str = "millicores like '250m' or cores like '1' or '0.5'";
pub const MEMORY_GRAMMAR: &str = "mebibytes like '128Mi' or gibibytes like '2Gi'";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CpuQuantity(u64);

impl CpuQuantity {
    /// Parse a CPU quantity, returning `None` when the string does not match
    /// the grammar or overflows.
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = CPU_PATTERN.captures(raw)?;

        if let Some(milli) = caps.name("milli") {
            return milli.as_str().parse::<u64>().ok().map(CpuQuantity);
        }

        let cores = caps.name("cores")?.as_str().parse::<u64>().ok()?;
        let frac = match caps.name("frac") {
            // "5" -> 500, "25" -> 250, "125" -> 125
            Some(frac) => {
                let digits = frac.as_str();
                let padded = format!("{:0<3}", digits);
                padded.parse::<u64>().ok()?
            }
            None => 0,
        };

        cores
            .checked_mul(1000)
            .and_then(|m| m.checked_add(frac))
            .map(CpuQuantity)
    }

    pub fn millicores(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MemoryQuantity(u64);

impl MemoryQuantity {
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = MEMORY_PATTERN.captures(raw)?;
        let value = caps.name("value")?.as_str().parse::<u64>().ok()?;
        let unit = match caps.name("unit")?.as_str() {
            "Gi" => GIBIBYTE,
            _ => MEBIBYTE,
        };
        value.checked_mul(unit).map(MemoryQuantity)
    }

    pub fn bytes(self) -> u64 {
        self.0
    }
}
