use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_PORT: u16 = 1;
pub const MAX_PORT: u16 = 65535;

/// Above this many ports the validator attaches a mild warning.
const WARNING_THRESHOLD: usize = 100;
/// Above this many ports the warning gets stronger wording.
const DANGER_THRESHOLD: usize = 1000;

/// Failure parsing a port specification string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    #[error("port specification is empty")]
    Empty,
    #[error("invalid port number: {0}")]
    InvalidNumber(String),
    #[error("port {0} is outside the range {MIN_PORT}-{MAX_PORT}")]
    OutOfRange(u32),
    #[error("invalid range format: {0}")]
    RangeFormat(String),
    #[error("range start {start} is greater than end {end}")]
    RangeOrder { start: u16, end: u16 },
}

impl PortError {
    /// Stable machine-readable code, kept in sync with the exporter contract.
    pub fn code(&self) -> &'static str {
        match self {
            PortError::Empty => "EMPTY_SPEC",
            PortError::InvalidNumber(_) => "INVALID_PORT_NUMBER",
            PortError::OutOfRange(_) => "PORT_OUT_OF_RANGE",
            PortError::RangeFormat(_) => "INVALID_RANGE_FORMAT",
            PortError::RangeOrder { .. } => "INVALID_RANGE_ORDER",
        }
    }
}

/// An inclusive port range token such as `80-90`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

/// Resolved port specification.
///
/// `expanded` is the deduplicated ascending union of `individual` and every
/// expanded range; `total == expanded.len()`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedPorts {
    pub individual: Vec<u16>,
    pub ranges: Vec<PortRange>,
    pub expanded: Vec<u16>,
    pub total: usize,
}

/// Outcome of [`validate`]: hard errors plus advisory warnings.
#[derive(Debug, Clone, Default)]
pub struct Validation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub port_count: usize,
}

/// Parse a comma-separated port specification.
///
/// Supported tokens:
/// - single port number: `80`
/// - inclusive range: `8000-8010`
///
/// Whitespace around tokens is ignored. Ports must lie in 1..=65535 and
/// range starts must not exceed range ends. The expanded list is
/// deduplicated and sorted ascending regardless of input order or overlap.
pub fn parse(input: &str) -> Result<ParsedPorts, PortError> {
    let tokens: Vec<&str> = input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() {
        return Err(PortError::Empty);
    }

    let mut individual: Vec<u16> = Vec::new();
    let mut ranges: Vec<PortRange> = Vec::new();

    for token in tokens {
        if token.contains('-') {
            let mut parts = token.splitn(2, '-');
            let a = parts.next().unwrap_or("").trim();
            let b = parts.next().unwrap_or("").trim();
            if a.is_empty() || b.is_empty() || b.contains('-') {
                return Err(PortError::RangeFormat(token.to_string()));
            }
            let start = parse_port(a)?;
            let end = parse_port(b)?;
            if start > end {
                return Err(PortError::RangeOrder { start, end });
            }
            ranges.push(PortRange { start, end });
        } else {
            individual.push(parse_port(token)?);
        }
    }

    let mut expanded: Vec<u16> = individual.clone();
    for r in &ranges {
        expanded.extend(r.start..=r.end);
    }
    expanded.sort_unstable();
    expanded.dedup();
    let total = expanded.len();

    Ok(ParsedPorts {
        individual,
        ranges,
        expanded,
        total,
    })
}

/// Full validation of a specification: parse plus advisory size warnings.
pub fn validate(input: &str) -> Validation {
    match parse(input) {
        Ok(parsed) => {
            let mut warnings = Vec::new();
            if parsed.total > DANGER_THRESHOLD {
                warnings.push(format!(
                    "scanning {} ports may take a very long time; consider a smaller range",
                    parsed.total
                ));
            } else if parsed.total > WARNING_THRESHOLD {
                warnings.push(format!("scanning {} ports may take a while", parsed.total));
            }
            Validation {
                is_valid: true,
                errors: Vec::new(),
                warnings,
                port_count: parsed.total,
            }
        }
        Err(e) => Validation {
            is_valid: false,
            errors: vec![e.to_string()],
            warnings: Vec::new(),
            port_count: 0,
        },
    }
}

fn parse_port(s: &str) -> Result<u16, PortError> {
    let val: u32 = s
        .parse()
        .map_err(|_| PortError::InvalidNumber(s.to_string()))?;
    if val < MIN_PORT as u32 || val > MAX_PORT as u32 {
        return Err(PortError::OutOfRange(val));
    }
    Ok(val as u16)
}

/// Named preset specifications, mirroring the configuration UI shortcuts.
pub const PRESETS: &[(&str, &str)] = &[
    ("popular", "22,80,443,3389"),
    ("web", "80-90,443,8000-8080,8443"),
    ("databases", "3306,5432,1433,27017,6379"),
    ("mail", "25,110,143,993,995"),
    ("common", "21,22,23,25,53,80,110,143,443,993,995"),
    ("all", "1-65535"),
];

/// Look up a preset specification by name.
pub fn preset(name: &str) -> Option<&'static str> {
    PRESETS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, spec)| *spec)
}

/// Abbreviated display form of a port list, e.g. `22, 80, 443 and 17 more`.
pub fn format_port_list(ports: &[u16], max_display: usize) -> String {
    let shown: Vec<String> = ports
        .iter()
        .take(max_display)
        .map(|p| p.to_string())
        .collect();
    if ports.len() <= max_display {
        shown.join(", ")
    } else {
        format!("{} and {} more", shown.join(", "), ports.len() - max_display)
    }
}
