use anyhow::{Context, bail};
use log::{debug, warn};
use regex::Regex;
use std::{collections::HashMap, path::Path, sync::LazyLock};

/// 1-based line of the raw report carrying the benchmark's elapsed time,
/// followed by two empty tail lines written by the measurement driver
pub const ELAPSED_TIME_LINE: usize = 33;

// "<count with thousands separators> <event name>"
static COUNTER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d[\d,]*)\s+([\w\-:\.]+)").unwrap());

/// Counter values parsed from one perf report, keyed by event name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterSample {
    counters: HashMap<String, u64>,
}

impl CounterSample {
    /// Counters missing from the report read as zero
    pub fn get(&self, name: &str) -> u64 {
        self.get_or(name, 0)
    }

    pub fn get_or(&self, name: &str, default: u64) -> u64 {
        self.counters.get(name).copied().unwrap_or(default)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.counters.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counters.iter().map(|(name, value)| (name.as_str(), *value))
    }
}

impl FromIterator<(String, u64)> for CounterSample {
    fn from_iter<T: IntoIterator<Item = (String, u64)>>(iter: T) -> Self {
        Self {
            counters: iter.into_iter().collect(),
        }
    }
}

/// Collect every "<count> <event>" pair in the text. A repeated event keeps
/// its last value; text that matches nothing is ignored.
pub fn parse_counters(content: &str) -> CounterSample {
    let mut counters = HashMap::new();
    for captures in COUNTER_PATTERN.captures_iter(content) {
        let digits = captures[1].replace(',', "");
        let name = captures[2].trim();
        match digits.parse::<u64>() {
            Ok(value) => {
                counters.insert(name.to_string(), value);
            }
            Err(err) => {
                warn!("Skipping counter {} with value {}: {}", name, &captures[1], err);
            }
        }
    }
    debug!("Parsed {} counters", counters.len());
    CounterSample { counters }
}

pub fn read_counters<P: AsRef<Path>>(path: P) -> anyhow::Result<CounterSample> {
    let content = read_report(path.as_ref())?;
    Ok(parse_counters(&content))
}

/// First field of the given 1-based line, in seconds
pub fn parse_elapsed_time(content: &str, line: usize) -> anyhow::Result<f64> {
    if line == 0 {
        bail!("Elapsed time line is 1-based, got 0");
    }
    let Some(text) = content.lines().nth(line - 1) else {
        bail!(
            "Report has {} lines, elapsed time is expected at line {}",
            content.lines().count(),
            line
        );
    };
    let Some(field) = text.split_whitespace().next() else {
        bail!("Line {} of report is empty, expected elapsed time", line);
    };
    let time: f64 = field
        .parse()
        .with_context(|| format!("Invalid elapsed time {:?} at line {}", field, line))?;
    if !time.is_finite() || time <= 0.0 {
        bail!("Elapsed time must be positive, got {} at line {}", time, line);
    }
    Ok(time)
}

pub fn read_elapsed_time<P: AsRef<Path>>(path: P) -> anyhow::Result<f64> {
    let content = read_report(path.as_ref())?;
    parse_elapsed_time(&content, ELAPSED_TIME_LINE)
}

/// Counters and elapsed time taken from a single read of a report file
#[derive(Debug, Clone)]
pub struct RawReport {
    pub counters: CounterSample,
    pub elapsed_time: f64,
}

impl RawReport {
    pub fn open<P: AsRef<Path>>(path: P, elapsed_time_line: usize) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = read_report(path)?;
        Self::parse(&content, elapsed_time_line)
            .with_context(|| format!("Failed to parse report {}", path.display()))
    }

    pub fn parse(content: &str, elapsed_time_line: usize) -> anyhow::Result<Self> {
        Ok(Self {
            counters: parse_counters(content),
            elapsed_time: parse_elapsed_time(content, elapsed_time_line)?,
        })
    }
}

fn read_report(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read report {}", path.display()))
}
