use crate::DerivedMetrics;
use anyhow::bail;
use serde::{Deserialize, Serialize};

/// Dataset columns, in the order they are written
pub const COLUMNS: [&str; 12] = [
    "M",
    "K",
    "N",
    "total_fp_ops",
    "total_cache_access_bytes",
    "dram_access_bytes",
    "llc_access_bytes",
    "ai_dram_fp",
    "ai_llc_fp",
    "ai_cache_fp",
    "time",
    "actually_ops",
];

/// Workload shape of a GeMM run: (M x K) * (K x N)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProblemSize {
    pub m: u64,
    pub k: u64,
    pub n: u64,
}

impl ProblemSize {
    pub fn new(m: u64, k: u64, n: u64) -> anyhow::Result<Self> {
        let size = Self { m, k, n };
        size.validate()?;
        Ok(size)
    }

    /// Every dimension must be positive
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.m == 0 || self.k == 0 || self.n == 0 {
            bail!(
                "Problem size must be positive, got {}x{}x{}",
                self.m,
                self.k,
                self.n
            );
        }
        Ok(())
    }
}

/// One row of the dataset. Field order must match `COLUMNS`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    #[serde(rename = "M")]
    pub m: u64,
    #[serde(rename = "K")]
    pub k: u64,
    #[serde(rename = "N")]
    pub n: u64,
    #[serde(rename = "total_fp_ops")]
    pub fp_operations: u64,
    #[serde(rename = "total_cache_access_bytes")]
    pub cache_access_bytes: u64,
    pub dram_access_bytes: u64,
    pub llc_access_bytes: u64,
    #[serde(rename = "ai_dram_fp")]
    pub ai_dram: f64,
    #[serde(rename = "ai_llc_fp")]
    pub ai_llc: f64,
    #[serde(rename = "ai_cache_fp")]
    pub ai_cache: f64,
    /// elapsed seconds
    pub time: f64,
    /// achieved FLOP/s
    #[serde(rename = "actually_ops")]
    pub achieved_flops: f64,
}

impl MeasurementRecord {
    pub fn new(size: ProblemSize, metrics: &DerivedMetrics, elapsed_time: f64) -> Self {
        Self {
            m: size.m,
            k: size.k,
            n: size.n,
            fp_operations: metrics.fp_operations,
            cache_access_bytes: metrics.cache_access_bytes,
            dram_access_bytes: metrics.dram_access_bytes,
            llc_access_bytes: metrics.llc_access_bytes,
            ai_dram: metrics.ai_dram,
            ai_llc: metrics.ai_llc,
            ai_cache: metrics.ai_cache,
            time: elapsed_time,
            achieved_flops: metrics.achieved_flops(elapsed_time),
        }
    }

    pub fn problem_size(&self) -> ProblemSize {
        ProblemSize {
            m: self.m,
            k: self.k,
            n: self.n,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IntensityConfig, calculate, parse_counters};

    #[test]
    fn test_header_order() {
        let mut writer = csv::Writer::from_writer(vec![]);
        let metrics = calculate(&parse_counters(""), &IntensityConfig::default());
        let record = MeasurementRecord::new(ProblemSize { m: 1, k: 2, n: 3 }, &metrics, 1.0);
        writer.serialize(record).unwrap();
        let content = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let header = content.lines().next().unwrap();
        assert_eq!(header, COLUMNS.join(","));
    }

    #[test]
    fn test_problem_size() {
        assert_eq!(
            ProblemSize::new(10, 20, 30).unwrap(),
            ProblemSize { m: 10, k: 20, n: 30 }
        );
        assert!(ProblemSize::new(0, 20, 30).is_err());
        assert!(ProblemSize::new(10, 0, 30).is_err());
        assert!(ProblemSize::new(10, 20, 0).is_err());
    }

    #[test]
    fn test_from_metrics() {
        let metrics = calculate(
            &parse_counters("400 fp_arith_inst_retired.scalar_double\n10 LLC-loads\n"),
            &IntensityConfig::default(),
        );
        let size = ProblemSize { m: 10, k: 20, n: 30 };
        let record = MeasurementRecord::new(size, &metrics, 0.5);
        assert_eq!(record.problem_size(), size);
        assert_eq!(record.fp_operations, 400);
        assert_eq!(record.llc_access_bytes, 640);
        assert_eq!(record.cache_access_bytes, 0);
        assert_eq!(record.ai_cache, f64::INFINITY);
        assert_eq!(record.time, 0.5);
        assert_eq!(record.achieved_flops, 800.0);
    }
}
