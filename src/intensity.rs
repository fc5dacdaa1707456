use crate::CounterSample;
use serde::Serialize;

pub const DEFAULT_CACHE_LINE_SIZE: u64 = 64;

/// FLOPs per retired instruction for each `fp_arith_inst_retired` event
pub const FP_WEIGHTS: [(&str, u64); 8] = [
    ("fp_arith_inst_retired.scalar_single", 1),
    ("fp_arith_inst_retired.scalar_double", 1),
    ("fp_arith_inst_retired.128b_packed_single", 4),
    ("fp_arith_inst_retired.128b_packed_double", 2),
    ("fp_arith_inst_retired.256b_packed_single", 8),
    ("fp_arith_inst_retired.256b_packed_double", 4),
    ("fp_arith_inst_retired.512b_packed_single", 16),
    ("fp_arith_inst_retired.512b_packed_double", 8),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntensityConfig {
    /// Bytes moved per cache reference or miss
    pub cache_line_size: u64,
}

impl Default for IntensityConfig {
    fn default() -> Self {
        Self {
            cache_line_size: DEFAULT_CACHE_LINE_SIZE,
        }
    }
}

/// Retired floating point instructions by SIMD width and precision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FpInstructionCounts {
    pub scalar_single: u64,
    pub scalar_double: u64,
    pub packed_128b_single: u64,
    pub packed_128b_double: u64,
    pub packed_256b_single: u64,
    pub packed_256b_double: u64,
    pub packed_512b_single: u64,
    pub packed_512b_double: u64,
}

impl FpInstructionCounts {
    pub fn from_sample(sample: &CounterSample) -> Self {
        let [s1, s2, s3, s4, s5, s6, s7, s8] = FP_WEIGHTS.map(|(name, _)| sample.get(name));
        Self {
            scalar_single: s1,
            scalar_double: s2,
            packed_128b_single: s3,
            packed_128b_double: s4,
            packed_256b_single: s5,
            packed_256b_double: s6,
            packed_512b_single: s7,
            packed_512b_double: s8,
        }
    }

    /// Counts in the order of `FP_WEIGHTS`
    pub fn as_array(&self) -> [u64; 8] {
        [
            self.scalar_single,
            self.scalar_double,
            self.packed_128b_single,
            self.packed_128b_double,
            self.packed_256b_single,
            self.packed_256b_double,
            self.packed_512b_single,
            self.packed_512b_double,
        ]
    }

    pub fn total_flops(&self) -> u64 {
        self.as_array()
            .iter()
            .zip(FP_WEIGHTS.iter())
            .fold(0u64, |total, (count, (_, weight))| {
                total.saturating_add(count.saturating_mul(*weight))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedMetrics {
    pub instructions: u64,
    /// `inst_retired.any`, or `instructions` when the event was not counted
    pub inst_retired_any: u64,
    pub uops_issued_any: u64,
    pub cycles: u64,

    /// weighted sum of all floating point instructions
    pub fp_operations: u64,
    pub fp_instructions: FpInstructionCounts,

    /// estimated bytes transferred at each memory level
    pub dram_access_bytes: u64,
    pub llc_access_bytes: u64,
    pub cache_access_bytes: u64,

    /// FLOP per byte, infinite when no traffic was observed at that level
    pub ai_dram: f64,
    pub ai_llc: f64,
    pub ai_cache: f64,

    /// cache-misses / cache-references, zero without references
    pub cache_miss_rate: f64,
}

impl DerivedMetrics {
    /// FLOP/s over the given elapsed time in seconds
    pub fn achieved_flops(&self, elapsed_time: f64) -> f64 {
        self.fp_operations as f64 / elapsed_time
    }

    pub fn achieved_gflops(&self, elapsed_time: f64) -> f64 {
        self.achieved_flops(elapsed_time) / 1e9
    }
}

fn intensity(flops: u64, bytes: u64) -> f64 {
    if bytes == 0 {
        f64::INFINITY
    } else {
        flops as f64 / bytes as f64
    }
}

/// Derive roofline metrics from one counter sample. Missing counters count as
/// zero so partial hardware support still yields a full record.
pub fn calculate(sample: &CounterSample, config: &IntensityConfig) -> DerivedMetrics {
    let instructions = sample.get("instructions");
    let fp_instructions = FpInstructionCounts::from_sample(sample);
    let fp_operations = fp_instructions.total_flops();

    let cache_refs = sample.get("cache-references");
    let cache_misses = sample.get("cache-misses");
    let llc_loads = sample.get("LLC-loads");
    let llc_stores = sample.get("LLC-stores");
    let llc_load_misses = sample.get("LLC-load-misses");
    let llc_store_misses = sample.get("LLC-store-misses");

    let line = config.cache_line_size;
    let dram_access_bytes = llc_load_misses
        .saturating_add(llc_store_misses)
        .saturating_mul(line);
    let llc_access_bytes = llc_loads.saturating_add(llc_stores).saturating_mul(line);
    let cache_access_bytes = cache_refs.saturating_mul(line);

    let cache_miss_rate = if cache_refs == 0 {
        0.0
    } else {
        cache_misses as f64 / cache_refs as f64
    };

    DerivedMetrics {
        instructions,
        inst_retired_any: sample.get_or("inst_retired.any", instructions),
        uops_issued_any: sample.get("uops_issued.any"),
        cycles: sample.get("cycles"),
        fp_operations,
        fp_instructions,
        dram_access_bytes,
        llc_access_bytes,
        cache_access_bytes,
        ai_dram: intensity(fp_operations, dram_access_bytes),
        ai_llc: intensity(fp_operations, llc_access_bytes),
        ai_cache: intensity(fp_operations, cache_access_bytes),
        cache_miss_rate,
    }
}
