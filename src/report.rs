use crate::{DerivedMetrics, MeasurementRecord, ProblemSize};
use cli_table::{Cell, Table, print_stdout};
use size::Size;

/// Format an integer with `,` as thousands separator
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut result = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    result
}

fn bytes(value: u64) -> String {
    format!("{} ({})", group_thousands(value), Size::from_bytes(value))
}

/// (metric, value) pairs of the console report
pub fn metrics_rows(metrics: &DerivedMetrics, elapsed_time: f64) -> Vec<(String, String)> {
    let fp = &metrics.fp_instructions;
    let count = |name: &str, value: u64| (name.to_string(), group_thousands(value));
    vec![
        count("Instructions", metrics.instructions),
        count("Retired instructions", metrics.inst_retired_any),
        count("Issued uops", metrics.uops_issued_any),
        count("Cycles", metrics.cycles),
        count("Total FLOP", metrics.fp_operations),
        count("  Scalar single", fp.scalar_single),
        count("  Scalar double", fp.scalar_double),
        count("  128-bit packed single", fp.packed_128b_single),
        count("  128-bit packed double", fp.packed_128b_double),
        count("  256-bit packed single", fp.packed_256b_single),
        count("  256-bit packed double", fp.packed_256b_double),
        count("  512-bit packed single", fp.packed_512b_single),
        count("  512-bit packed double", fp.packed_512b_double),
        ("DRAM access".to_string(), bytes(metrics.dram_access_bytes)),
        ("LLC access".to_string(), bytes(metrics.llc_access_bytes)),
        ("Cache access".to_string(), bytes(metrics.cache_access_bytes)),
        (
            "Cache miss rate".to_string(),
            format!("{:.4}", metrics.cache_miss_rate),
        ),
        (
            "AI to DRAM".to_string(),
            format!("{:.4} FLOP/byte", metrics.ai_dram),
        ),
        (
            "AI to LLC".to_string(),
            format!("{:.4} FLOP/byte", metrics.ai_llc),
        ),
        (
            "AI to cache".to_string(),
            format!("{:.4} FLOP/byte", metrics.ai_cache),
        ),
        ("Elapsed time".to_string(), format!("{} s", elapsed_time)),
        (
            "Achieved GFLOPS".to_string(),
            format!("{:.2}", metrics.achieved_gflops(elapsed_time)),
        ),
    ]
}

pub fn print_metrics(metrics: &DerivedMetrics, elapsed_time: f64) -> anyhow::Result<()> {
    let table = metrics_rows(metrics, elapsed_time)
        .into_iter()
        .map(|(name, value)| vec![name.cell(), value.cell()])
        .collect::<Vec<_>>()
        .table()
        .title(vec!["Metric".cell(), "Value".cell()]);
    print_stdout(table)?;
    Ok(())
}

/// Rows matching the given shape filter, all rows without one
pub fn filter_records<'a>(
    records: &'a [MeasurementRecord],
    m: Option<u64>,
    k: Option<u64>,
    n: Option<u64>,
) -> Vec<&'a MeasurementRecord> {
    records
        .iter()
        .filter(|record| {
            let ProblemSize { m: rm, k: rk, n: rn } = record.problem_size();
            m.is_none_or(|m| m == rm) && k.is_none_or(|k| k == rk) && n.is_none_or(|n| n == rn)
        })
        .collect()
}

pub fn dataset_rows(records: &[&MeasurementRecord]) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = records
        .iter()
        .map(|record| {
            vec![
                format!("{}x{}x{}", record.m, record.k, record.n),
                group_thousands(record.fp_operations),
                format!("{:.4}", record.ai_dram),
                format!("{:.4}", record.ai_llc),
                format!("{:.4}", record.ai_cache),
                format!("{:.6}", record.time),
                format!("{:.2}", record.achieved_flops / 1e9),
            ]
        })
        .collect();

    if !records.is_empty() {
        let len = records.len() as f64;
        let time = records.iter().map(|record| record.time).sum::<f64>() / len;
        let gflops = records
            .iter()
            .map(|record| record.achieved_flops / 1e9)
            .sum::<f64>()
            / len;
        rows.push(vec![
            "Average".to_string(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            format!("{:.6}", time),
            format!("{:.2}", gflops),
        ]);
    }
    rows
}

pub fn print_dataset(records: &[&MeasurementRecord]) -> anyhow::Result<()> {
    let table = dataset_rows(records)
        .into_iter()
        .map(|row| row.into_iter().map(|value| value.cell()).collect::<Vec<_>>())
        .collect::<Vec<_>>()
        .table()
        .title(vec![
            "M x K x N".cell(),
            "FLOP".cell(),
            "AI DRAM".cell(),
            "AI LLC".cell(),
            "AI cache".cell(),
            "Time (s)".cell(),
            "GFLOPS".cell(),
        ]);
    print_stdout(table)?;
    Ok(())
}
