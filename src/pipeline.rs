use crate::{
    AnalysisConfig, DerivedMetrics, MeasurementRecord, ProblemSize, RawReport, RecordStore,
    calculate,
};
use log::info;
use std::path::Path;

/// Everything derived from one raw perf report
#[derive(Debug, Clone)]
pub struct Analysis {
    pub metrics: DerivedMetrics,
    pub elapsed_time: f64,
    pub record: MeasurementRecord,
}

/// Parse the report and derive its metrics without touching the dataset
pub fn analyze<P: AsRef<Path>>(
    report_path: P,
    size: ProblemSize,
    config: &AnalysisConfig,
) -> anyhow::Result<Analysis> {
    size.validate()?;
    let report_path = report_path.as_ref();
    info!("Parsing perf report {}", report_path.display());
    let report = RawReport::open(report_path, config.elapsed_time_line)?;
    info!(
        "Got {} counters, elapsed time {} s",
        report.counters.len(),
        report.elapsed_time
    );

    let metrics = calculate(&report.counters, &config.intensity());
    let record = MeasurementRecord::new(size, &metrics, report.elapsed_time);
    Ok(Analysis {
        metrics,
        elapsed_time: report.elapsed_time,
        record,
    })
}

/// Analyze the report and append its record to the configured dataset
pub fn analyze_and_store<P: AsRef<Path>>(
    report_path: P,
    size: ProblemSize,
    config: &AnalysisConfig,
) -> anyhow::Result<Analysis> {
    let analysis = analyze(report_path, size, config)?;
    RecordStore::new(&config.store()).append(&analysis.record)?;
    Ok(analysis)
}
