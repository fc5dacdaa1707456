//! Compute arithmetic intensity from a perf report and record it
use clap::Parser;
use roofline_experiments::{
    AnalysisConfig, DerivedMetrics, ProblemSize, RecordStore, analyze, print_metrics,
};
use std::{fs::File, io::BufWriter, path::PathBuf};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Rows of the left matrix
    #[arg(short, value_parser = clap::value_parser!(u64).range(1..))]
    m: u64,

    /// Columns of the left matrix
    #[arg(short, value_parser = clap::value_parser!(u64).range(1..))]
    k: u64,

    /// Columns of the right matrix
    #[arg(short, value_parser = clap::value_parser!(u64).range(1..))]
    n: u64,

    /// Path to raw perf stat output
    #[arg(short, long)]
    report_path: PathBuf,

    /// Path to json config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to csv dataset, overrides config
    #[arg(short, long)]
    dataset_path: Option<PathBuf>,

    /// Cache line size in bytes, overrides config
    #[arg(long)]
    cache_line_size: Option<u64>,

    /// Line of the report holding the elapsed time, overrides config
    #[arg(long)]
    elapsed_time_line: Option<usize>,

    /// Path to write derived metrics json
    #[arg(short, long)]
    output_path: Option<PathBuf>,

    /// Only print the metrics, do not append to the dataset
    #[arg(long)]
    no_store: bool,
}

#[derive(serde::Serialize)]
struct Output<'a> {
    report_path: &'a PathBuf,
    m: u64,
    k: u64,
    n: u64,
    elapsed_time: f64,
    achieved_flops: f64,
    metrics: &'a DerivedMetrics,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Cli::parse();

    let mut config = match &args.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(dataset_path) = args.dataset_path {
        config.dataset_path = dataset_path;
    }
    if let Some(cache_line_size) = args.cache_line_size {
        config.cache_line_size = cache_line_size;
    }
    if let Some(elapsed_time_line) = args.elapsed_time_line {
        config.elapsed_time_line = elapsed_time_line;
    }

    let size = ProblemSize::new(args.m, args.k, args.n)?;
    let analysis = analyze(&args.report_path, size, &config)?;

    println!(
        "Arithmetic intensity of GeMM {}x{}x{} from {}:",
        size.m,
        size.k,
        size.n,
        args.report_path.display()
    );
    print_metrics(&analysis.metrics, analysis.elapsed_time)?;

    if let Some(output_path) = &args.output_path {
        // infinite intensities are written as null
        let output = Output {
            report_path: &args.report_path,
            m: size.m,
            k: size.k,
            n: size.n,
            elapsed_time: analysis.elapsed_time,
            achieved_flops: analysis.record.achieved_flops,
            metrics: &analysis.metrics,
        };
        serde_json::to_writer_pretty(BufWriter::new(File::create(output_path)?), &output)?;
        println!("Metrics saved to {}", output_path.display());
    }

    if !args.no_store {
        let store = RecordStore::new(&config.store());
        let rows = store.append(&analysis.record)?;
        println!("Dataset {} now has {} rows", store.path().display(), rows);
    }

    Ok(())
}
