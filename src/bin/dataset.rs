//! Display recorded measurements
use clap::Parser;
use roofline_experiments::{
    DEFAULT_DATASET_PATH, RecordStore, StoreConfig, filter_records, print_dataset,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to csv dataset
    #[arg(short, long, default_value = DEFAULT_DATASET_PATH)]
    dataset_path: PathBuf,

    /// Only show rows with this M
    #[arg(short)]
    m: Option<u64>,

    /// Only show rows with this K
    #[arg(short)]
    k: Option<u64>,

    /// Only show rows with this N
    #[arg(short)]
    n: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Cli::parse();

    let store = RecordStore::new(&StoreConfig {
        path: args.dataset_path,
    });
    println!("Loading dataset from {}", store.path().display());
    let records = store.load()?;
    let selected = filter_records(&records, args.m, args.k, args.n);
    println!("Showing {} of {} rows", selected.len(), records.len());
    if !selected.is_empty() {
        print_dataset(&selected)?;
    }
    Ok(())
}
