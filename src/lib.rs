mod config;
mod counters;
mod intensity;
mod pipeline;
mod record;
mod report;
mod store;

pub use config::*;
pub use counters::*;
pub use intensity::*;
pub use pipeline::*;
pub use record::*;
pub use report::*;
pub use store::*;
