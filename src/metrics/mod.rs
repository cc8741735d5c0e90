pub mod fetcher;
pub mod pipeline;
pub mod relabel;

pub use fetcher::{MetricFetcher, MetricSource};
pub use pipeline::RelabelPipeline;
pub use relabel::{InjectMode, Relabeler};
