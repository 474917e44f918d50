pub mod export;

pub use export::{BlobExportSink, FileExportSink};
