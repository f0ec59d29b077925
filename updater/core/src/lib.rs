pub use api::Registry;
pub use extractor::MetadataExtractor;
pub use registry::VersionRegistry;

mod api;
pub mod extractor;
pub mod registry;
