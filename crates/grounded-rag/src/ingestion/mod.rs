//! Source ingestion: extraction, segmentation and collection naming

pub mod extractor;
pub mod naming;
pub mod segmenter;

pub use extractor::TextExtractor;
pub use naming::{collection_name_for_file, collection_name_for_url, validate_collection_name};
pub use segmenter::{SegmentMode, Segmenter};
