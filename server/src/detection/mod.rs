pub mod annotator;
pub mod detector;
