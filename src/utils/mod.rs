pub mod image_ops;
pub mod metrics;

// Re-export commonly used items
pub use image_ops::{capture_frame, decode_dimensions, decode_dimensions_async, is_image_filename};
pub use metrics::{Metrics, Upstream};
