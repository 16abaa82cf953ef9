pub mod alignment;

pub use alignment::{align, placement};
