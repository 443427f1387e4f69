//! Common types used across tabload

mod dataset;
mod value;

pub use dataset::{Column, Dataset};
pub use value::Value;
