//! Command implementations

pub mod infer;
pub mod status;
pub mod upload;
