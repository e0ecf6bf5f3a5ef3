//! Retrieval backends and ranking.

pub mod hybrid;
pub mod keyword;
pub mod pipeline;
pub mod vector;
