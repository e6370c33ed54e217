pub mod analyzers;
pub mod config;
pub mod error;
pub mod feed;
pub mod output;
pub mod pipeline;
pub mod render;
pub mod sampling;
pub mod stats;
