//! Per-shop nodepoint counters of a retail analytics API, assembled into a
//! monthly stats table and rendered as CSV plus diagnostic heatmaps.

pub mod config;
pub mod fetcher;
pub mod models;
pub mod processor;
pub mod storage;
