pub mod api;
pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod normalize;
pub mod output;
pub mod probe;
pub mod query;
pub mod render;
pub mod tracker;
