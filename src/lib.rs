// src/lib.rs

//! jobsweep: job listing aggregator library

pub mod config;
pub mod credentials;
pub mod error;
pub mod limiter;
pub mod models;
pub mod pipeline;
pub mod scoring;
pub mod services;
pub mod storage;
pub mod utils;
