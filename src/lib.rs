// Crate root library declaration and module exports.
pub mod alarm_index;
pub mod astro;
pub mod cascade;
pub mod cli;
pub mod config;
pub mod context;
pub mod engine;
pub mod model;
pub mod notify;
pub mod scheduler;
pub mod service;
pub mod storage;
pub mod system;
pub mod timer;
