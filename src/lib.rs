pub mod app;
pub mod backend;
pub mod config;
pub mod connection;
pub mod error;
pub mod pose;
pub mod protocol;
pub mod recognition;
pub mod render;
pub mod report;
pub mod rules;
pub mod session;
