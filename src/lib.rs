pub mod app;
pub mod changelog;
pub mod config;
pub mod driver;
pub mod error;
pub mod platform;
pub mod process;
pub mod report;
pub mod shutdown;
pub mod status;
pub mod workflow;
pub mod workspace;

#[cfg(test)]
pub mod testing;
