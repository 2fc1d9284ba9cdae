// Library exports for the warden supervisor

pub mod config;
pub mod error;
pub mod output;
pub mod process;
