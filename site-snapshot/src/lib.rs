pub mod cli;
pub mod load_config;
