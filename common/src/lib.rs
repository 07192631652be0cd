pub mod config;
pub mod display;
pub mod frame;
