pub mod app;
mod browser;
pub mod config;
mod console;
mod effects;
mod render;
