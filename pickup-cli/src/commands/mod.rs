pub mod config;
pub mod daemon;
pub mod inspect;
mod render;
pub mod run;
