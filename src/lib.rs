//! pianoquiz: ear training and note reading with a synthesized piano.

pub mod app;
pub mod config;
pub mod core;
pub mod input;
pub mod messaging;
pub mod note;
pub mod quiz;
pub mod utils;
