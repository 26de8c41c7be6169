//! REST API handlers

pub mod billing;
pub mod health;
pub mod maps;
pub mod optimize;
pub mod shared;
pub mod webhook;

pub use billing::*;
pub use health::*;
pub use maps::*;
pub use optimize::*;
pub use webhook::*;
