//! Routeplan Types - Shared domain types
//!
//! This crate contains domain types used across Routeplan services:
//! - User identity
//! - Plans, limits and the plan catalog
//! - The per-user subscription profile and its wire format
//! - Waypoints and optimized routes

pub mod error;
pub mod plan;
pub mod route;
pub mod subscription;
pub mod user;

pub use error::*;
pub use plan::*;
pub use route::*;
pub use subscription::*;
pub use user::*;
