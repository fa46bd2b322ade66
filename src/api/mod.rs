//! API route definitions
//!
//! The control surface is a thin REST layer; all scheduling logic lives in
//! the services and scheduler modules.

pub mod health;
pub mod schedule;
