//! Common utilities shared across the delivery engine.

pub mod retry;
