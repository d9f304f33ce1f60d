//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Concrete implementations of the port traits. Only persistence
//! adapters live here; the trading endpoint, notification and
//! analytics layers are external collaborators with their own
//! codebases.

pub mod persistence;
