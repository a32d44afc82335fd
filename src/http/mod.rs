//! HTTP routing building blocks.
//!
//! Provides the RouteModule trait for organizing routes.

pub mod routes;

pub use routes::RouteModule;
