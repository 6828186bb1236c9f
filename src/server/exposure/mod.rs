//! API exposure modules
//!
//! Each exposure consumes an `ApiHost` and produces a Router.

pub mod rest;

pub use rest::RestExposure;
