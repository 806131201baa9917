//! # strata-core
//!
//! Core types and primitives for the Strata rendering core.
//! This crate contains foundational types shared across all Strata crates:
//! colors, tagged parameter values, RGBA32F images, transforms, configuration
//! and error types.

pub mod color;
pub mod config;
pub mod error;
pub mod frame;
pub mod hash;
pub mod math;
pub mod value;

pub use config::*;

pub use color::Color;
pub use error::{StrataError, StrataResult};
pub use frame::Image;
pub use math::{Affine2, Point2D};
pub use value::{DataType, Value};
