//! Draw rectangle and polygon annotations on images, attach text to them,
//! and browse them through hover popups.

pub mod annotation;
pub mod annotator;
pub mod app;
pub mod config;
pub mod editor;
pub mod error;
pub mod events;
pub mod geometry;
pub mod hint;
pub mod module;
pub mod popup;
pub mod selector;
pub mod viewer;

pub use error::{Error, Result};
