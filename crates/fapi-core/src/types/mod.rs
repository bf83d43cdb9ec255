//! Core enums shared between the trading core and its front-ends.

pub mod enums;

pub use enums::*;
