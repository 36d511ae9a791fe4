// SPDX-License-Identifier: MIT
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

// Core Modules
pub mod core;
pub mod fs;

// Reusable traits
pub use crate::core::traits::*;

/// E-mu E3 sampler filesystem.
///
/// See [`e3::E3Volume`], [`e3::E3Formatter`] and [`e3::E3Checker`].
pub mod e3 {
    pub use super::fs::prelude::*;
}
