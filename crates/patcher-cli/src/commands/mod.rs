//! CLI command implementations.
//!
//! This module contains the implementation of each CLI command.

pub mod apply;
pub mod hex_utils;
pub mod hexdump;
pub mod resolve;
pub mod scan;
