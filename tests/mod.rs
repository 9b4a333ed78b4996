//! Test suite for live-updates
//!
//! This module organizes all tests

pub mod common;
pub mod integration;
pub mod property;
