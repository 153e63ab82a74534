//! Cross-module tests for the classification pipeline
//!
//! This module contains tests that exercise several components together.

pub mod support;

pub mod orchestrator_tests;
