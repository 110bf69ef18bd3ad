//! Unit tests for the media analysis SDK
//!
//! This module contains tests for the governor, the sequential queue, the
//! HTTP backend and the ambient configuration and error layers.

pub mod support;

pub mod autosave_tests;
pub mod config_tests;
