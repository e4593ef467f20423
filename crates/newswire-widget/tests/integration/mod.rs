//! Integration tests for newswire-widget.
//!
//! These tests verify the interaction between components:
//! - Feed connection lifecycle against a scripted server
//! - Feed frames reaching the store
//! - Gestures turning into trades for the current news item

pub mod common;
