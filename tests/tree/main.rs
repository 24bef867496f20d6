//! Integration tests for Layer 1: Tree
//!
//! Tests for the UI tree arena, mutation recording, and generic inspection.

mod inspection;
