//! Core data model for text spans
//!
//! This module contains pure data structures with minimal external dependencies.

pub mod document;
pub mod edit;
pub mod interval_iter;
pub mod interval_tree;
pub mod position;
