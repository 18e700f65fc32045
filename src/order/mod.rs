// src/order/mod.rs

//! Hierarchical dotted order keys and wildcard auto-numbering.

pub mod key;
pub mod resolver;

pub use key::{OrderKey, Segment, WILDCARD};
pub use resolver::WildcardResolver;
