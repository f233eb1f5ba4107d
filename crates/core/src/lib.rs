//! Sellr Core - Shared types library.
//!
//! This crate provides the types shared by the storefront and its tests:
//! - Type-safe string IDs for users, products and sellers
//! - Decimal prices
//! - Cart line items with their quantity and uniqueness invariants
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no logging.
//! This keeps it lightweight and allows it to be used anywhere.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
