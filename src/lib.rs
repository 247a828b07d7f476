//! pagesmith - offline content compiler for a memory-banked adventure engine.
//!
//! Turns declarative locations, items, scripts, display text and tile graphics
//! into compressed, cross-referenced records packed into fixed-size pages.

#[macro_use]
extern crate lazy_static;

pub mod content_compiler;
