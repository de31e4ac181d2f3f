//! Foundation types shared by the rest of the crate: floating-point
//! conventions, geometric classes, the shape contract, intersection
//! records, named-parameter configuration, and a small random number
//! generator.

pub mod defs;
pub mod geometry;
pub mod interaction;
pub mod paramset;
pub mod rng;
pub mod shape;
