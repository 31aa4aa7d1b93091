//! Synthetic fixtures shared by unit and integration tests.
//!
//! Everything here is deterministic: seeded noise, on-bin sines and a
//! closed-form decay model, so tests never need reference data on disk.

pub mod scores;
pub mod signals;
