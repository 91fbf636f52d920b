//! Persistence of decoded content.

pub mod attachment;
