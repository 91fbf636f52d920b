//! `mailpart`: decompose fetched mail messages into text and attachments.
//!
//! A message's MIME tree is split and walked into a [`model::message::DecodedMessage`]:
//! all plain-text and HTML parts concatenated as UTF-8, plus the attachments,
//! each with an id and a `YYYY/MM` file path that stay the same every time the
//! same message is decoded.

pub mod config;
pub mod decode;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;

pub use decode::{decode, decode_raw};
