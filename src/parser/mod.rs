//! Message parsing: header decoding and MIME part splitting.

pub mod header;
pub mod part;
