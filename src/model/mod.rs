//! Core data model: message context, decoded messages, attachments, addresses.

pub mod address;
pub mod attachment;
pub mod context;
pub mod message;
