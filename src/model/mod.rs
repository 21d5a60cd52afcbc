//! Plain data types shared by the decoder: addresses, content types, and attachment descriptors.

pub mod address;
pub mod attachment;
pub mod content_type;
