//! SENT protocol decoder.
//!
//! Converts pulse interval measurements into validated fast-channel frames
//! and demultiplexed slow-channel values.

pub mod crc;

mod channel;
mod fast;
mod slow;

pub use channel::SentChannel;
