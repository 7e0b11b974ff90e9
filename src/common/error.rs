//! Error types shared across the decoder and its readers.

use thiserror::Error;

/// Errors surfaced by channel readers and the slow-channel mailbox.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentError {
    /// No frame has passed CRC validation since the channel was created.
    #[error("no valid frame received yet")]
    NoData,

    /// No valid mailbox entry carries the requested message id.
    #[error("no slow channel value for id {0}")]
    UnknownId(u8),

    /// Every mailbox slot already holds a different id.
    #[error("slow channel mailboxes exhausted ({0} slots)")]
    MailboxFull(usize),
}
