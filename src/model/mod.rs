//! Core data model types: messages and the mailboxes that hold them.

pub mod mailbox;
pub mod message;

pub use mailbox::{Mailbox, MailboxKind, MessageIndex};
pub use message::{Envelope, Message, MessageFlags};
