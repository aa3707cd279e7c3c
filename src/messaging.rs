//! Messaging adapters and the manager routing responses back to them.

pub mod console;
pub mod manager;
pub mod traits;

pub use console::ConsoleAdapter;
pub use manager::MessagingManager;
pub use traits::{InboundStream, Messaging, MessagingDyn};
