//! Channel abstraction for message I/O.

pub mod channel;
pub mod cli;
pub mod telegram;
pub mod testing;

pub use channel::*;
pub use cli::CliChannel;
pub use telegram::TelegramChannel;
