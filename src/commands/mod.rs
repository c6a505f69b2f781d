//! Command implementations
//!
//! Each module corresponds to a subcommand in the CLI.

pub mod ask;
pub mod chat;
pub mod list;
pub mod session;

pub use ask::run as ask_run;
pub use chat::run as chat_run;
pub use session::SessionOptions;
