//! Chat commands, the console transport and process wiring.

pub mod app;
pub mod commands;
pub mod console;
pub mod help;

pub use app::BotServices;
pub use commands::{CommandHandler, Reply};
pub use console::{run_console, ConsoleNotifier, ConsoleOutput};
