pub mod config;
pub mod console;
pub mod dispatch_fsm;
pub mod dispatcher;
pub mod error;
pub mod interfaces;
pub mod logging;
pub mod poller;
pub mod providers;
pub mod scheduler;
pub mod session;
pub mod status;

pub type Result<T> = std::result::Result<T, error::ConsoleError>;
