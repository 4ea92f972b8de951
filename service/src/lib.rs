//! Infrastructure shared by every channel of the client: command line and
//! environment configuration, and the terminal logger.

pub mod config;
pub mod logging;
