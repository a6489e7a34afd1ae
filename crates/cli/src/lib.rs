//! redline command-line tool and review server
//!
//! The binary in `main.rs` is a thin clap front end over these modules so
//! integration tests can drive the server in-process.

pub mod client;
pub mod cmd;
pub mod config;
pub mod daemon;
pub mod logging;
pub mod pidfile;
pub mod server;
pub mod util;
