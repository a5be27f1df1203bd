//! Terminal user interface

mod cli;

pub use cli::{Args, Cli, LogFormat, OutputDevice};
