//! Engine: CLI surface, diff engine, worker pool, command executor, and the
//! driver that wires them together.

pub mod arg_parser;
pub mod diff;
pub mod driver;
pub mod executor;
pub mod pool;
pub mod progress;

pub use arg_parser::Cli;
pub use driver::{RunOptions, run};
