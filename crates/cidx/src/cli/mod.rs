//! CLI command implementations.

mod display;

pub mod build;
pub mod calls;
pub mod function;
pub mod includes;
pub mod init;
pub mod macros;
pub mod refs;
pub mod search;
pub mod stats;
pub mod types;
