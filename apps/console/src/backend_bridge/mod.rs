//! Bridge between the blocking console loop and the async session controller.

pub mod commands;
pub mod runtime;
