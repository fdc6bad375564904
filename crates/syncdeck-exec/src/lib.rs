pub mod client;
pub mod contracts;
pub mod runner;

pub use client::*;
pub use contracts::*;
pub use runner::*;
