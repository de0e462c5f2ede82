pub mod client;
pub mod extractor;
pub mod prompts;
pub mod types;
pub mod utils;

pub use client::*;
pub use extractor::*;
pub use types::*;
