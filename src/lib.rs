pub mod config;
pub mod errors;
pub mod jobs;
pub mod server;
pub mod token;

pub use errors::{FanoutError, Result};
pub use jobs::{FanoutService, JobRequest, OutputChunk};
pub use token::Token;
