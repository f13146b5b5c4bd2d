//! Patch runs — submit a bulk code-patch job, poll its output.
//!
//! ## Module Map
//!
//! ```text
//!  run(JobRequest)                               output(Token)
//!        │                                             │
//!        v                                             v
//! ┌──────────────────────────────────────────────┐  ┌──────────────────────┐
//! │ service.rs  (FanoutService)                  │  │ registry.rs          │
//! │   1. store.rs    list() / load()  sandboxed  │  │   OutputRegistry     │
//! │   2. command.rs  CommandArgs::build()        │  │   drain() removes    │
//! │   3. token.rs    Token::generate()           │  │   the entry on the   │
//! │   4. registry.rs register(token, queue) ─────┼─>│   first poll that    │
//! │   5. executor.rs Executor::launch()          │  │   sees it closed     │
//! └──────────────────────┬───────────────────────┘  └──────────▲───────────┘
//!                        │ detached supervisor task             │
//!                        v                                      │
//!          stdout reader ─┐                                     │
//!          stderr reader ─┼─> OutputWriter ── bounded queue ────┘
//!          child.wait() ──┘   close() once all three finish
//! ```
//!
//! Job types live on disk as `<patches_dir>/<name>/{patch, config.yml}`.

pub mod command;
pub mod executor;
pub mod registry;
pub mod service;
pub mod store;

pub use command::{CommandArgs, FORMAT_FLAG, JobRequest};
pub use executor::{Executor, ProcessExecutor};
pub use registry::{OutputChunk, OutputQueue, OutputRegistry, OutputWriter, output_queue};
pub use service::FanoutService;
pub use store::{JobConfig, JobTypeStore};
