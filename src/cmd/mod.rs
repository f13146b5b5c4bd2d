//! CLI command implementations.
//!
//! | Module    | Commands handled |
//! |-----------|------------------|
//! | `serve`   | `Serve`          |
//! | `patches` | `Patches`        |
//! | `run`     | `Run`            |

pub mod patches;
pub mod run;
pub mod serve;

pub use patches::cmd_patches;
pub use run::cmd_run;
pub use serve::cmd_serve;
