//! CLI command handling

pub mod context;
pub mod daemon;
pub mod output;
pub mod report;
pub mod settings;

pub use context::*;
pub use daemon::*;
pub use output::*;
pub use report::*;
pub use settings::*;
