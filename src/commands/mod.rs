//! CLI command implementations.

mod clean;
mod init;
mod list;
mod refresh;
mod search;
mod stats;
mod watch;

pub use clean::CleanCmd;
pub use init::InitCmd;
pub use list::ListCmd;
pub use refresh::RefreshCmd;
pub use search::SearchCmd;
pub use stats::StatsCmd;
pub use watch::WatchCmd;
