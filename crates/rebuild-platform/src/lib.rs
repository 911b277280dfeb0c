mod commands;
mod expand;
mod fs;
mod paths;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use commands::{CommandError, CommandOutput, CommandRunner, HideWindow, SystemRunner};
pub use expand::PathExpander;
pub use fs::{replace_file, write_atomic};
pub use paths::{AppPaths, AppPathsError, resolve_backup_root};
