mod download;
mod error;
mod installer;
mod session;

pub use download::{Downloader, HttpDownloader, installer_file_name};
pub use error::InstallError;
pub use installer::{InstallResult, InstallStatus, Installer};
pub use session::{RestoreSession, SessionItem, ToolOutcome};
