mod cache;
mod cli;
mod commands;
mod error;
mod lock;
mod logging;
mod report;
mod settings;

use std::process::ExitCode;

use clap::Parser;
use rebuild_platform::AppPaths;

use crate::cli::Cli;
use crate::commands::App;
use crate::settings::AppSettings;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let paths = match AppPaths::new() {
        Ok(paths) => paths,
        Err(error) => {
            eprintln!("error: {error}");
            return ExitCode::FAILURE;
        }
    };
    let settings = AppSettings::load(&paths);
    logging::init_logging(
        &paths,
        cli.verbose || settings.debug_logging,
        settings.max_log_size_bytes,
    );

    let app = App::new(paths, settings);
    match app.run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            log::debug!("Command failed: {error:?}");
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}
