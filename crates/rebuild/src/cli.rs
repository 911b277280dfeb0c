use clap::{Parser, Subcommand};

/// Back up and restore developer tool configuration.
#[derive(Debug, Parser)]
#[command(name = "rebuild", version, about)]
pub struct Cli {
    /// Show debug output on the terminal.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Detect installed tools.
    Detect {
        /// Ignore the cached detection result.
        #[arg(long)]
        refresh: bool,
        #[arg(long)]
        json: bool,
    },

    /// Capture tool configuration into a new backup.
    Backup {
        /// Backup name; `backup_` is prepended when missing.
        #[arg(long)]
        name: Option<String>,
        /// Tools to back up. Defaults to every detected tool in the catalog.
        #[arg(short, long = "tool", value_delimiter = ',')]
        tools: Vec<String>,
        /// Environment variables to record, read from the current process.
        #[arg(short, long = "env", value_delimiter = ',')]
        env: Vec<String>,
        /// Write a zip archive instead of a folder.
        #[arg(long, conflicts_with = "no_archive")]
        archive: bool,
        #[arg(long)]
        no_archive: bool,
        #[arg(long)]
        refresh: bool,
    },

    /// List backups, newest first.
    List {
        #[arg(long)]
        json: bool,
    },

    /// Show what a backup contains.
    Show {
        /// Backup name. Defaults to the most recent backup.
        backup: Option<String>,
        #[arg(long)]
        json: bool,
    },

    /// Compare a backup with the tools installed now.
    Compare {
        backup: Option<String>,
        #[arg(long)]
        refresh: bool,
        #[arg(long)]
        json: bool,
    },

    /// Install missing tools and restore their configuration.
    Restore {
        backup: Option<String>,
        /// Only restore these tools.
        #[arg(short, long = "tool", value_delimiter = ',')]
        tools: Vec<String>,
        /// Restore configuration without installing missing tools.
        #[arg(long)]
        no_install: bool,
        /// Also restore the environment variables recorded in the backup.
        #[arg(long)]
        with_env: bool,
        #[arg(long)]
        refresh: bool,
    },

    /// Restore environment variables recorded in a backup.
    Env {
        backup: Option<String>,
        /// Only restore these variables.
        #[arg(long = "var", value_delimiter = ',')]
        vars: Vec<String>,
    },

    /// Print the effective settings and paths.
    Config {
        /// Write a default settings file if none exists.
        #[arg(long)]
        init: bool,
    },

    /// List the tools whose configuration can be backed up.
    Catalog {
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::{Cli, Command};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn backup_accepts_comma_separated_tools() {
        let cli = Cli::try_parse_from([
            "rebuild",
            "backup",
            "--tool",
            "Git,Visual Studio Code",
            "--env",
            "JAVA_HOME",
            "--archive",
        ])
        .expect("arguments should parse");

        let Command::Backup {
            tools, env, archive, ..
        } = cli.command
        else {
            panic!("expected backup command");
        };
        assert_eq!(tools, vec!["Git", "Visual Studio Code"]);
        assert_eq!(env, vec!["JAVA_HOME"]);
        assert!(archive);
    }

    #[test]
    fn archive_flags_conflict() {
        let result = Cli::try_parse_from(["rebuild", "backup", "--archive", "--no-archive"]);
        assert!(result.is_err());
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::try_parse_from(["rebuild", "list", "--verbose"])
            .expect("arguments should parse");
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::List { json: false }));
    }
}
