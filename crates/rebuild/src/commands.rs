use std::sync::Arc;

use log::{info, warn};
use rebuild_core::env::restore_env_var;
use rebuild_core::{
    BackupBuilder, BackupDescriptor, BackupStore, Capturer, Catalog, DetectedTool, DetectionCache,
    Detector, EnvVar, InstallSources, Manifest, ReconciliationResult, RestoreEngine, reconcile,
};
use rebuild_installer::{HttpDownloader, Installer, RestoreSession, SessionItem};
use rebuild_platform::{AppPaths, CommandRunner, PathExpander, SystemRunner};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::cache;
use crate::cli::Command;
use crate::error::AppError;
use crate::lock::OperationLock;
use crate::report;
use crate::settings::AppSettings;

const PORTABLE_INSTALL_DIR: &str = r"%PROGRAMFILES%\sqldeveloper";

pub struct App {
    paths: AppPaths,
    settings: AppSettings,
    runner: Arc<dyn CommandRunner>,
    expander: PathExpander,
}

impl App {
    pub fn new(paths: AppPaths, settings: AppSettings) -> Self {
        Self {
            paths,
            settings,
            runner: Arc::new(SystemRunner),
            expander: PathExpander::from_process(),
        }
    }

    pub async fn run(&self, command: Command) -> Result<(), AppError> {
        match command {
            Command::Detect { refresh, json } => {
                let cache = self.detection(refresh).await?;
                emit(&cache, json, report::detection)
            }
            Command::Backup {
                name,
                tools,
                env,
                archive,
                no_archive,
                refresh,
            } => {
                let archive = if archive || no_archive {
                    archive
                } else {
                    self.settings.archive_backups
                };
                self.backup(name.as_deref(), &tools, &env, archive, refresh)
                    .await
            }
            Command::List { json } => {
                let backups = self.store().list()?;
                emit(&backups, json, |b| report::backup_list(b))
            }
            Command::Show { backup, json } => {
                let backup = self.find_backup(backup.as_deref())?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&backup.manifest)?);
                } else {
                    let location = backup.storage_path.display().to_string();
                    println!("{}", report::backup_details(&backup.manifest, &location));
                }
                Ok(())
            }
            Command::Compare {
                backup,
                refresh,
                json,
            } => {
                let backup = self.find_backup(backup.as_deref())?;
                let detected = self.detection(refresh).await?;
                let result = reconcile(&backup.manifest, &detected.tools, InstallSources);
                println!("Comparing {} with this machine", backup.name);
                emit(&result, json, report::reconciliation)
            }
            Command::Restore {
                backup,
                tools,
                no_install,
                with_env,
                refresh,
            } => {
                self.restore(backup.as_deref(), &tools, no_install, with_env, refresh)
                    .await
            }
            Command::Env { backup, vars } => {
                let _lock = OperationLock::acquire(&self.paths.operation_lock_file())?;
                let backup = self.find_backup(backup.as_deref())?;
                self.restore_env(&backup.manifest, &vars).await;
                Ok(())
            }
            Command::Config { init } => self.config(init),
            Command::Catalog { json } => {
                let catalog = self.catalog()?;
                if json {
                    let entries: Vec<CatalogRow<'_>> = catalog
                        .entries()
                        .iter()
                        .map(|entry| CatalogRow {
                            display_name: &entry.display_name,
                            internal_name: &entry.internal_name,
                            aliases: &entry.aliases,
                            artifacts: entry.artifacts.len(),
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&entries)?);
                } else {
                    println!("{}", report::catalog(&catalog));
                }
                Ok(())
            }
        }
    }

    async fn backup(
        &self,
        name: Option<&str>,
        selected: &[String],
        env_names: &[String],
        archive: bool,
        refresh: bool,
    ) -> Result<(), AppError> {
        let _lock = OperationLock::acquire(&self.paths.operation_lock_file())?;
        let catalog = Arc::new(self.catalog()?);
        let detected = self.detection(refresh).await?;

        let tools = select_tools(&catalog, &detected, selected)?;
        let env_vars: Vec<EnvVar> = env_names
            .iter()
            .filter_map(|name| match self.expander.get(name) {
                Some(value) => Some(EnvVar::new(name.as_str(), value)),
                None => {
                    warn!("Environment variable {name} is not set, leaving it out");
                    None
                }
            })
            .collect();
        if tools.is_empty() && env_vars.is_empty() {
            return Err(AppError::NothingSelected);
        }

        let capturer = Capturer::new(
            self.expander.clone(),
            Arc::clone(&self.runner),
            self.settings.timeouts(),
        );
        let builder = BackupBuilder::new(
            catalog,
            capturer,
            self.settings.backup_root(&self.paths),
            self.settings.staging_dir(&self.paths),
        )
        .archive(archive);

        info!(
            "Backing up {} tool(s) and {} environment variable(s)",
            tools.len(),
            env_vars.len()
        );
        let outcome = builder.create_backup(&tools, &env_vars, name).await?;
        println!("{}", report::backup_summary(&outcome));
        Ok(())
    }

    async fn restore(
        &self,
        backup: Option<&str>,
        selected: &[String],
        no_install: bool,
        with_env: bool,
        refresh: bool,
    ) -> Result<(), AppError> {
        let _lock = OperationLock::acquire(&self.paths.operation_lock_file())?;
        let catalog = Arc::new(self.catalog()?);
        let store = self.store();
        let backup = find_backup_in(&store, backup)?;
        let detected = self.detection(refresh).await?;

        let result = reconcile(&backup.manifest, &detected.tools, InstallSources);
        let items = session_items(&backup.manifest, &result, selected, no_install)?;

        let timeouts = self.settings.timeouts();
        let downloader = HttpDownloader::new(self.settings.http_timeout())?;
        let installer = Installer::new(
            Arc::clone(&self.runner),
            Arc::new(downloader),
            self.paths.downloads_dir(),
            self.expander.expand(PORTABLE_INSTALL_DIR),
            timeouts,
        )
        .open_browser(self.settings.open_browser_for_manual);
        let engine =
            RestoreEngine::new(catalog, Arc::clone(&self.runner), &self.expander, timeouts);
        let session = RestoreSession::new(&installer, &engine, self.settings.post_install_settle());

        let details = store.open(&backup)?;
        println!("Restoring {} tool(s) from {}", items.len(), backup.name);
        let (tx, mut rx) = mpsc::channel(32);
        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                println!("{}", report::progress_line(&event));
            }
        });

        let outcomes = session
            .run(
                &items,
                &details.working_dir,
                details.manifest.storage_path(),
                &tx,
            )
            .await;
        drop(tx);
        let _ = printer.await;

        println!("{}", report::session_summary(&outcomes));

        if with_env {
            self.restore_env(&details.manifest, &[]).await;
        }

        store.cleanup_extracted();
        Ok(())
    }

    async fn restore_env(&self, manifest: &Manifest, only: &[String]) {
        let vars: Vec<&EnvVar> = manifest
            .environment_variables
            .iter()
            .filter(|var| {
                only.is_empty() || only.iter().any(|n| n.eq_ignore_ascii_case(&var.name))
            })
            .collect();
        if vars.is_empty() {
            println!("No environment variables to restore");
            return;
        }

        println!("Restoring {} environment variable(s):", vars.len());
        let timeout = self.settings.timeouts().env_write;
        for var in vars {
            let outcome =
                restore_env_var(self.runner.as_ref(), &var.name, &var.value, timeout).await;
            println!("{}", report::env_outcome(&var.name, &outcome));
        }
    }

    fn config(&self, init: bool) -> Result<(), AppError> {
        let settings_file = self.paths.settings_file();
        if init {
            if settings_file.exists() {
                println!("Settings already exist at {}", settings_file.display());
            } else {
                AppSettings::default()
                    .save(&self.paths)
                    .map_err(|error| AppError::io("failed to write settings", error))?;
                println!("Wrote default settings to {}", settings_file.display());
            }
        }

        println!("Settings file:   {}", settings_file.display());
        println!("Backup root:     {}", self.settings.backup_root(&self.paths).display());
        println!("Staging dir:     {}", self.settings.staging_dir(&self.paths).display());
        println!("Extract dir:     {}", self.settings.extract_dir(&self.paths).display());
        println!("Detect script:   {}", self.settings.detect_script(&self.paths).display());
        println!("Detection cache: {}", self.paths.detection_cache_file().display());
        println!("Log file:        {}", self.paths.log_file().display());
        println!("{}", serde_json::to_string_pretty(&self.settings)?);
        Ok(())
    }

    fn catalog(&self) -> Result<Catalog, AppError> {
        let catalog = match &self.settings.catalog_path {
            Some(path) => Catalog::from_file(path)?,
            None => Catalog::builtin()?,
        };
        Ok(catalog)
    }

    fn store(&self) -> BackupStore {
        BackupStore::new(
            self.settings.backup_root(&self.paths),
            self.settings.extract_dir(&self.paths),
        )
    }

    fn find_backup(&self, name: Option<&str>) -> Result<BackupDescriptor, AppError> {
        find_backup_in(&self.store(), name)
    }

    async fn detection(&self, refresh: bool) -> Result<DetectionCache, AppError> {
        let cache_file = self.paths.detection_cache_file();
        if !refresh
            && let Some(cached) =
                cache::load_fresh(&cache_file, self.settings.detection_cache_ttl())
        {
            info!("Using cached detection from {}", cached.detected_at.to_rfc3339());
            return Ok(cached);
        }

        let detector = Detector::new(
            Arc::clone(&self.runner),
            self.settings.detect_script(&self.paths),
            self.settings.timeouts().detect,
        );
        let detected = DetectionCache::new(detector.detect().await?);
        cache::save(&cache_file, &detected);
        Ok(detected)
    }
}

fn emit<T, F>(value: &T, json: bool, render: F) -> Result<(), AppError>
where
    T: Serialize + ?Sized,
    F: FnOnce(&T) -> String,
{
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", render(value));
    }
    Ok(())
}

#[derive(Serialize)]
struct CatalogRow<'a> {
    display_name: &'a str,
    internal_name: &'a str,
    aliases: &'a [String],
    artifacts: usize,
}

fn find_backup_in(store: &BackupStore, name: Option<&str>) -> Result<BackupDescriptor, AppError> {
    match name {
        Some(name) => Ok(store.find(name)?),
        None => store.most_recent()?.ok_or_else(|| AppError::NoBackups {
            root: store.root().display().to_string(),
        }),
    }
}

/// Detected tools to back up. With no selection every detected tool that has
/// a catalog entry is taken; selected tools that were not detected are still
/// backed up when the catalog knows them.
fn select_tools(
    catalog: &Catalog,
    detected: &DetectionCache,
    selected: &[String],
) -> Result<Vec<DetectedTool>, AppError> {
    if selected.is_empty() {
        return Ok(detected
            .tools
            .iter()
            .filter(|tool| catalog.lookup(&tool.name).is_some())
            .cloned()
            .collect());
    }

    let mut tools = Vec::with_capacity(selected.len());
    let mut unknown = Vec::new();
    for name in selected {
        if let Some(tool) = detected.find(name) {
            tools.push(tool.clone());
        } else if let Some(entry) = catalog.lookup(name) {
            tools.push(DetectedTool::new(entry.display_name.as_str(), "", ""));
        } else {
            unknown.push(name.clone());
        }
    }

    if unknown.is_empty() {
        Ok(tools)
    } else {
        Err(AppError::UnknownTools { names: unknown })
    }
}

/// One session item per backed-up tool, in manifest order. Only missing tools
/// get an install plan.
fn session_items(
    manifest: &Manifest,
    result: &ReconciliationResult,
    selected: &[String],
    no_install: bool,
) -> Result<Vec<SessionItem>, AppError> {
    let unknown: Vec<String> = selected
        .iter()
        .filter(|name| manifest.tool(name).is_none())
        .cloned()
        .collect();
    if !unknown.is_empty() {
        return Err(AppError::UnknownTools { names: unknown });
    }

    let items = manifest
        .tools
        .iter()
        .filter(|entry| {
            selected.is_empty() || selected.iter().any(|n| n.eq_ignore_ascii_case(&entry.name))
        })
        .map(|entry| {
            let plan = if no_install {
                None
            } else {
                result
                    .missing
                    .iter()
                    .find(|missing| missing.name == entry.name)
                    .map(|missing| missing.plan.clone())
            };
            SessionItem {
                entry: entry.clone(),
                plan,
            }
        })
        .collect();
    Ok(items)
}
