use std::path::PathBuf;

use clap::Args;

use backup_filler::config::{ConfigError, FileConfig, Job};
use backup_filler::hydrate::{log_report, HydrateError, Hydrator};
use backup_filler::logging::init_logging;
use content::LocatorError;

#[derive(Args, Debug, Clone)]
pub struct Hydrate {
    /// TOML configuration file; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Fileless backup to hydrate
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Output file for the hydrated backup
    #[arg(long)]
    pub dest: Option<PathBuf>,

    /// Hydrate every backup in this directory (when --source is not given)
    #[arg(long)]
    pub sourcedir: Option<PathBuf>,

    /// Directory hydrated backups are written to
    #[arg(long)]
    pub destdir: Option<PathBuf>,

    /// Local filedir, http(s):// URL or s3://bucket[/prefix]
    #[arg(long)]
    pub content_base: Option<String>,

    #[arg(long)]
    pub s3_region: Option<String>,

    /// Role to assume for bucket access
    #[arg(long)]
    pub s3_assume_role_arn: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Log as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

impl Hydrate {
    fn overrides(&self) -> FileConfig {
        FileConfig {
            debug: self.debug,
            source_backup_file: self.source.clone(),
            destination_backup_file: self.dest.clone(),
            source_backup_directory: self.sourcedir.clone(),
            destination_backup_directory: self.destdir.clone(),
            content_base: self.content_base.clone(),
            s3_region: self.s3_region.clone(),
            s3_assume_role_arn: self.s3_assume_role_arn.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HydrateOpError {
    #[error("configuration failed validation checks: {0}")]
    Config(#[from] ConfigError),

    #[error("unable to set up content source: {0}")]
    Locator(#[from] LocatorError),

    #[error(transparent)]
    Hydrate(#[from] HydrateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Hydrate {
    type Error = HydrateOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let file = match &self.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        let merged = file.merge(self.overrides());

        let _guard = init_logging(merged.debug, self.log_json);
        if let Some(path) = &self.config {
            tracing::info!(path = %path.display(), "loaded configuration file");
        }

        let settings = merged.resolve()?;
        settings.log();

        let locator = settings.content_base.build(settings.locator.clone())?;
        let hydrator = Hydrator::new(locator, ctx.runtime.clone());
        let job = settings.job;

        let output = tokio::task::spawn_blocking(move || run(&hydrator, job))
            .await
            .map_err(HydrateError::from)??;
        Ok(output)
    }
}

fn run(hydrator: &Hydrator, job: Job) -> Result<String, HydrateError> {
    match job {
        Job::Single { source, dest } => {
            let report = hydrator.hydrate(&source, &dest)?;
            log_report(&source, &report);
            let manifest = report.manifest.unwrap_or_default();
            Ok(format!(
                "hydrated {} -> {} ({} files injected, {} missing)",
                source.display(),
                dest.display(),
                manifest.injected,
                manifest.missing
            ))
        }
        Job::Batch {
            source_dir,
            dest_dir,
        } => {
            let batch = hydrator.hydrate_dir(&source_dir, &dest_dir)?;
            Ok(format!(
                "hydrated {} backups into {} ({} already present)",
                batch.hydrated.len(),
                dest_dir.display(),
                batch.skipped.len()
            ))
        }
    }
}
