use std::fs;
use std::path::{Path, PathBuf};

use content::{ContentBase, LocatorError, LocatorSettings};
use serde::{Deserialize, Serialize};

/// Contents of the TOML configuration file. Every key is optional; command
/// line flags take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub debug: bool,

    /// Fileless backup to read. Relative paths are taken from
    /// `source_backup_directory`.
    pub source_backup_file: Option<PathBuf>,
    /// Where the hydrated backup goes. Relative paths are taken from
    /// `destination_backup_directory`.
    pub destination_backup_file: Option<PathBuf>,

    /// Without `source_backup_file`, every backup in here is hydrated into
    /// `destination_backup_directory`.
    pub source_backup_directory: Option<PathBuf>,
    pub destination_backup_directory: Option<PathBuf>,

    /// Local `filedir`, `http(s)://` base URL or `s3://bucket[/prefix]`
    pub content_base: Option<String>,
    pub s3_region: Option<String>,
    pub s3_assume_role_arn: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Layer `overrides` on top of `self`. Unset or empty values in
    /// `overrides` keep the current value.
    pub fn merge(self, overrides: FileConfig) -> Self {
        Self {
            debug: self.debug || overrides.debug,
            source_backup_file: pick(overrides.source_backup_file, self.source_backup_file),
            destination_backup_file: pick(
                overrides.destination_backup_file,
                self.destination_backup_file,
            ),
            source_backup_directory: pick(
                overrides.source_backup_directory,
                self.source_backup_directory,
            ),
            destination_backup_directory: pick(
                overrides.destination_backup_directory,
                self.destination_backup_directory,
            ),
            content_base: pick(overrides.content_base, self.content_base),
            s3_region: pick(overrides.s3_region, self.s3_region),
            s3_assume_role_arn: pick(overrides.s3_assume_role_arn, self.s3_assume_role_arn),
        }
    }

    /// Validate and turn into the settings a run needs.
    pub fn resolve(self) -> Result<Settings, ConfigError> {
        let source_dir = set(self.source_backup_directory);
        let dest_dir = set(self.destination_backup_directory);

        if let Some(dir) = &source_dir {
            require_dir("sourcedir", dir)?;
        }
        if let Some(dir) = &dest_dir {
            require_dir("destdir", dir)?;
        }

        let source = set(self.source_backup_file).map(|file| under(source_dir.as_deref(), file));
        let dest = set(self.destination_backup_file).map(|file| under(dest_dir.as_deref(), file));

        let job = match (source, source_dir) {
            (Some(source), _) => {
                let meta = fs::metadata(&source).map_err(|e| ConfigError::Stat {
                    what: "source",
                    path: source.clone(),
                    source: e,
                })?;
                if !meta.is_file() {
                    return Err(ConfigError::NotAFile(source));
                }
                let dest = match (dest, &dest_dir, source.file_name()) {
                    (Some(dest), _, _) => dest,
                    (None, Some(dir), Some(name)) => dir.join(name),
                    _ => return Err(ConfigError::MissingDestination),
                };
                Job::Single { source, dest }
            }
            (None, Some(source_dir)) => {
                let dest_dir = dest_dir.ok_or(ConfigError::MissingDestinationDir)?;
                Job::Batch {
                    source_dir,
                    dest_dir,
                }
            }
            (None, None) => return Err(ConfigError::MissingSource),
        };

        let raw_base = set(self.content_base).ok_or(ConfigError::MissingContentBase)?;
        let content_base: ContentBase = raw_base.parse()?;
        if let ContentBase::Local(root) = &content_base {
            require_dir("contentbase", root)?;
        }

        Ok(Settings {
            debug: self.debug,
            job,
            content_base,
            locator: LocatorSettings {
                s3_region: set(self.s3_region),
                s3_assume_role_arn: set(self.s3_assume_role_arn),
                ..LocatorSettings::default()
            },
        })
    }
}

/// What to hydrate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    Single { source: PathBuf, dest: PathBuf },
    Batch { source_dir: PathBuf, dest_dir: PathBuf },
}

/// Validated configuration for one invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub debug: bool,
    pub job: Job,
    pub content_base: ContentBase,
    pub locator: LocatorSettings,
}

impl Settings {
    pub fn log(&self) {
        tracing::debug!(debug = self.debug, job = ?self.job, "job");
        tracing::debug!(content_base = %self.content_base, "content");
        tracing::debug!(
            s3_region = ?self.locator.s3_region,
            s3_assume_role_arn = ?self.locator.s3_assume_role_arn,
            "s3"
        );
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{what} {path}: {source}")]
    Stat {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{what} '{path}' is not a directory")]
    NotADirectory { what: &'static str, path: PathBuf },

    #[error("source '{0}' is not a file")]
    NotAFile(PathBuf),

    #[error("at least one of source and sourcedir must be specified")]
    MissingSource,

    #[error("a destination file or destdir must be provided")]
    MissingDestination,

    #[error("destination directory must be provided when filling multiple files")]
    MissingDestinationDir,

    #[error("contentbase is required")]
    MissingContentBase,

    #[error("invalid contentbase: {0}")]
    ContentBase(#[from] LocatorError),
}

fn pick<T: IsSet>(preferred: Option<T>, fallback: Option<T>) -> Option<T> {
    set(preferred).or(fallback)
}

fn set<T: IsSet>(value: Option<T>) -> Option<T> {
    value.filter(|v| v.is_set())
}

trait IsSet {
    fn is_set(&self) -> bool;
}

impl IsSet for String {
    fn is_set(&self) -> bool {
        !self.is_empty()
    }
}

impl IsSet for PathBuf {
    fn is_set(&self) -> bool {
        !self.as_os_str().is_empty()
    }
}

fn under(dir: Option<&Path>, file: PathBuf) -> PathBuf {
    match dir {
        Some(dir) if file.is_relative() => dir.join(file),
        _ => file,
    }
}

fn require_dir(what: &'static str, path: &Path) -> Result<(), ConfigError> {
    let meta = fs::metadata(path).map_err(|source| ConfigError::Stat {
        what,
        path: path.to_path_buf(),
        source,
    })?;
    if !meta.is_dir() {
        return Err(ConfigError::NotADirectory {
            what,
            path: path.to_path_buf(),
        });
    }
    Ok(())
}
