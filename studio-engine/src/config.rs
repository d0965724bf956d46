//! Process-wide configuration
//!
//! Loaded once at startup: defaults, then an optional TOML file, then
//! environment overrides. The result is read-only for the life of the
//! process and is shared by reference with the dispatcher and the engines.

use crate::error::{ConfigError, Result};
use crate::worker::{self, WorkerCommand};
use serde::{Deserialize, Serialize};
use std::env;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File looked up in the working directory when no path is given
pub const CONFIG_FILE_NAME: &str = "stylesheet-studio.toml";

pub const DEFAULT_SAXON_JAR: &str = "tools/saxon/Saxon-HE-12.0.jar";
pub const DEFAULT_XMLRESOLVER_JAR: &str = "tools/saxon/xmlresolver-5.2.1.jar";
pub const DEFAULT_MAIN_CLASS: &str = "net.sf.saxon.Transform";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PRIMARY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_INPUT_CHARS: usize = 2_000_000;
pub const DEFAULT_MAX_TREE_NODES: u32 = 1_000_000;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    pub primary: PrimaryEngineConfig,
    pub secondary: SecondaryEngineConfig,
    pub limits: LimitsConfig,
}

/// How the in-process XSLT 1.0 engine is hosted.
///
/// With `isolate` set, each transform runs in a short-lived worker process
/// so a stylesheet that exhausts the stack only takes the worker down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimaryEngineConfig {
    pub isolate: bool,
    /// Worker executable; looked up next to the running executable when unset
    pub worker: Option<PathBuf>,
    /// Arguments passed to the worker before it reads its request
    pub worker_args: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for PrimaryEngineConfig {
    fn default() -> Self {
        Self {
            isolate: true,
            worker: None,
            worker_args: Vec::new(),
            timeout_secs: DEFAULT_PRIMARY_TIMEOUT_SECS,
        }
    }
}

impl PrimaryEngineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The worker to run transforms in, or `None` to run them in process
    pub fn worker_command(&self) -> Option<WorkerCommand> {
        if !self.isolate {
            return None;
        }
        let program = match &self.worker {
            Some(path) => path.clone(),
            None => worker::locate()?,
        };
        Some(WorkerCommand::new(program).with_args(self.worker_args.clone()))
    }
}

/// Availability and invocation settings for the external XSLT 2.0/3.0
/// processor (Saxon-HE run through `java`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecondaryEngineConfig {
    pub enabled: bool,
    pub saxon_jar: PathBuf,
    pub xmlresolver_jar: PathBuf,
    /// Java launcher; a bare name is looked up on `PATH`
    pub java: PathBuf,
    pub main_class: String,
    pub timeout_secs: u64,
}

impl Default for SecondaryEngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            saxon_jar: PathBuf::from(DEFAULT_SAXON_JAR),
            xmlresolver_jar: PathBuf::from(DEFAULT_XMLRESOLVER_JAR),
            java: PathBuf::from("java"),
            main_class: DEFAULT_MAIN_CLASS.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl SecondaryEngineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Platform classpath listing the Saxon jar and its resolver dependency.
    /// Relative jar paths are made absolute against the working directory,
    /// the same base the availability check uses.
    pub fn classpath(&self) -> io::Result<OsString> {
        let jars = [
            std::path::absolute(&self.saxon_jar)?,
            std::path::absolute(&self.xmlresolver_jar)?,
        ];
        env::join_paths(jars).map_err(io::Error::other)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        for path in [&mut self.saxon_jar, &mut self.xmlresolver_jar] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

/// Input and tree-size ceilings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Ceiling on xml + xslt characters, enforced by the caller
    pub max_input_chars: usize,
    /// Ceiling on parsed nodes per document, enforced by the hardened parser
    pub max_tree_nodes: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            max_tree_nodes: DEFAULT_MAX_TREE_NODES,
        }
    }
}

impl StudioConfig {
    pub fn validate(&self) -> Result<()> {
        if self.primary.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "primary.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.secondary.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "secondary.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.secondary.main_class.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "secondary.main_class must not be empty".to_string(),
            ));
        }
        if self.limits.max_tree_nodes == 0 {
            return Err(ConfigError::Invalid(
                "limits.max_tree_nodes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load the configuration.
    ///
    /// With an explicit path the file must exist. Without one,
    /// [`CONFIG_FILE_NAME`] in the working directory is used if present.
    /// Environment variables override file values.
    pub fn load(explicit: Option<&Path>) -> Result<StudioConfig> {
        let from_file = match explicit {
            Some(path) => Some(
                Self::load_from_file(path)?
                    .ok_or_else(|| ConfigError::NotFound(path.to_path_buf()))?,
            ),
            None => Self::load_from_file(Path::new(CONFIG_FILE_NAME))?,
        };

        let mut config = from_file.unwrap_or_default();
        Self::apply_env_overrides(&mut config, |key| env::var(key).ok())?;
        config.validate()?;

        tracing::debug!(
            secondary_enabled = config.secondary.enabled,
            saxon_jar = %config.secondary.saxon_jar.display(),
            timeout_secs = config.secondary.timeout_secs,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Read a TOML file. Returns `Ok(None)` when it does not exist.
    ///
    /// Relative jar paths in the file are taken relative to the file's
    /// directory.
    pub fn load_from_file(path: &Path) -> Result<Option<StudioConfig>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: StudioConfig =
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            config.secondary.resolve_relative_to(base);
            if let Some(worker) = config.primary.worker.as_mut().filter(|w| w.is_relative()) {
                *worker = base.join(&*worker);
            }
        }

        Ok(Some(config))
    }

    /// Apply overrides from `lookup` (the process environment in
    /// [`ConfigLoader::load`]).
    pub fn apply_env_overrides<F>(config: &mut StudioConfig, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("STUDIO_ISOLATE_PRIMARY") {
            config.primary.isolate = parse_flag("STUDIO_ISOLATE_PRIMARY", &value)?;
        }
        if let Some(value) = lookup("STUDIO_XRUST_WORKER") {
            config.primary.worker = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup("STUDIO_PRIMARY_TIMEOUT") {
            config.primary.timeout_secs = parse_number("STUDIO_PRIMARY_TIMEOUT", &value)?;
        }
        if let Some(value) = lookup("SAXON_ENABLED") {
            config.secondary.enabled = parse_flag("SAXON_ENABLED", &value)?;
        }
        if let Some(value) = lookup("SAXON_JAR_PATH") {
            config.secondary.saxon_jar = PathBuf::from(value);
        }
        if let Some(value) = lookup("XMLRESOLVER_JAR_PATH") {
            config.secondary.xmlresolver_jar = PathBuf::from(value);
        }
        if let Some(value) = lookup("SAXON_TIMEOUT") {
            config.secondary.timeout_secs = parse_number("SAXON_TIMEOUT", &value)?;
        }
        if let Some(value) = lookup("STUDIO_JAVA") {
            config.secondary.java = PathBuf::from(value);
        }
        if let Some(value) = lookup("STUDIO_MAX_INPUT_CHARS") {
            config.limits.max_input_chars = parse_number("STUDIO_MAX_INPUT_CHARS", &value)?;
        }
        if let Some(value) = lookup("STUDIO_MAX_TREE_NODES") {
            config.limits.max_tree_nodes = parse_number("STUDIO_MAX_TREE_NODES", &value)?;
        }
        Ok(())
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_bundled_layout() {
        let config = StudioConfig::default();
        assert!(config.secondary.enabled);
        assert_eq!(config.secondary.timeout(), Duration::from_secs(30));
        assert_eq!(config.secondary.main_class, "net.sf.saxon.Transform");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides_take_precedence() {
        let mut config = StudioConfig::default();
        ConfigLoader::apply_env_overrides(
            &mut config,
            lookup_from(&[
                ("SAXON_ENABLED", "0"),
                ("SAXON_JAR_PATH", "/opt/saxon.jar"),
                ("SAXON_TIMEOUT", "5"),
                ("STUDIO_MAX_INPUT_CHARS", "100"),
            ]),
        )
        .unwrap();
        assert!(!config.secondary.enabled);
        assert_eq!(config.secondary.saxon_jar, PathBuf::from("/opt/saxon.jar"));
        assert_eq!(config.secondary.timeout_secs, 5);
        assert_eq!(config.limits.max_input_chars, 100);
    }

    #[test]
    fn bad_env_values_are_rejected() {
        let mut config = StudioConfig::default();
        let err = ConfigLoader::apply_env_overrides(
            &mut config,
            lookup_from(&[("SAXON_TIMEOUT", "soon")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { ref key, .. } if key == "SAXON_TIMEOUT"));

        let err = ConfigLoader::apply_env_overrides(
            &mut config,
            lookup_from(&[("SAXON_ENABLED", "maybe")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn primary_isolation_settings() {
        let mut config = StudioConfig::default();
        assert!(config.primary.isolate);
        assert_eq!(config.primary.timeout(), Duration::from_secs(30));

        ConfigLoader::apply_env_overrides(
            &mut config,
            lookup_from(&[
                ("STUDIO_XRUST_WORKER", "/opt/studio/worker"),
                ("STUDIO_PRIMARY_TIMEOUT", "4"),
            ]),
        )
        .unwrap();
        let worker = config.primary.worker_command().unwrap();
        assert_eq!(worker.program, PathBuf::from("/opt/studio/worker"));
        assert_eq!(config.primary.timeout_secs, 4);

        ConfigLoader::apply_env_overrides(
            &mut config,
            lookup_from(&[("STUDIO_ISOLATE_PRIMARY", "off")]),
        )
        .unwrap();
        assert_eq!(config.primary.worker_command(), None);
    }

    #[test]
    fn classpath_entries_are_absolute() {
        let config = SecondaryEngineConfig::default();
        let classpath = config.classpath().unwrap();
        let entries: Vec<PathBuf> = env::split_paths(&classpath).collect();
        let cwd = env::current_dir().unwrap();

        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|p| p.is_absolute()));
        assert_eq!(entries[0], cwd.join(DEFAULT_SAXON_JAR));
        assert_eq!(entries[1], cwd.join(DEFAULT_XMLRESOLVER_JAR));
    }

    #[test]
    fn zero_timeout_is_invalid() {
        let mut config = StudioConfig::default();
        config.secondary.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn file_values_and_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("studio.toml");
        std::fs::write(
            &path,
            "[primary]\nworker = \"bin/worker\"\n\n[secondary]\nenabled = false\nsaxon_jar = \"jars/saxon.jar\"\ntimeout_secs = 7\n",
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap().unwrap();
        assert!(!config.secondary.enabled);
        assert_eq!(config.secondary.timeout_secs, 7);
        assert_eq!(config.secondary.saxon_jar, dir.path().join("jars/saxon.jar"));
        assert_eq!(config.primary.worker, Some(dir.path().join("bin/worker")));
        // untouched fields keep their defaults
        assert_eq!(config.limits, LimitsConfig::default());
    }

    #[test]
    fn missing_file_is_none_but_malformed_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ConfigLoader::load_from_file(&dir.path().join("absent.toml"))
            .unwrap()
            .is_none());

        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[secondary\nenabled = ").unwrap();
        assert!(matches!(
            ConfigLoader::load_from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            ConfigLoader::load(Some(&missing)),
            Err(ConfigError::NotFound(p)) if p == missing
        ));
    }
}
