use std::{
    env,
    ffi::OsString,
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use worker_channel::{
    WorkerConfig, DEFAULT_RUNTIME_DIR, DEFAULT_WORKER_SCRIPT, WORKER_EXECUTABLE_ENV,
    WORKER_RUNTIME_DIR_ENV, WORKER_SCRIPT_ENV,
};

pub const DEFAULT_PROJECT_NAME: &str = "My Building Project";
pub const DEFAULT_SITE_NAME: &str = "my_site";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Settings read from the `ifc-convert` TOML file.
///
/// ```toml
/// [worker]
/// runtime_dir = "conda_env"
/// script = "mainPython/main.py"
/// request_timeout_ms = 600000
///
/// [project]
/// project_name = "My Building Project"
/// site_name = "my_site"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    pub worker: WorkerSection,
    pub project: ProjectSettings,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSection {
    pub runtime_dir: PathBuf,
    pub script: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
    pub mirror_stderr: bool,
}

impl Default for WorkerSection {
    fn default() -> Self {
        Self {
            runtime_dir: PathBuf::from(DEFAULT_RUNTIME_DIR),
            script: PathBuf::from(DEFAULT_WORKER_SCRIPT),
            executable: None,
            request_timeout_ms: None,
            mirror_stderr: false,
        }
    }
}

/// Header values sent with every conversion request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    pub project_name: String,
    pub site_name: String,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            project_name: DEFAULT_PROJECT_NAME.to_string(),
            site_name: DEFAULT_SITE_NAME.to_string(),
        }
    }
}

impl ConverterConfig {
    pub fn from_toml_str(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(path, &contents)
    }

    /// Defaults, then the file at `path` if given, then `IFC_WORKER_*`
    /// environment overrides.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| env::var_os(key));
        Ok(config)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<OsString>) {
        if let Some(dir) = lookup(WORKER_RUNTIME_DIR_ENV) {
            self.worker.runtime_dir = PathBuf::from(dir);
        }
        if let Some(script) = lookup(WORKER_SCRIPT_ENV) {
            self.worker.script = PathBuf::from(script);
        }
        if let Some(executable) = lookup(WORKER_EXECUTABLE_ENV) {
            self.worker.executable = Some(PathBuf::from(executable));
        }
    }

    pub fn worker_config(&self) -> WorkerConfig {
        let section = &self.worker;
        let mut builder = WorkerConfig::builder()
            .runtime_dir(&section.runtime_dir)
            .script(&section.script)
            .mirror_stderr(section.mirror_stderr);
        if let Some(executable) = &section.executable {
            builder = builder.executable(executable);
        }
        if let Some(ms) = section.request_timeout_ms {
            builder = builder.request_timeout(Duration::from_millis(ms));
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = ConverterConfig::from_toml_str(Path::new("ifc.toml"), "").unwrap();
        assert_eq!(config, ConverterConfig::default());
        assert_eq!(config.project.project_name, "My Building Project");
        assert_eq!(config.project.site_name, "my_site");
        assert_eq!(config.worker.script, PathBuf::from("mainPython/main.py"));
        assert_eq!(config.worker_config().request_timeout, None);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = ConverterConfig::from_toml_str(
            Path::new("ifc.toml"),
            r#"
[worker]
executable = "/usr/bin/python3"
request_timeout_ms = 1500

[project]
site_name = "north campus"
"#,
        )
        .unwrap();

        assert_eq!(config.project.project_name, DEFAULT_PROJECT_NAME);
        assert_eq!(config.project.site_name, "north campus");

        let worker = config.worker_config();
        assert_eq!(worker.executable_path(), PathBuf::from("/usr/bin/python3"));
        assert_eq!(worker.request_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(worker.script, PathBuf::from(DEFAULT_WORKER_SCRIPT));
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut config = ConverterConfig::from_toml_str(
            Path::new("ifc.toml"),
            "[worker]\nruntime_dir = \"/from/file\"\nscript = \"file.py\"\n",
        )
        .unwrap();
        let env: HashMap<&str, OsString> = HashMap::from([
            (WORKER_RUNTIME_DIR_ENV, OsString::from("/from/env")),
            (WORKER_EXECUTABLE_ENV, OsString::from("/env/python")),
        ]);
        config.apply_env(|key| env.get(key).cloned());

        assert_eq!(config.worker.runtime_dir, PathBuf::from("/from/env"));
        assert_eq!(config.worker.script, PathBuf::from("file.py"));
        assert_eq!(config.worker.executable, Some(PathBuf::from("/env/python")));
    }

    #[test]
    fn bad_toml_names_the_file() {
        let err = ConverterConfig::from_toml_str(Path::new("broken.toml"), "[worker\n").unwrap_err();
        assert!(err.to_string().starts_with("failed to parse broken.toml"));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConverterConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
