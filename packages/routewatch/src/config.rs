use anyhow::{Context, Result};
use console_mux::input::InputMode;
use console_mux::log_sink::DEFAULT_LOG_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// =============================================================================
// Tunable config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
// Three equivalent ways to configure:
//
//   config.toml:     [endpoint]
//                    host = "10.0.0.5:8000"
//
//   env var:         ROUTEWATCH_ENDPOINT__HOST=10.0.0.5:8000   (double underscore = nesting)
//
//   (single underscore stays within field names: ROUTEWATCH_LAYOUT__PANE_MARGIN)
//
// CLI flags are applied on top of the extracted value.

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub endpoint: EndpointFileConfig,
    #[serde(default)]
    pub input: InputFileConfig,
    #[serde(default)]
    pub log: LogFileConfig,
    #[serde(default)]
    pub layout: LayoutFileConfig,
    #[serde(default)]
    pub simulator: SimulatorFileConfig,
}

/// Where the console connects (lives under `[endpoint]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EndpointFileConfig {
    /// Page origin the channel URL is derived from. `https` selects `wss`.
    #[serde(default = "default_origin")]
    pub origin: String,
    /// Replaces the origin's host, for pointing at a development backend.
    #[serde(default)]
    pub host: Option<String>,
}

impl Default for EndpointFileConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            host: None,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InputFileConfig {
    #[serde(default)]
    pub mode: InputMode,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogFileConfig {
    #[serde(default = "default_log_capacity")]
    pub capacity: usize,
}

impl Default for LogFileConfig {
    fn default() -> Self {
        Self {
            capacity: default_log_capacity(),
        }
    }
}

/// Pane split, in terminal rows.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LayoutFileConfig {
    #[serde(default = "default_pane_margin")]
    pub pane_margin: u16,
    #[serde(default = "default_initial_terminal_height")]
    pub initial_terminal_height: u16,
}

impl Default for LayoutFileConfig {
    fn default() -> Self {
        Self {
            pane_margin: default_pane_margin(),
            initial_terminal_height: default_initial_terminal_height(),
        }
    }
}

/// Development backend knobs (lives under `[simulator]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimulatorFileConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_nodes")]
    pub nodes: usize,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

impl Default for SimulatorFileConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            nodes: default_nodes(),
            tick_ms: default_tick_ms(),
        }
    }
}

fn default_origin() -> String {
    "http://localhost:8000".to_string()
}
fn default_log_capacity() -> usize {
    DEFAULT_LOG_CAPACITY
}
fn default_pane_margin() -> u16 {
    3
}
fn default_initial_terminal_height() -> u16 {
    12
}
fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_nodes() -> usize {
    5
}
fn default_tick_ms() -> u64 {
    2000
}

/// Build a figment that layers: defaults → config.toml → ROUTEWATCH_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `ROUTEWATCH_INPUT__MODE=keystroke`  →  `input.mode = "keystroke"`
///   `ROUTEWATCH_SIMULATOR__TICK_MS=500`  →  `simulator.tick_ms = 500`
pub fn load_config(data_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(data_dir.join("config.toml")))
        .merge(Env::prefixed("ROUTEWATCH_").split("__"))
}

// =============================================================================
// Directory layout (derived from --data-dir, not from figment)
// =============================================================================

#[derive(Clone, Debug)]
pub struct RouteWatchConfig {
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl RouteWatchConfig {
    pub fn new(custom_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match custom_dir {
            Some(dir) => dir,
            None => dirs::home_dir()
                .context("Could not find home directory")?
                .join(".routewatch"),
        };

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

        let logs_dir = data_dir.join("logs");
        std::fs::create_dir_all(&logs_dir)
            .with_context(|| format!("Failed to create logs directory: {:?}", logs_dir))?;

        Ok(Self { data_dir, logs_dir })
    }

    pub fn config_toml_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }

    pub fn console_log_path(&self) -> PathBuf {
        self.logs_dir.join("routewatch.log")
    }

    pub fn load(&self) -> Result<FileConfig> {
        load_config(&self.data_dir)
            .extract()
            .with_context(|| format!("Invalid configuration in {:?}", self.config_toml_path()))
    }
}
