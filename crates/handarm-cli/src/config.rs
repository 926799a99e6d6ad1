//! Controller settings – reads/writes `~/.handarm/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use handarm_hal::duty::PulseProfile;
use handarm_perception::mapper::MapperConfig;
use handarm_runtime::dispatcher::{DispatchPolicy, FailurePolicy};
use handarm_runtime::orchestrator::OrchestratorConfig;
use handarm_types::{ArmError, ChannelIdFormat, JointChannel, JointTargets};

/// Which radio backend carries the commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Ble,
    /// In-process simulated arm.
    Sim,
}

impl std::str::FromStr for Transport {
    type Err = ArmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ble" => Ok(Transport::Ble),
            "sim" => Ok(Transport::Sim),
            other => Err(ArmError::Config(format!("unknown transport '{other}'"))),
        }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Ble => write!(f, "ble"),
            Transport::Sim => write!(f, "sim"),
        }
    }
}

/// Where hand landmarks come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Simulated camera with a swept synthetic hand.
    Synthetic,
    /// One JSON landmark document per line on standard input.
    #[default]
    Stdin,
}

impl std::str::FromStr for Source {
    type Err = ArmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "synthetic" => Ok(Source::Synthetic),
            "stdin" => Ok(Source::Stdin),
            other => Err(ArmError::Config(format!("unknown source '{other}'"))),
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Synthetic => write!(f, "synthetic"),
            Source::Stdin => write!(f, "stdin"),
        }
    }
}

/// Persisted settings stored in `~/.handarm/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Advertised BLE name of the arm.
    #[serde(default = "default_device_name")]
    pub device_name: String,

    #[serde(default = "default_scan_timeout_ms")]
    pub scan_timeout_ms: u64,

    #[serde(default = "default_dispatch_interval_ms")]
    pub dispatch_interval_ms: u64,

    /// Channels sent each dispatch cycle, by name.
    #[serde(default = "default_dispatch_channels")]
    pub dispatch_channels: Vec<String>,

    #[serde(default)]
    pub channel_id_format: ChannelIdFormat,

    /// Consecutive failed sends that end the session.  Absent: never.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_failure_limit: Option<u32>,

    #[serde(default)]
    pub transport: Transport,

    #[serde(default)]
    pub source: Source,

    /// Let the synthetic hand drive a real arm over BLE.
    #[serde(default)]
    pub allow_synthetic_on_hardware: bool,

    #[serde(default = "default_grip_threshold")]
    pub grip_threshold: f32,

    #[serde(default = "default_mirror")]
    pub mirror: bool,

    // Simulated peripheral profile.
    #[serde(default = "default_pulse_min_us")]
    pub pulse_min_us: u32,
    #[serde(default = "default_pulse_max_us")]
    pub pulse_max_us: u32,
    #[serde(default = "default_pwm_frequency_hz")]
    pub pwm_frequency_hz: u32,
}

fn default_device_name() -> String {
    "mpy-uart".to_string()
}
fn default_scan_timeout_ms() -> u64 {
    5000
}
fn default_dispatch_interval_ms() -> u64 {
    20
}
fn default_dispatch_channels() -> Vec<String> {
    JointChannel::ALL.iter().map(|c| c.name().to_string()).collect()
}
fn default_grip_threshold() -> f32 {
    MapperConfig::default().grip_threshold
}
fn default_mirror() -> bool {
    true
}
fn default_pulse_min_us() -> u32 {
    500
}
fn default_pulse_max_us() -> u32 {
    2500
}
fn default_pwm_frequency_hz() -> u32 {
    50
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            scan_timeout_ms: default_scan_timeout_ms(),
            dispatch_interval_ms: default_dispatch_interval_ms(),
            dispatch_channels: default_dispatch_channels(),
            channel_id_format: ChannelIdFormat::default(),
            send_failure_limit: None,
            transport: Transport::default(),
            source: Source::default(),
            allow_synthetic_on_hardware: false,
            grip_threshold: default_grip_threshold(),
            mirror: default_mirror(),
            pulse_min_us: default_pulse_min_us(),
            pulse_max_us: default_pulse_max_us(),
            pwm_frequency_hz: default_pwm_frequency_hz(),
        }
    }
}

impl Config {
    /// Check every field that can be wrong on its own.
    pub fn validate(&self) -> Result<(), ArmError> {
        if self.device_name.trim().is_empty() {
            return Err(ArmError::Config("device_name is empty".to_string()));
        }
        if self.dispatch_interval_ms == 0 {
            return Err(ArmError::Config("dispatch_interval_ms must be non-zero".to_string()));
        }
        self.channels()?;
        if self.transport == Transport::Ble
            && self.source == Source::Synthetic
            && !self.allow_synthetic_on_hardware
        {
            return Err(ArmError::Config(
                "source 'synthetic' would drive the real arm; use transport 'sim' \
                 or set allow_synthetic_on_hardware = true"
                    .to_string(),
            ));
        }
        if !(self.grip_threshold.is_finite() && self.grip_threshold > 0.0) {
            return Err(ArmError::Config(format!(
                "grip_threshold must be a positive number, got {}",
                self.grip_threshold
            )));
        }
        self.pulse_profile()?;
        Ok(())
    }

    /// Parsed `dispatch_channels`.
    pub fn channels(&self) -> Result<Vec<JointChannel>, ArmError> {
        if self.dispatch_channels.is_empty() {
            return Err(ArmError::Config("dispatch_channels is empty".to_string()));
        }
        self.dispatch_channels
            .iter()
            .map(|name| {
                name.parse::<JointChannel>()
                    .map_err(|_| ArmError::Config(format!("unknown channel '{name}' in dispatch_channels")))
            })
            .collect()
    }

    pub fn pulse_profile(&self) -> Result<PulseProfile, ArmError> {
        PulseProfile::new(self.pulse_min_us, self.pulse_max_us, self.pwm_frequency_hz)
    }

    /// Build the orchestrator settings.  Validates first.
    pub fn orchestrator_config(&self) -> Result<OrchestratorConfig, ArmError> {
        self.validate()?;
        let dispatch = DispatchPolicy::subset(&self.channels()?, Duration::from_millis(self.dispatch_interval_ms))?;
        let failure = match self.send_failure_limit {
            Some(n) => FailurePolicy::limit(n),
            None => FailurePolicy::tolerant(),
        };
        Ok(OrchestratorConfig {
            device_name: self.device_name.clone(),
            scan_timeout: Duration::from_millis(self.scan_timeout_ms),
            channel_format: self.channel_id_format,
            dispatch,
            failure,
            mapper: MapperConfig {
                mirror: self.mirror,
                grip_threshold: self.grip_threshold,
            },
            initial_targets: JointTargets::REST_POSE,
        })
    }
}

/// Return the path to `~/.handarm/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".handarm").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, ArmError> {
    load_from(&config_path())
}

/// Load the config from a specific path.  Environment overrides are not
/// applied here.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, ArmError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| ArmError::Config(format!("failed to read {}: {e}", path.display())))?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| ArmError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply `HANDARM_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `HANDARM_DEVICE_NAME` | `device_name` |
/// | `HANDARM_SCAN_TIMEOUT_MS` | `scan_timeout_ms` |
/// | `HANDARM_DISPATCH_INTERVAL_MS` | `dispatch_interval_ms` |
/// | `HANDARM_TRANSPORT` | `transport` |
/// | `HANDARM_SOURCE` | `source` |
/// | `HANDARM_SEND_FAILURE_LIMIT` | `send_failure_limit` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

fn apply_overrides(cfg: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("HANDARM_DEVICE_NAME")
        && !v.trim().is_empty()
    {
        cfg.device_name = v.trim().to_string();
    }
    if let Some(ms) = var("HANDARM_SCAN_TIMEOUT_MS").and_then(|v| v.trim().parse().ok()) {
        cfg.scan_timeout_ms = ms;
    }
    if let Some(ms) = var("HANDARM_DISPATCH_INTERVAL_MS").and_then(|v| v.trim().parse().ok()) {
        cfg.dispatch_interval_ms = ms;
    }
    if let Some(t) = var("HANDARM_TRANSPORT").and_then(|v| v.parse().ok()) {
        cfg.transport = t;
    }
    if let Some(s) = var("HANDARM_SOURCE").and_then(|v| v.parse().ok()) {
        cfg.source = s;
    }
    if let Some(n) = var("HANDARM_SEND_FAILURE_LIMIT").and_then(|v| v.trim().parse().ok()) {
        cfg.send_failure_limit = Some(n);
    }
}

/// Save the config to disk, creating `~/.handarm/` if necessary.
pub fn save(cfg: &Config) -> Result<(), ArmError> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), ArmError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| ArmError::Config(format!("failed to create config directory: {e}")))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| ArmError::Config(format!("failed to set config directory permissions: {e}")))?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| ArmError::Config(format!("failed to serialize config: {e}")))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| ArmError::Config(format!("failed to write {}: {e}", path.display())))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(|e| ArmError::Config(format!("failed to write {}: {e}", path.display())))?;
    Ok(())
}
