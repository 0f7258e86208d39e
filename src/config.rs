//! Loading application configuration from the environment plus an optional TOML file.
//!
//! Environment:
//!   GEMINI_API_KEY      : required; startup fails without it
//!   GEMINI_BASE_URL     : default "https://generativelanguage.googleapis.com/v1beta"
//!   GEMINI_MODEL        : default "gemini-1.5-flash-latest"
//!   DATA_DIR            : directory with the JSON inputs/outputs (default ".")
//!   PORT                : u16 (default 3000)
//!   TRAINER_CONFIG_PATH : optional TOML file, see `FileConfig`

use std::{
  net::SocketAddr,
  path::{Path, PathBuf},
  time::Duration,
};

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";

pub const SOLUTIONS_FILE: &str = "canonical_solutions.json";
pub const RESPONSES_FILE: &str = "user_responses.json";
pub const GLOSSARY_FILE: &str = "glossary.json";

/// Fully resolved configuration used by the rest of the app.
#[derive(Clone, Debug)]
pub struct AppConfig {
  pub addr: SocketAddr,
  pub paths: Paths,
  pub gemini: GeminiConfig,
  pub scoring: ScoringConfig,
  pub autosave_interval: Duration,
  pub prompts: Prompts,
}

#[derive(Clone, Debug)]
pub struct Paths {
  pub solutions: PathBuf,
  pub responses: PathBuf,
  pub glossary: PathBuf,
}

#[derive(Clone)]
pub struct GeminiConfig {
  pub api_key: String,
  pub base_url: String,
  pub model: String,
}

// Keeps the key out of logs and panics.
impl std::fmt::Debug for GeminiConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("GeminiConfig")
      .field("api_key", &"<redacted>")
      .field("base_url", &self.base_url)
      .field("model", &self.model)
      .finish()
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoringConfig {
  /// Deadline for the whole scoring call, measured from dispatch.
  pub overall_timeout: Duration,
  /// Timeout handed to the HTTP client; never above `overall_timeout`.
  pub request_timeout: Duration,
  pub temperature: f32,
}

/// TOML file schema. Every section is optional.
#[derive(Clone, Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
  #[serde(default)] pub paths: PathsCfg,
  #[serde(default)] pub scoring: ScoringCfg,
  #[serde(default)] pub autosave: AutosaveCfg,
  #[serde(default)] pub prompts: Prompts,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PathsCfg {
  #[serde(default)] pub solutions: Option<PathBuf>,
  #[serde(default)] pub responses: Option<PathBuf>,
  #[serde(default)] pub glossary: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ScoringCfg {
  #[serde(default = "default_overall_ms")] pub overall_timeout_ms: u64,
  #[serde(default = "default_request_ms")] pub request_timeout_ms: u64,
  #[serde(default = "default_temperature")] pub temperature: f32,
}

impl Default for ScoringCfg {
  fn default() -> Self {
    Self {
      overall_timeout_ms: default_overall_ms(),
      request_timeout_ms: default_request_ms(),
      temperature: default_temperature(),
    }
  }
}

fn default_overall_ms() -> u64 { 6_500 }
fn default_request_ms() -> u64 { 6_000 }
fn default_temperature() -> f32 { 0.2 }

#[derive(Clone, Debug, Deserialize)]
pub struct AutosaveCfg {
  #[serde(default = "default_autosave_secs")] pub interval_secs: u64,
}

impl Default for AutosaveCfg {
  fn default() -> Self { Self { interval_secs: default_autosave_secs() } }
}

fn default_autosave_secs() -> u64 { 5 }

/// Prompt material sent to the model. Override in TOML to tune the rubric or wording.
///
/// `evaluation_template` placeholders: `{user_solution}`, `{canonical_solution}`,
/// `{rubric}`, `{blank_marker}`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Prompts {
  pub rubric: String,
  pub evaluation_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      rubric: DEFAULT_RUBRIC.trim().into(),
      evaluation_template: DEFAULT_EVALUATION_TEMPLATE.trim().into(),
    }
  }
}

const DEFAULT_RUBRIC: &str = r#"
**1. Requirement Analysis & Scoping:**
- 0 (Not Attempted): Blank or nonsensical answer.
- 1 (Not Acceptable): Misses basic functional or non-functional requirements.
- 2 (Needs Improvement): Some requirements, but key aspects such as scale or latency are missing.
- 3 (Acceptable): Functional and non-functional requirements are clear and the scope is reasonable.
- 4 (Exceptional): Detailed, nuanced requirements including edge cases and trade-offs.

**2. High-Level Architecture:**
- 0 (Not Attempted): Blank or nonsensical answer.
- 1 (Not Acceptable): Non-viable or overly simplistic architecture.
- 2 (Needs Improvement): Major flaws or critical components missing.
- 3 (Acceptable): Solid, workable architecture with all necessary components.
- 4 (Exceptional): Well-reasoned architecture with deliberate trade-offs and deep understanding.

**3. Component Deep-Dive:**
- 0 (Not Attempted): Blank or nonsensical answer.
- 1 (Not Acceptable): No logical breakdown into components.
- 2 (Needs Improvement): Components poorly defined or responsibilities unclear.
- 3 (Acceptable): Well-defined components with clear responsibilities.
- 4 (Exceptional): Detailed design per component, including APIs and data models.

**4. Scalability & Bottleneck Analysis:**
- 0 (Not Attempted): Blank or nonsensical answer.
- 1 (Not Acceptable): Scalability and bottlenecks not addressed.
- 2 (Needs Improvement): Some issues identified, weak or ineffective mitigations.
- 3 (Acceptable): Major bottlenecks identified with reasonable solutions.
- 4 (Exceptional): Thorough analysis with creative, effective solutions.
"#;

const DEFAULT_EVALUATION_TEMPLATE: &str = r#"
Evaluate the user's answer to a system design interview question.
Compare it with the canonical solution and score it against the rubric.
A section whose content is '{blank_marker}' was not attempted and must be scored 0.

User Solution:
{user_solution}

Canonical Solution:
{canonical_solution}

Scoring Rubric:
{rubric}

For each of the four sections give a score (0-4) and a one-paragraph justification, using exactly this format:
Requirements Score: [0-4] - [Justification]
Architecture Score: [0-4] - [Justification]
Components Score: [0-4] - [Justification]
Scalability Score: [0-4] - [Justification]

Finish with a 2-3 sentence summary of the overall score out of 16, saying whether the user did a good job and how the answer would fare in a real interview.
"#;

impl AppConfig {
  /// Resolve configuration from process env (and TRAINER_CONFIG_PATH if set).
  pub fn from_env() -> Result<Self, ConfigError> {
    let file = match std::env::var("TRAINER_CONFIG_PATH") {
      Ok(path) => {
        let cfg = load_file_config(Path::new(&path))?;
        info!(target: "sysdesign_trainer", %path, "Loaded trainer config (TOML)");
        cfg
      }
      Err(_) => FileConfig::default(),
    };

    Self::resolve(|k| std::env::var(k).ok(), file)
  }

  /// Combine an env lookup with file config. Split out so tests need not touch
  /// the real process environment.
  pub fn resolve(env: impl Fn(&str) -> Option<String>, file: FileConfig) -> Result<Self, ConfigError> {
    let api_key = env("GEMINI_API_KEY")
      .filter(|k| !k.trim().is_empty())
      .ok_or(ConfigError::MissingApiKey)?;
    let base_url = env("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into());
    let model = env("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into());

    let port = match env("PORT") {
      Some(p) => p.parse::<u16>().map_err(|_| ConfigError::Invalid(format!("PORT is not a valid port: {p}")))?,
      None => 3000,
    };
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    let data_dir = PathBuf::from(env("DATA_DIR").unwrap_or_else(|| ".".into()));
    let paths = Paths {
      solutions: file.paths.solutions.unwrap_or_else(|| data_dir.join(SOLUTIONS_FILE)),
      responses: file.paths.responses.unwrap_or_else(|| data_dir.join(RESPONSES_FILE)),
      glossary: file.paths.glossary.unwrap_or_else(|| data_dir.join(GLOSSARY_FILE)),
    };

    let scoring = scoring_from_cfg(&file.scoring)?;

    if file.autosave.interval_secs == 0 {
      return Err(ConfigError::Invalid("autosave.interval_secs must be at least 1".into()));
    }

    Ok(Self {
      addr,
      paths,
      gemini: GeminiConfig { api_key, base_url, model },
      scoring,
      autosave_interval: Duration::from_secs(file.autosave.interval_secs),
      prompts: file.prompts,
    })
  }
}

fn scoring_from_cfg(cfg: &ScoringCfg) -> Result<ScoringConfig, ConfigError> {
  if cfg.overall_timeout_ms == 0 {
    return Err(ConfigError::Invalid("scoring.overall_timeout_ms must be positive".into()));
  }
  let overall_timeout = Duration::from_millis(cfg.overall_timeout_ms);
  let mut request_timeout = Duration::from_millis(cfg.request_timeout_ms);
  if request_timeout.is_zero() || request_timeout > overall_timeout {
    warn!(
      target: "sysdesign_trainer",
      request_ms = cfg.request_timeout_ms,
      overall_ms = cfg.overall_timeout_ms,
      "Request timeout must be positive and not exceed the overall timeout; clamping"
    );
    request_timeout = overall_timeout;
  }
  Ok(ScoringConfig { overall_timeout, request_timeout, temperature: cfg.temperature })
}

pub fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
  let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
  toml::from_str::<FileConfig>(&s).map_err(|source| ConfigError::Toml { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |k| map.get(k).cloned()
  }

  #[test]
  fn missing_api_key_is_a_config_error() {
    let err = AppConfig::resolve(env_of(&[]), FileConfig::default()).unwrap_err();
    assert!(matches!(err, ConfigError::MissingApiKey));

    let err = AppConfig::resolve(env_of(&[("GEMINI_API_KEY", "  ")]), FileConfig::default()).unwrap_err();
    assert!(matches!(err, ConfigError::MissingApiKey));
  }

  #[test]
  fn defaults_follow_data_dir_and_timeouts() {
    let cfg = AppConfig::resolve(env_of(&[("GEMINI_API_KEY", "k"), ("DATA_DIR", "/tmp/sd")]), FileConfig::default()).unwrap();
    assert_eq!(cfg.paths.responses, PathBuf::from("/tmp/sd").join(RESPONSES_FILE));
    assert_eq!(cfg.scoring.overall_timeout, Duration::from_millis(6_500));
    assert!(cfg.scoring.request_timeout <= cfg.scoring.overall_timeout);
    assert_eq!(cfg.autosave_interval, Duration::from_secs(5));
    assert_eq!(cfg.gemini.model, DEFAULT_MODEL);
    assert_eq!(cfg.addr.port(), 3000);
  }

  #[test]
  fn request_timeout_is_clamped_to_overall() {
    let file: FileConfig = toml::from_str("[scoring]\noverall_timeout_ms = 6500\nrequest_timeout_ms = 10000\n").unwrap();
    let cfg = AppConfig::resolve(env_of(&[("GEMINI_API_KEY", "k")]), file).unwrap();
    assert_eq!(cfg.scoring.request_timeout, Duration::from_millis(6_500));
  }

  #[test]
  fn zero_autosave_interval_is_rejected() {
    let file: FileConfig = toml::from_str("[autosave]\ninterval_secs = 0\n").unwrap();
    let err = AppConfig::resolve(env_of(&[("GEMINI_API_KEY", "k")]), file).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
  }

  #[test]
  fn toml_prompts_override_only_what_they_name() {
    let file: FileConfig = toml::from_str("[prompts]\nrubric = \"be kind\"\n").unwrap();
    assert_eq!(file.prompts.rubric, "be kind");
    assert_eq!(file.prompts.evaluation_template, Prompts::default().evaluation_template);
  }

  #[test]
  fn bad_port_and_bad_toml_are_reported() {
    let err = AppConfig::resolve(env_of(&[("GEMINI_API_KEY", "k"), ("PORT", "http")]), FileConfig::default()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trainer.toml");
    std::fs::write(&path, "[scoring\n").unwrap();
    assert!(matches!(load_file_config(&path), Err(ConfigError::Toml { .. })));
    assert!(matches!(load_file_config(&dir.path().join("absent.toml")), Err(ConfigError::Read { .. })));
  }

  #[test]
  fn debug_output_redacts_api_key() {
    let cfg = GeminiConfig { api_key: "secret-key".into(), base_url: "u".into(), model: "m".into() };
    assert!(!format!("{cfg:?}").contains("secret-key"));
  }
}
