//! Minimal client for a persistent `llama-cli` worker.
//!
//! This crate drives one long-lived text-generation process over its
//! stdin/stdout pipes:
//! - Lazy spawning with a fixed argument set ([`WorkerConfig`])
//! - Sentinel-framed turns ([`codec::send_turn`])
//! - Serialized access, a per-turn deadline and cancellation ([`Worker`])
//!
//! ```ignore
//! use llama::{ProcessLauncher, Worker, WorkerConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = WorkerConfig::from_env()?;
//! let worker = Worker::new(ProcessLauncher::new(config.clone()), &config);
//! let reply = worker.send("Hello", &CancellationToken::new()).await?;
//! ```

pub mod codec;
pub mod testing;
mod worker;

pub use codec::Frame;
pub use worker::{ProcessLauncher, Worker, WorkerLauncher, WorkerPipes};

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Marker the worker prints when it hands the turn back to the user.
pub const DEFAULT_SENTINEL: &str = "User:";

const DEFAULT_PROGRAM: &str = "llama-cli";
const DEFAULT_MODEL: &str = "models/model.gguf";
const DEFAULT_PROMPT_CACHE: &str = "cache.bin";
const DEFAULT_TURN_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors that can occur while talking to the worker.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to spawn worker `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("worker pipe broken: {0}")]
    PipeBroken(#[from] std::io::Error),

    #[error("worker did not finish its turn within {0:?}")]
    Timeout(Duration),

    #[error("turn cancelled")]
    Cancelled,

    #[error("worker closed its output without responding")]
    WorkerExited,

    #[error("invalid value for {var}: {value:?}")]
    Config { var: &'static str, value: String },
}

/// How to launch the worker and frame its turns.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Path to the `llama-cli` executable.
    pub program: PathBuf,

    /// Path to the model file.
    pub model: PathBuf,

    /// Decoding temperature.
    pub temperature: f32,

    /// Context window size in tokens.
    pub ctx_size: u32,

    /// CPU threads used by the worker.
    pub threads: u32,

    /// Maximum tokens generated per turn.
    pub max_tokens: u32,

    /// Prompt/state cache file kept warm between turns.
    pub prompt_cache: PathBuf,

    /// Output line that ends a turn.
    pub sentinel: String,

    /// Deadline for one write+read exchange. `None` waits forever.
    pub turn_timeout: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            model: PathBuf::from(DEFAULT_MODEL),
            temperature: 0.7,
            ctx_size: 512,
            threads: 2,
            max_tokens: 20,
            prompt_cache: PathBuf::from(DEFAULT_PROMPT_CACHE),
            sentinel: DEFAULT_SENTINEL.to_string(),
            turn_timeout: Some(DEFAULT_TURN_TIMEOUT),
        }
    }
}

impl WorkerConfig {
    /// Build a config from `TAVERN_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config = Self::default();

        if let Some(program) = lookup("TAVERN_LLAMA_CLI") {
            config.program = program.into();
        }
        if let Some(model) = lookup("TAVERN_MODEL") {
            config.model = model.into();
        }
        if let Some(cache) = lookup("TAVERN_PROMPT_CACHE") {
            config.prompt_cache = cache.into();
        }
        if let Some(value) = lookup("TAVERN_TEMPERATURE") {
            config.temperature = parse_var("TAVERN_TEMPERATURE", value)?;
        }
        if let Some(value) = lookup("TAVERN_CTX_SIZE") {
            config.ctx_size = parse_var("TAVERN_CTX_SIZE", value)?;
        }
        if let Some(value) = lookup("TAVERN_THREADS") {
            config.threads = parse_var("TAVERN_THREADS", value)?;
        }
        if let Some(value) = lookup("TAVERN_MAX_TOKENS") {
            config.max_tokens = parse_var("TAVERN_MAX_TOKENS", value)?;
        }
        if let Some(value) = lookup("TAVERN_TURN_TIMEOUT_SECS") {
            let secs: u64 = parse_var("TAVERN_TURN_TIMEOUT_SECS", value)?;
            config.turn_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Set the worker executable.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Set the model file.
    pub fn with_model(mut self, model: impl Into<PathBuf>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the decoding temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the context window size.
    pub fn with_ctx_size(mut self, ctx_size: u32) -> Self {
        self.ctx_size = ctx_size;
        self
    }

    /// Set the worker thread count.
    pub fn with_threads(mut self, threads: u32) -> Self {
        self.threads = threads;
        self
    }

    /// Set the per-turn token cap.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the prompt cache file.
    pub fn with_prompt_cache(mut self, path: impl Into<PathBuf>) -> Self {
        self.prompt_cache = path.into();
        self
    }

    /// Set the end-of-turn sentinel.
    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    /// Set the turn deadline.
    pub fn with_turn_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.turn_timeout = timeout;
        self
    }

    /// Command-line arguments passed to the worker, excluding the program.
    pub fn args(&self) -> Vec<String> {
        vec![
            "-m".to_string(),
            self.model.display().to_string(),
            "--temp".to_string(),
            self.temperature.to_string(),
            "--ctx-size".to_string(),
            self.ctx_size.to_string(),
            "--threads".to_string(),
            self.threads.to_string(),
            "-n".to_string(),
            self.max_tokens.to_string(),
            "--interactive".to_string(),
            "--prompt-cache".to_string(),
            self.prompt_cache.display().to_string(),
        ]
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, Error> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config { var, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn test_default_args() {
        let config = WorkerConfig::default().with_model("/models/tiny.gguf");
        assert_eq!(
            config.args(),
            vec![
                "-m",
                "/models/tiny.gguf",
                "--temp",
                "0.7",
                "--ctx-size",
                "512",
                "--threads",
                "2",
                "-n",
                "20",
                "--interactive",
                "--prompt-cache",
                "cache.bin",
            ]
        );
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = WorkerConfig::from_lookup(lookup(&[
            ("TAVERN_LLAMA_CLI", "/opt/llama/llama-cli"),
            ("TAVERN_THREADS", "8"),
            ("TAVERN_TURN_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.program, PathBuf::from("/opt/llama/llama-cli"));
        assert_eq!(config.threads, 8);
        assert_eq!(config.turn_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.ctx_size, 512);
    }

    #[test]
    fn test_zero_timeout_disables_deadline() {
        let config =
            WorkerConfig::from_lookup(lookup(&[("TAVERN_TURN_TIMEOUT_SECS", "0")])).unwrap();
        assert_eq!(config.turn_timeout, None);
    }

    #[test]
    fn test_invalid_number_names_variable() {
        let err = WorkerConfig::from_lookup(lookup(&[("TAVERN_CTX_SIZE", "lots")])).unwrap_err();
        match err {
            Error::Config { var, value } => {
                assert_eq!(var, "TAVERN_CTX_SIZE");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
