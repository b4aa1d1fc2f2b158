//! Configuration for the earshot pipeline.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (EARSHOT_MEDIA_ROOT, EARSHOT_STATE_DIR, ...)
//! 2. Config file (earshot.yaml)
//! 3. Defaults (~/.earshot, ./media)
//!
//! Config file discovery searches the current directory and its parents for
//! `earshot.yaml`; relative paths in the file resolve against the file's
//! parent directory. The resolved [`Config`] is a plain value handed to each
//! component's constructor. There is no process-wide cached settings object.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Default audio chunk length submitted to the ASR service, in seconds.
pub const DEFAULT_CHUNK_SECONDS: f64 = 30.0;

/// Default embedding dimensionality.
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub watcher: WatcherSection,
    #[serde(default)]
    pub transcription: TranscriptionSection,
    #[serde(default)]
    pub embedding: EmbeddingSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsSection {
    /// Watched media root (relative to config file)
    pub media_root: Option<String>,
    /// Pipeline state directory: media log, vector index (relative to config file)
    pub state_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WatcherSection {
    pub settle_delay_secs: Option<u64>,
    pub extensions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranscriptionSection {
    pub chunk_seconds: Option<f64>,
    pub asr_url: Option<String>,
    pub asr_model: Option<String>,
    pub language: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmbeddingSection {
    pub url: Option<String>,
    pub model: Option<String>,
    pub dimension: Option<usize>,
    pub timeout_secs: Option<u64>,
}

/// Resolved configuration with absolute paths and defaults applied.
#[derive(Debug, Clone)]
pub struct Config {
    /// Watched media root (recursive)
    pub media_root: PathBuf,

    /// State directory: media event log, vector index, lock file
    pub state_dir: PathBuf,

    /// Seconds to wait after detection before processing a file
    pub settle_delay_secs: u64,

    /// Supported media extensions (lowercase, no leading dot)
    pub extensions: Vec<String>,

    /// Audio chunk length in seconds
    pub chunk_seconds: f64,

    /// ASR service endpoint
    pub asr_url: String,

    /// ASR model identifier, recorded on transcriptions
    pub asr_model: String,

    /// Declared transcript language
    pub language: String,

    /// Per-chunk ASR call timeout
    pub asr_timeout_secs: u64,

    /// Embedding service endpoint
    pub embedding_url: String,

    /// Embedding model identifier
    pub embedding_model: String,

    /// Embedding dimensionality
    pub embedding_dimension: usize,

    /// Per-call embedding timeout
    pub embedding_timeout_secs: u64,

    /// Path to the config file the values came from (if any)
    pub config_file: Option<PathBuf>,
}

impl Config {
    /// Supported extensions when none are configured.
    pub fn default_extensions() -> Vec<String> {
        ["mp3", "wav", "flac", "ogg", "m4a", "mp4", "avi", "mov", "wmv", "mkv"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Path of the media store event log.
    pub fn media_log_path(&self) -> PathBuf {
        self.state_dir.join("media.jsonl")
    }

    /// Path of the vector index database.
    pub fn vector_index_path(&self) -> PathBuf {
        self.state_dir.join("vectors.db")
    }

    /// Path of the writer lock file.
    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.join(".lock")
    }
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let state_dir = home.join(".earshot");
        Self {
            media_root: state_dir.join("media"),
            state_dir,
            settle_delay_secs: 2,
            extensions: Self::default_extensions(),
            chunk_seconds: DEFAULT_CHUNK_SECONDS,
            asr_url: "http://localhost:8080/v1/audio/transcriptions".to_string(),
            asr_model: "whisper-base".to_string(),
            language: "en".to_string(),
            asr_timeout_secs: 120,
            embedding_url: "http://localhost:8081/v1/embeddings".to_string(),
            embedding_model: "all-MiniLM-L6-v2".to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            embedding_timeout_secs: 30,
            config_file: None,
        }
    }
}

/// Find `earshot.yaml` by searching the current directory and parents.
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join("earshot.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse a config file.
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent.
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path_str)
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var(var).ok().map(PathBuf::from)
}

/// Load configuration from all sources.
pub fn load() -> Result<Config> {
    let config_file = find_config_file();
    load_from(config_file)
}

/// Load configuration from a specific file (or defaults when `None`),
/// applying environment overrides on top.
pub fn load_from(config_file: Option<PathBuf>) -> Result<Config> {
    let mut config = Config::default();

    if let Some(ref path) = config_file {
        let file = load_config_file(path)?;
        let base = path.parent().unwrap_or(Path::new("."));

        if let Some(ref root) = file.paths.media_root {
            config.media_root = resolve_path(base, root);
        }
        if let Some(ref state) = file.paths.state_dir {
            config.state_dir = resolve_path(base, state);
        }
        if let Some(delay) = file.watcher.settle_delay_secs {
            config.settle_delay_secs = delay;
        }
        if let Some(ref exts) = file.watcher.extensions {
            config.extensions = exts.iter().map(|e| e.to_lowercase()).collect();
        }
        if let Some(chunk) = file.transcription.chunk_seconds {
            config.chunk_seconds = chunk;
        }
        if let Some(ref url) = file.transcription.asr_url {
            config.asr_url = url.clone();
        }
        if let Some(ref model) = file.transcription.asr_model {
            config.asr_model = model.clone();
        }
        if let Some(ref language) = file.transcription.language {
            config.language = language.clone();
        }
        if let Some(timeout) = file.transcription.timeout_secs {
            config.asr_timeout_secs = timeout;
        }
        if let Some(ref url) = file.embedding.url {
            config.embedding_url = url.clone();
        }
        if let Some(ref model) = file.embedding.model {
            config.embedding_model = model.clone();
        }
        if let Some(dimension) = file.embedding.dimension {
            config.embedding_dimension = dimension;
        }
        if let Some(timeout) = file.embedding.timeout_secs {
            config.embedding_timeout_secs = timeout;
        }
    }

    // Environment overrides
    if let Some(root) = env_path("EARSHOT_MEDIA_ROOT") {
        config.media_root = root;
    }
    if let Some(state) = env_path("EARSHOT_STATE_DIR") {
        config.state_dir = state;
    }
    if let Ok(url) = std::env::var("EARSHOT_ASR_URL") {
        config.asr_url = url;
    }
    if let Ok(url) = std::env::var("EARSHOT_EMBEDDING_URL") {
        config.embedding_url = url;
    }

    config.config_file = config_file;
    Ok(config)
}
