use crate::error::{Result, SpecsheetError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Externally reachable base URL, used to derive OAuth redirect URIs.
    #[serde(default)]
    pub public_url: Option<String>,
    /// CORS allow-list. `*` allows any origin (without credentials).
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_max_idea_chars")]
    pub max_idea_chars: usize,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:8080".to_string(),
    ]
}

fn default_max_idea_chars() -> usize {
    10_000
}

fn default_max_body_bytes() -> usize {
    5 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            public_url: None,
            allowed_origins: default_allowed_origins(),
            max_idea_chars: default_max_idea_chars(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    pub fn public_url(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.port))
            .trim_end_matches('/')
            .to_string()
    }
}

// ---------------------------------------------------------------------------
// GenerationSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_streaming")]
    pub streaming: bool,
    /// Enables the Secret Manager fallback for the API key.
    #[serde(default)]
    pub gcp_project_id: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_streaming() -> bool {
    true
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_output_tokens() -> u32 {
    8192
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            streaming: default_streaming(),
            gcp_project_id: None,
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

// ---------------------------------------------------------------------------
// Provider sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Public web API key of the identity project. Used server-side to
    /// verify ID tokens and handed to the browser for sign-in.
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_index_name")]
    pub index_name: String,
    #[serde(default = "default_hits_per_page")]
    pub hits_per_page: usize,
}

fn default_index_name() -> String {
    "specs".to_string()
}

fn default_hits_per_page() -> usize {
    20
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            app_id: None,
            api_key: None,
            index_name: default_index_name(),
            hits_per_page: default_hits_per_page(),
        }
    }
}

impl SearchConfig {
    pub fn algolia_enabled(&self) -> bool {
        is_set(&self.app_id) && is_set(&self.api_key)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
}

impl EmailConfig {
    pub fn oauth_enabled(&self) -> bool {
        is_set(&self.client_id) && is_set(&self.client_secret)
    }

    pub fn redirect_uri(&self, public_url: &str) -> String {
        self.redirect_uri
            .clone()
            .unwrap_or_else(|| format!("{public_url}/api/email-callback"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    #[serde(default = "default_folder_name")]
    pub folder_name: String,
    #[serde(default)]
    pub public: bool,
    /// OAuth callback for the storage grant; defaults to
    /// `{public_url}/api/drive-callback`.
    #[serde(default)]
    pub redirect_uri: Option<String>,
}

impl DriveConfig {
    pub fn redirect_uri(&self, public_url: &str) -> String {
        self.redirect_uri
            .clone()
            .unwrap_or_else(|| format!("{public_url}/api/drive-callback"))
    }
}

fn default_folder_name() -> String {
    "Specsheet Generator".to_string()
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            folder_name: default_folder_name(),
            public: false,
            redirect_uri: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    Redb,
}

impl std::str::FromStr for StoreBackend {
    type Err = SpecsheetError;
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "redb" => Ok(StoreBackend::Redb),
            other => Err(SpecsheetError::Configuration(format!(
                "unknown store backend '{other}' (expected memory or redb)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl StoreConfig {
    /// Location of the redb file: `<data_dir>/specs.redb`, defaulting to the
    /// platform data directory.
    pub fn redb_path(&self) -> Result<PathBuf> {
        let dir = match &self.data_dir {
            Some(d) => d.clone(),
            None => dirs::data_dir()
                .map(|d| d.join("specsheet"))
                .ok_or_else(|| {
                    SpecsheetError::Configuration(
                        "no data directory; set SPECSHEET_DATA_DIR".into(),
                    )
                })?,
        };
        Ok(dir.join("specs.redb"))
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub generation: GenerationSettings,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub drive: DriveConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl Config {
    /// Read a YAML file, or start from defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => {
                let data = std::fs::read_to_string(p)?;
                Ok(serde_yaml::from_str(&data)?)
            }
            None => Ok(Self::default()),
        }
    }

    /// [`Config::load`] followed by [`Config::apply_env`] with the process environment.
    pub fn load_with_env(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env(|k| std::env::var(k).ok())?;
        Ok(config)
    }

    /// Overlay environment variables. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SPECSHEET_PORT") {
            self.server.port = v.trim().parse().map_err(|_| {
                SpecsheetError::Configuration(format!("SPECSHEET_PORT is not a port: '{v}'"))
            })?;
        }
        if let Some(v) = get("PUBLIC_URL") {
            self.server.public_url = Some(v);
        }
        if let Some(v) = get("ALLOWED_ORIGINS") {
            self.server.allowed_origins = v
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }

        if let Some(v) = get("GEMINI_MODEL") {
            self.generation.model = v;
        }
        if let Some(v) = get("GEMINI_STREAMING") {
            self.generation.streaming = parse_bool(&v);
        }
        if let Some(v) = get("GCP_PROJECT_ID") {
            self.generation.gcp_project_id = Some(v);
        }

        if let Some(v) = get("FIREBASE_API_KEY") {
            self.identity.api_key = Some(v);
        }

        if let Some(v) = get("ALGOLIA_APP_ID") {
            self.search.app_id = Some(v);
        }
        if let Some(v) = get("ALGOLIA_API_KEY") {
            self.search.api_key = Some(v);
        }
        if let Some(v) = get("ALGOLIA_INDEX_NAME") {
            self.search.index_name = v;
        }

        if let Some(v) = get("GMAIL_CLIENT_ID") {
            self.email.client_id = Some(v);
        }
        if let Some(v) = get("GMAIL_CLIENT_SECRET") {
            self.email.client_secret = Some(v);
        }
        if let Some(v) = get("GMAIL_REDIRECT_URI") {
            self.email.redirect_uri = Some(v);
        }

        if let Some(v) = get("DRIVE_FOLDER_NAME") {
            self.drive.folder_name = v;
        }
        if let Some(v) = get("DRIVE_PUBLIC") {
            self.drive.public = parse_bool(&v);
        }
        if let Some(v) = get("DRIVE_REDIRECT_URI") {
            self.drive.redirect_uri = Some(v);
        }

        if let Some(v) = get("SPECSHEET_STORE") {
            self.store.backend = v.parse()?;
        }
        if let Some(v) = get("SPECSHEET_DATA_DIR") {
            self.store.data_dir = Some(PathBuf::from(v));
        }
        Ok(())
    }

    /// Validate the config and return a list of warnings (non-fatal).
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if !is_set(&self.identity.api_key) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "FIREBASE_API_KEY is not set: every authenticated endpoint will return 401"
                    .into(),
            });
        }

        if !self.search.algolia_enabled() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "ALGOLIA_APP_ID / ALGOLIA_API_KEY not set: using the in-process search index"
                    .into(),
            });
        }

        if !self.email.oauth_enabled() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "GMAIL_CLIENT_ID / GMAIL_CLIENT_SECRET not set: email authorization is disabled"
                    .into(),
            });
        }

        if self.server.allowed_origins.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "ALLOWED_ORIGINS is empty: cross-origin browsers will be rejected".into(),
            });
        }

        if self.search.hits_per_page == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "search.hits_per_page must be at least 1".into(),
            });
        }

        if self.store.backend == StoreBackend::Memory {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "SPECSHEET_STORE=memory: records are lost on restart".into(),
            });
        }

        warnings
    }
}

fn is_set(v: &Option<String>) -> bool {
    v.as_deref().is_some_and(|s| !s.trim().is_empty())
}

fn parse_bool(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
