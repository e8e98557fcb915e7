//! Service configuration
//!
//! Loaded from a TOML file, then overridden by environment variables.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "FACESERVE_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub face: FaceConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FaceConfig {
    pub provider: String,
    pub use_gpu: bool,
    pub ctx_id: i32,
    pub det_size: (u32, u32),
    pub model_name: String,
    pub model_dir: PathBuf,
    pub max_batch_size: usize,
}

impl Config {
    /// Read a TOML config file; a missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config at {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Load the config file and apply overrides from the process environment
    pub fn from_env() -> Result<Self> {
        let mut config = Self::load(Self::default_path())?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would only fail later, at inference time
    pub fn validate(&self) -> Result<()> {
        check_det_size("face.det_size", self.face.det_size)?;
        Ok(())
    }

    /// Apply overrides from a key lookup (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("PORT") {
            self.server.port = parse_var("PORT", &v)?;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.server.log_level = v;
        }
        if let Some(v) = lookup("CORS_ORIGINS") {
            self.server.cors_origins = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(v) = lookup("FACE_PROVIDER") {
            self.face.provider = v;
        }
        if let Some(v) = lookup("FACE_USE_GPU") {
            self.face.use_gpu = parse_bool("FACE_USE_GPU", &v)?;
        }
        if let Some(v) = lookup("FACE_CTX_ID") {
            self.face.ctx_id = parse_var("FACE_CTX_ID", &v)?;
        }
        if let Some(v) = lookup("FACE_DET_SIZE") {
            self.face.det_size = parse_det_size(&v)?;
        }
        if let Some(v) = lookup("FACE_MODEL_NAME") {
            self.face.model_name = v;
        }
        if let Some(v) = lookup("FACE_MODEL_DIR") {
            self.face.model_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("FACE_MAX_BATCH_SIZE") {
            self.face.max_batch_size = parse_var("FACE_MAX_BATCH_SIZE", &v)?;
        }
        Ok(())
    }
}

impl FaceConfig {
    /// Model directory with a leading `~` expanded to the home directory
    pub fn resolved_model_dir(&self) -> PathBuf {
        expand_home(&self.model_dir)
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("invalid value for {}: {:?}", key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("invalid value for {}: {:?}", key, value),
    }
}

/// Parse a detector input size written as `"w,h"`
pub fn parse_det_size(value: &str) -> Result<(u32, u32)> {
    let mut parts = value.split(',');
    let (Some(w), Some(h), None) = (parts.next(), parts.next(), parts.next()) else {
        anyhow::bail!("FACE_DET_SIZE must be \"width,height\", got {:?}", value);
    };
    let size = (parse_var("FACE_DET_SIZE", w)?, parse_var("FACE_DET_SIZE", h)?);
    check_det_size("FACE_DET_SIZE", size)?;
    Ok(size)
}

fn check_det_size(key: &str, (w, h): (u32, u32)) -> Result<()> {
    if w == 0 || h == 0 {
        anyhow::bail!("{} must have a non-zero width and height, got {}x{}", key, w, h);
    }
    Ok(())
}

fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match directories::BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(rest),
        None => path.to_path_buf(),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            face: FaceConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            log_level: "info".to_string(),
            cors_origins: vec!["*".to_string()],
        }
    }
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            provider: "insightface".to_string(),
            use_gpu: false,
            ctx_id: 0,
            det_size: (640, 640),
            model_name: "buffalo_l".to_string(),
            model_dir: PathBuf::from("~/.insightface"),
            max_batch_size: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.face.provider, "insightface");
        assert_eq!(config.face.det_size, (640, 640));
        assert_eq!(config.face.model_name, "buffalo_l");
        assert_eq!(config.face.max_batch_size, 20);
        assert!(!config.face.use_gpu);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = Config::load("/nonexistent/faceserve.toml").unwrap();
        assert_eq!(config.face.max_batch_size, 20);
    }

    #[test]
    fn test_load_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[face]\nuse_gpu = true\nctx_id = 1\ndet_size = [320, 320]\nmax_batch_size = 5"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert!(config.face.use_gpu);
        assert_eq!(config.face.ctx_id, 1);
        assert_eq!(config.face.det_size, (320, 320));
        assert_eq!(config.face.max_batch_size, 5);
        // Untouched sections keep their defaults
        assert_eq!(config.face.model_name, "buffalo_l");
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[face\nprovider = ").unwrap();
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(lookup(&[
                ("PORT", "9001"),
                ("FACE_PROVIDER", "InsightFace"),
                ("FACE_USE_GPU", "true"),
                ("FACE_CTX_ID", "2"),
                ("FACE_DET_SIZE", "320, 256"),
                ("FACE_MAX_BATCH_SIZE", "7"),
                ("CORS_ORIGINS", "http://a.test, http://b.test"),
            ]))
            .unwrap();

        assert_eq!(config.server.port, 9001);
        assert_eq!(config.face.provider, "InsightFace");
        assert!(config.face.use_gpu);
        assert_eq!(config.face.ctx_id, 2);
        assert_eq!(config.face.det_size, (320, 256));
        assert_eq!(config.face.max_batch_size, 7);
        assert_eq!(config.server.cors_origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn test_malformed_override_names_variable() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(lookup(&[("FACE_MAX_BATCH_SIZE", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("FACE_MAX_BATCH_SIZE"));
    }

    #[test]
    fn test_parse_det_size() {
        assert_eq!(parse_det_size("640,480").unwrap(), (640, 480));
        assert!(parse_det_size("640").is_err());
        assert!(parse_det_size("1,2,3").is_err());
        assert!(parse_det_size("a,b").is_err());
    }

    #[test]
    fn test_zero_det_size_rejected() {
        let err = parse_det_size("0,0").unwrap_err();
        assert!(err.to_string().contains("FACE_DET_SIZE"));
        assert!(parse_det_size("640,0").is_err());

        let mut config = Config::default();
        assert!(config
            .apply_overrides(lookup(&[("FACE_DET_SIZE", "0,480")]))
            .is_err());
        assert_eq!(config.face.det_size, (640, 640));
    }

    #[test]
    fn test_zero_det_size_in_file_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[face]\ndet_size = [0, 0]").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("face.det_size"));
    }

    #[test]
    fn test_expand_home() {
        let absolute = FaceConfig {
            model_dir: PathBuf::from("/opt/models"),
            ..FaceConfig::default()
        };
        assert_eq!(absolute.resolved_model_dir(), PathBuf::from("/opt/models"));

        let home = FaceConfig::default().resolved_model_dir();
        if let Some(dirs) = directories::BaseDirs::new() {
            assert_eq!(home, dirs.home_dir().join(".insightface"));
        }
    }
}
