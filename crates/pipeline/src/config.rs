//! # Pipeline Configuration
//!
//! TOML configuration for upload endpoint, temporary files, model catalog
//! and material treatments.

use crate::capture::CaptureConfig;
use crate::error::ConfigError;
use crate::transform::{MaterialGroup, MaterialPlan, Treatment};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment override for `api_base_url`
pub const API_URL_ENV: &str = "ROOMSCAN_API_URL";
/// Environment override for `work_dir`
pub const WORK_DIR_ENV: &str = "ROOMSCAN_WORK_DIR";

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Scan service base URL
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Upload endpoint path
    #[serde(default = "default_upload_path")]
    pub upload_path: String,

    /// Upload timeout in seconds
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,

    /// Directory for run-qualified temporary files
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Directory of reference models (`<category>.bin`)
    #[serde(default)]
    pub catalog_dir: Option<PathBuf>,

    /// Options passed to the capture runtime
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Material treatments, one per group
    #[serde(default)]
    pub materials: Vec<MaterialEntry>,

    /// Directory relative texture paths resolve against
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

fn default_api_base_url() -> String { "http://localhost:8080".to_string() }
fn default_upload_path() -> String { "/api/scans".to_string() }
fn default_timeout() -> u64 { 60 }

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("roomscan")
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            upload_path: default_upload_path(),
            request_timeout_secs: default_timeout(),
            work_dir: default_work_dir(),
            catalog_dir: None,
            capture: CaptureConfig::default(),
            materials: Vec::new(),
            base_dir: None,
        }
    }
}

/// One `[[materials]]` entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialEntry {
    /// Group key ("floor", "walls", ... or a custom name)
    pub group: String,
    /// Scene node name; required for custom groups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture: Option<PathBuf>,
    /// Texture repeat along U and V, defaults to [1.0, 1.0]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<[f32; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tint: Option<[f32; 4]>,
}

impl MaterialEntry {
    fn invalid(&self, reason: impl Into<String>) -> ConfigError {
        ConfigError::Material {
            group: self.group.clone(),
            reason: reason.into(),
        }
    }

    fn material_group(&self) -> Result<MaterialGroup, ConfigError> {
        match &self.node {
            Some(node) => Ok(MaterialGroup::custom(&self.group, node)),
            None => MaterialGroup::well_known(&self.group)
                .ok_or_else(|| self.invalid("unknown group, set `node` to the scene node name")),
        }
    }

    fn treatment(&self, base_dir: Option<&Path>) -> Result<Treatment, ConfigError> {
        match (&self.texture, self.tint) {
            (Some(texture), None) => {
                let image = match base_dir {
                    Some(base) if texture.is_relative() => base.join(texture),
                    _ => texture.clone(),
                };
                let [x, y] = self.repeat.unwrap_or([1.0, 1.0]);
                Ok(Treatment::texture(image, x, y))
            }
            (None, Some(color)) => {
                if self.repeat.is_some() {
                    return Err(self.invalid("`repeat` only applies to textures"));
                }
                Ok(Treatment::tint(color))
            }
            (Some(_), Some(_)) => Err(self.invalid("set either `texture` or `tint`, not both")),
            (None, None) => Err(self.invalid("missing `texture` or `tint`")),
        }
    }
}

impl PipelineConfig {
    /// Load from TOML file or return default
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            match Self::load(path) {
                Ok(config) => return config,
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Using default pipeline config"),
            }
        }
        Self::default()
    }

    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&content)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make every run fail
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_secs",
                reason: "must be at least 1 second".to_string(),
            });
        }
        Ok(())
    }

    /// Save to TOML file
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Defaults with environment overrides
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `ROOMSCAN_API_URL` and `ROOMSCAN_WORK_DIR` if set
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            self.api_base_url = url;
        }
        if let Ok(dir) = std::env::var(WORK_DIR_ENV) {
            self.work_dir = PathBuf::from(dir);
        }
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    pub fn with_catalog_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.catalog_dir = Some(dir.into());
        self
    }

    pub fn with_material(mut self, entry: MaterialEntry) -> Self {
        self.materials.push(entry);
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Convert `[[materials]]` into a plan
    pub fn material_plan(&self) -> Result<MaterialPlan, ConfigError> {
        let mut plan = MaterialPlan::new();
        for entry in &self.materials {
            let group = entry.material_group()?;
            let treatment = entry.treatment(self.base_dir.as_deref())?;
            if plan.keys().any(|existing| existing.name == group.name) {
                return Err(entry.invalid("group configured more than once"));
            }
            plan.insert(group, treatment);
        }
        Ok(plan)
    }
}

/// Example TOML configuration file
pub const EXAMPLE_CONFIG: &str = r#"
# Roomscan pipeline configuration
# Save as roomscan.toml and pass with --config

# Scan service
api_base_url = "https://scans.example.com"
upload_path = "/api/scans"
request_timeout_secs = 60

# Temporary files (deleted at the end of every run)
# work_dir = "/tmp/roomscan"

# Reference models for detected furniture, one <category>.bin per file
# catalog_dir = "./catalog"

[capture]
coaching = true
detect_objects = true

[[materials]]
group = "floor"
texture = "textures/oak.png"
repeat = [2.0, 2.0]

[[materials]]
group = "objects"
tint = [0.2, 0.4, 0.9, 1.0]

# Custom groups name the scene node explicitly
# [[materials]]
# group = "kitchen"
# node = "Kitchen_grp"
# tint = [0.9, 0.9, 0.85, 1.0]
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_config_parses() {
        let config = PipelineConfig::from_toml(EXAMPLE_CONFIG).unwrap();
        assert_eq!(config.api_base_url, "https://scans.example.com");
        assert_eq!(config.request_timeout(), Duration::from_secs(60));

        let plan = config.material_plan().unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(
            plan.get(&MaterialGroup::floor()),
            Some(&Treatment::texture("textures/oak.png", 2.0, 2.0))
        );
        assert_eq!(plan.get(&MaterialGroup::objects()), Some(&Treatment::tint([0.2, 0.4, 0.9, 1.0])));
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config.upload_path, "/api/scans");
        assert_eq!(config.request_timeout_secs, 60);
        assert!(config.work_dir.ends_with("roomscan"));
        assert!(config.material_plan().unwrap().is_empty());
    }

    #[test]
    fn test_relative_texture_resolves_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roomscan.toml");
        std::fs::write(&path, "[[materials]]\ngroup = \"walls\"\ntexture = \"plaster.png\"\n").unwrap();

        let plan = PipelineConfig::load(&path).unwrap().material_plan().unwrap();
        assert_eq!(
            plan.get(&MaterialGroup::walls()),
            Some(&Treatment::texture(dir.path().join("plaster.png"), 1.0, 1.0))
        );
    }

    #[test]
    fn test_invalid_material_entries() {
        let both = PipelineConfig::default().with_material(MaterialEntry {
            group: "floor".into(),
            texture: Some("oak.png".into()),
            tint: Some([1.0, 1.0, 1.0, 1.0]),
            ..Default::default()
        });
        assert!(matches!(both.material_plan(), Err(ConfigError::Material { .. })));

        let neither = PipelineConfig::default().with_material(MaterialEntry { group: "floor".into(), ..Default::default() });
        assert!(matches!(neither.material_plan(), Err(ConfigError::Material { .. })));

        let unknown = PipelineConfig::default().with_material(MaterialEntry {
            group: "kitchen".into(),
            tint: Some([1.0, 1.0, 1.0, 1.0]),
            ..Default::default()
        });
        assert!(matches!(unknown.material_plan(), Err(ConfigError::Material { .. })));
    }

    #[test]
    fn test_custom_group() {
        let config = PipelineConfig::default().with_material(MaterialEntry {
            group: "kitchen".into(),
            node: Some("Kitchen_grp".into()),
            tint: Some([0.9, 0.9, 0.85, 1.0]),
            ..Default::default()
        });
        let plan = config.material_plan().unwrap();
        assert!(plan.contains_key(&MaterialGroup::custom("kitchen", "Kitchen_grp")));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roomscan.toml");
        let config = PipelineConfig::default()
            .with_api_base_url("https://scans.internal")
            .with_timeout(15)
            .with_work_dir(dir.path().join("work"))
            .with_catalog_dir(dir.path().join("catalog"));
        config.save(&path).unwrap();

        let loaded = PipelineConfig::load(&path).unwrap();
        assert_eq!(loaded.api_base_url, "https://scans.internal");
        assert_eq!(loaded.request_timeout(), Duration::from_secs(15));
        assert_eq!(loaded.work_dir, dir.path().join("work"));
        assert_eq!(loaded.catalog_dir, Some(dir.path().join("catalog")));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = PipelineConfig::from_toml("request_timeout_secs = 0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "request_timeout_secs", .. }));
        assert!(PipelineConfig::default().with_timeout(0).validate().is_err());
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_load_or_default_on_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roomscan.toml");
        std::fs::write(&path, "request_timeout_secs = \"soon\"").unwrap();
        assert_eq!(PipelineConfig::load_or_default(&path), PipelineConfig::default());
        assert!(matches!(PipelineConfig::load(&path), Err(ConfigError::Parse(_))));
    }
}
