//! Process-level configuration: where the weights live, which report generator
//! to use and which disease map the translator reads.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::onnx::OrtSessionConfig;
use crate::core::errors::{MrgError, MrgResult};
use crate::domain::{DiseaseEntry, DiseaseIndexMap};

/// Report generator implementation, selected at configuration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportGeneratorConfig {
    /// An exported image-to-text graph emitting token ids.
    Onnx {
        /// ONNX model file.
        model_path: PathBuf,
        /// Vocabulary JSON mapping token ids to tokens.
        vocab_path: PathBuf,
        /// Name of the image input tensor.
        #[serde(default = "default_input_name")]
        input_name: String,
        /// Name of the token id output tensor; the first output when absent.
        #[serde(default)]
        output_name: Option<String>,
        /// Number of ONNX Runtime sessions to pool for concurrent requests.
        #[serde(default = "default_session_pool_size")]
        session_pool_size: usize,
        #[serde(default)]
        ort_session: Option<OrtSessionConfig>,
    },
}

fn default_input_name() -> String {
    "images".to_string()
}

fn default_session_pool_size() -> usize {
    1
}

/// Named disease map presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiseaseMapPreset {
    /// The five findings used for report composition.
    Five,
    /// The fourteen ChestX-ray14 labels.
    ChestxRay14,
}

/// Disease map selection: a preset name or an explicit ordered list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DiseaseMapConfig {
    Preset(DiseaseMapPreset),
    Custom(Vec<DiseaseEntry>),
}

impl Default for DiseaseMapConfig {
    fn default() -> Self {
        Self::Preset(DiseaseMapPreset::Five)
    }
}

impl DiseaseMapConfig {
    /// Builds the disease map this configuration selects.
    pub fn build(&self) -> MrgResult<DiseaseIndexMap> {
        match self {
            DiseaseMapConfig::Preset(DiseaseMapPreset::Five) => Ok(DiseaseIndexMap::five_diseases()),
            DiseaseMapConfig::Preset(DiseaseMapPreset::ChestxRay14) => {
                Ok(DiseaseIndexMap::chestx_ray14())
            }
            DiseaseMapConfig::Custom(entries) => DiseaseIndexMap::from_entries(entries.clone()),
        }
    }
}

/// Top-level configuration of the report generation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MrgConfig {
    /// Classifier JSON configuration.
    pub classifier_config: PathBuf,
    /// Classifier weights in safetensors format.
    pub classifier_weights: PathBuf,
    pub report_generator: ReportGeneratorConfig,
    #[serde(default)]
    pub disease_map: DiseaseMapConfig,
    /// Root directory for request-scoped artifacts.
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("assets")
}

impl MrgConfig {
    /// Loads the configuration and resolves relative paths against the
    /// directory containing the configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> MrgResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MrgError::config_error(format!(
                "failed to read pipeline config from {}: {}",
                path.display(),
                e
            ))
        })?;
        let mut cfg: Self = serde_json::from_str(&content)
            .map_err(|e| MrgError::config_error(format!("failed to parse pipeline config: {}", e)))?;
        if let Some(base) = path.parent() {
            cfg.resolve_relative_to(base);
        }
        Ok(cfg)
    }

    /// Rewrites every relative path in the configuration to be relative to `base`.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.classifier_config);
        resolve(&mut self.classifier_weights);
        resolve(&mut self.assets_dir);
        match &mut self.report_generator {
            ReportGeneratorConfig::Onnx {
                model_path,
                vocab_path,
                ..
            } => {
                resolve(model_path);
                resolve(vocab_path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "classifier_config": "config/JF.json",
        "classifier_weights": "/weights/JFchexpert.safetensors",
        "report_generator": {
            "kind": "onnx",
            "model_path": "weights/r2gen.onnx",
            "vocab_path": "weights/idx2token.json"
        }
    }"#;

    #[test]
    fn test_defaults() {
        let cfg: MrgConfig = serde_json::from_str(CONFIG).unwrap();
        assert_eq!(cfg.disease_map, DiseaseMapConfig::Preset(DiseaseMapPreset::Five));
        assert_eq!(cfg.assets_dir, PathBuf::from("assets"));
        match &cfg.report_generator {
            ReportGeneratorConfig::Onnx {
                input_name,
                output_name,
                session_pool_size,
                ..
            } => {
                assert_eq!(input_name, "images");
                assert!(output_name.is_none());
                assert_eq!(*session_pool_size, 1);
            }
        }
    }

    #[test]
    fn test_resolve_relative_paths() {
        let mut cfg: MrgConfig = serde_json::from_str(CONFIG).unwrap();
        cfg.resolve_relative_to(Path::new("/srv/mrg"));
        assert_eq!(cfg.classifier_config, PathBuf::from("/srv/mrg/config/JF.json"));
        // Absolute paths are left alone.
        assert_eq!(
            cfg.classifier_weights,
            PathBuf::from("/weights/JFchexpert.safetensors")
        );
        assert_eq!(cfg.assets_dir, PathBuf::from("/srv/mrg/assets"));
        let ReportGeneratorConfig::Onnx { model_path, .. } = &cfg.report_generator;
        assert_eq!(model_path, &PathBuf::from("/srv/mrg/weights/r2gen.onnx"));
    }

    #[test]
    fn test_disease_map_variants() {
        let preset: DiseaseMapConfig = serde_json::from_str(r#""chestx_ray14""#).unwrap();
        assert_eq!(preset.build().unwrap().len(), 14);

        let custom: DiseaseMapConfig =
            serde_json::from_str(r#"[{"name": "Edema", "index": 9}, {"name": "Mass", "index": 4}]"#)
                .unwrap();
        let map = custom.build().unwrap();
        let names: Vec<&str> = map.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["Edema", "Mass"]);
    }

    #[test]
    fn test_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mrg.json");
        std::fs::write(&path, CONFIG).unwrap();
        let cfg = MrgConfig::from_path(&path).unwrap();
        assert_eq!(cfg.classifier_config, dir.path().join("config/JF.json"));
    }
}
