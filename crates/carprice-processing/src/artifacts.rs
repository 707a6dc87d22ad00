//! Fitted artifact bundle and its on-disk layout.
//!
//! An artifact directory holds four JSON files:
//!
//! | File | Contents |
//! |------|----------|
//! | `one_hot_encoder.json` | [`OneHotEncoder`] |
//! | `label_encoders.json` | field name → [`LabelEncoder`] |
//! | `scaler.json` | [`StandardScaler`] |
//! | `model.json` | [`LinearPriceModel`] |
//!
//! Artifacts are loaded once at startup and never mutated afterwards, so a
//! single [`FittedArtifacts`] can be shared across threads behind an `Arc`.

use crate::encoding::{EncodingArtifacts, LabelEncoder, OneHotEncoder, StandardScaler};
use crate::error::{PipelineError, Result};
use crate::model::{LinearPriceModel, PriceModel};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

pub const ONE_HOT_ENCODER_FILE: &str = "one_hot_encoder.json";
pub const LABEL_ENCODERS_FILE: &str = "label_encoders.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const MODEL_FILE: &str = "model.json";

/// Fitted encoders plus the model they feed.
#[derive(Debug, Clone)]
pub struct FittedArtifacts {
    encoders: EncodingArtifacts,
    model: Arc<dyn PriceModel>,
}

static_assertions::assert_impl_all!(FittedArtifacts: Send, Sync);

impl FittedArtifacts {
    /// Bundle encoders with a model, checking that the encoders produce
    /// exactly the columns the model was fit on.
    pub fn new(encoders: EncodingArtifacts, model: Arc<dyn PriceModel>) -> Result<Self> {
        encoders.validate()?;
        let produced = encoders.feature_names();
        if produced != model.feature_names() {
            return Err(PipelineError::SchemaMismatch {
                expected: model.feature_names().to_vec(),
                got: produced,
            });
        }
        Ok(Self { encoders, model })
    }

    /// Load encoders and a linear model from an artifact directory.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let encoders = EncodingArtifacts::load(dir)?;
        let model = LinearPriceModel::load(dir.join(MODEL_FILE))
            .map_err(|e| artifact_error(MODEL_FILE, e))?;

        let artifacts = Self::new(encoders, Arc::new(model))?;
        info!(
            "Loaded artifacts from {} ({} features)",
            dir.display(),
            artifacts.schema().len()
        );
        Ok(artifacts)
    }

    pub fn encoders(&self) -> &EncodingArtifacts {
        &self.encoders
    }

    pub fn model(&self) -> &dyn PriceModel {
        self.model.as_ref()
    }

    /// The model's feature schema.
    pub fn schema(&self) -> &[String] {
        self.model.feature_names()
    }
}

impl EncodingArtifacts {
    /// Read the three encoder files from `dir`.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let one_hot: OneHotEncoder = read_json(dir, ONE_HOT_ENCODER_FILE)?;
        let label_encoders: BTreeMap<String, LabelEncoder> = read_json(dir, LABEL_ENCODERS_FILE)?;
        let scaler: StandardScaler = read_json(dir, SCALER_FILE)?;

        let encoders = Self {
            one_hot,
            label_encoders,
            scaler,
        };
        encoders.validate()?;
        Ok(encoders)
    }

    /// Write the three encoder files into `dir`, creating it if needed.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        write_json(dir, ONE_HOT_ENCODER_FILE, &self.one_hot)?;
        write_json(dir, LABEL_ENCODERS_FILE, &self.label_encoders)?;
        write_json(dir, SCALER_FILE, &self.scaler)?;
        info!("Saved encoders to {}", dir.display());
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<T> {
    let path = dir.join(file);
    debug!("Reading {}", path.display());
    let content = std::fs::read_to_string(&path).map_err(|e| artifact_error(file, e.into()))?;
    serde_json::from_str(&content).map_err(|e| artifact_error(file, e.into()))
}

fn write_json<T: Serialize>(dir: &Path, file: &str, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(dir.join(file), content)?;
    Ok(())
}

fn artifact_error(file: &str, source: PipelineError) -> PipelineError {
    match source {
        // Already specific enough
        PipelineError::ArtifactLoad { .. } => source,
        other => PipelineError::ArtifactLoad {
            name: file.to_string(),
            reason: other.to_string(),
        },
    }
}
