//! Error types for the instance bridge

use std::path::PathBuf;
use thiserror::Error;

/// Where in instance construction a load failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Library,
    Symbols,
    Initialization,
    Patch,
    Binding,
}

impl std::fmt::Display for LoadStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadStage::Library => write!(f, "opening engine library"),
            LoadStage::Symbols => write!(f, "resolving engine symbols"),
            LoadStage::Initialization => write!(f, "initializing engine"),
            LoadStage::Patch => write!(f, "opening patch"),
            LoadStage::Binding => write!(f, "binding receivers"),
        }
    }
}

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Engine load failed at {stage} stage: {path}\n  Reason: {reason}")]
    LoadFailed {
        path: PathBuf,
        stage: LoadStage,
        reason: String,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid port table: {0}")]
    InvalidPortTable(String),

    #[error("Host did not provide required feature: {0}")]
    MissingFeature(&'static str),
}

impl BridgeError {
    pub fn load_failed(path: impl Into<PathBuf>, stage: LoadStage, reason: impl Into<String>) -> Self {
        BridgeError::LoadFailed {
            path: path.into(),
            stage,
            reason: reason.into(),
        }
    }

    /// The construction stage that failed, if this is a load failure.
    pub fn stage(&self) -> Option<LoadStage> {
        match self {
            BridgeError::LoadFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
