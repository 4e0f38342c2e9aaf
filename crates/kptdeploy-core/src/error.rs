//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Kptfile not found: {path}")]
    DescriptorNotFound { path: String },

    #[error("Invalid Kptfile: {message}")]
    InvalidDescriptor { message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid manifest: {message}")]
    InvalidManifest { message: String },

    #[error("Invalid deploy config: {message}")]
    InvalidConfig { message: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
