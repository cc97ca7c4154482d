use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, EvalError>;

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("Directory not found: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("Wrong algorithm name.")]
    UnknownAlgorithm(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to load {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: cv_core::Error,
    },

    #[error(transparent)]
    Feature(#[from] cv_features::FeatureError),

    #[error(transparent)]
    Grouping(#[from] cv_registration::RegistrationError),

    #[error("Failed to install interrupt handler: {0}")]
    Signal(#[from] ctrlc::Error),
}
