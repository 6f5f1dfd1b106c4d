use thiserror::Error;

/// Main error type for the FlexTune system
#[derive(Error, Debug)]
pub enum TuneError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("{method} tuning failed: {message}")]
    Execution { method: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TuneError {
    /// Configuration errors are raised to the caller as-is; everything else is
    /// an execution failure of a particular search attempt.
    pub fn is_config(&self) -> bool {
        matches!(self, TuneError::Config(_))
    }

    /// Wrap any error as an execution failure of `method`, keeping
    /// configuration errors untouched.
    pub fn into_execution(self, method: &str) -> TuneError {
        match self {
            TuneError::Config(_) | TuneError::Execution { .. } => self,
            other => TuneError::Execution {
                method: method.to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// Errors caused by how a tuning run was set up
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Unsupported value type for parameter '{parameter}': {message}")]
    UnsupportedParameterType { parameter: String, message: String },

    #[error("Parameter '{parameter}' has no candidate values")]
    EmptyCandidates { parameter: String },

    #[error("Parameter grid is empty")]
    EmptyGrid,

    #[error("Invalid fold count {folds}: at least 2 folds are required")]
    InvalidFolds { folds: usize },

    #[error("{0}")]
    Other(String),
}

/// Errors raised by estimators
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Invalid parameter {parameter} for {model}: {message}")]
    InvalidParameter {
        model: String,
        parameter: String,
        message: String,
    },

    #[error("{model} is not fitted")]
    NotFitted { model: String },

    #[error("Fit failed for {model}: {message}")]
    FitFailed { model: String, message: String },

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Empty input: {message}")]
    EmptyInput { message: String },

    #[error("Unsupported target for {metric}: {message}")]
    UnsupportedTarget { metric: String, message: String },
}

/// Result type alias for FlexTune operations
pub type TuneResult<T> = Result<T, TuneError>;

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::TuneError::Config($crate::ConfigError::Other(format!($($arg)*)))
    };
}

/// Macro for creating execution errors: `execution_error!("grid", "no folds for {} rows", n)`
#[macro_export]
macro_rules! execution_error {
    ($method:expr, $($arg:tt)*) => {
        $crate::TuneError::Execution {
            method: ($method).to_string(),
            message: format!($($arg)*),
        }
    };
}
