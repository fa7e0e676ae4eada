use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Email parsing failed: {0}")]
    EmailError(#[from] mailparse::MailParseError),

    #[error("Model API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Model stream error: {message}")]
    ModelStreamError { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("No JSON content found in response: {message}")]
    ExtractionError { message: String },

    #[error("Spreadsheet read error: {0}")]
    SheetReadError(#[from] calamine::XlsxError),

    #[error("Spreadsheet write error: {0}")]
    SheetWriteError(#[from] rust_xlsxwriter::XlsxError),

    #[error("Output file '{path}' is locked by another process after {attempts} attempts: {source}")]
    FileLockedError {
        path: String,
        attempts: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Model,
    Extraction,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn extraction(message: impl Into<String>) -> Self {
        Self::ExtractionError {
            message: message.into(),
        }
    }

    pub fn processing(message: impl Into<String>) -> Self {
        Self::ProcessingError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
            Self::EmailError(_) => ErrorCategory::Input,
            Self::ApiError(_) | Self::ModelStreamError { .. } => ErrorCategory::Model,
            Self::ExtractionError { .. }
            | Self::SerializationError(_)
            | Self::ProcessingError { .. } => ErrorCategory::Extraction,
            Self::IoError(_)
            | Self::SheetReadError(_)
            | Self::SheetWriteError(_)
            | Self::FileLockedError { .. } => ErrorCategory::Output,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::FileLockedError { .. } => ErrorSeverity::Medium,
            Self::ApiError(e) if e.is_connect() || e.is_timeout() => ErrorSeverity::Medium,
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    /// 目標檔案是否被其他程序鎖定 (例如 Excel 正開著它)
    pub fn is_transient_lock(&self) -> bool {
        match self {
            Self::IoError(e) => is_lock_violation(e),
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => "Check the command line flags or the TOML config file",
            ErrorCategory::Input => "Make sure the input file is a valid .eml message",
            ErrorCategory::Model => {
                "Make sure the model service is running and the model name is installed"
            }
            ErrorCategory::Extraction => {
                "The model did not return a usable JSON array; try re-running or adjusting the model"
            }
            ErrorCategory::Output => {
                "Close the output spreadsheet in other programs and check write permissions"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::FileLockedError { path, .. } => {
                format!("The output file '{}' is open in another program", path)
            }
            Self::ApiError(_) | Self::ModelStreamError { .. } => {
                format!("Could not get a response from the model: {}", self)
            }
            Self::EmailError(_) => format!("Could not read the email: {}", self),
            _ => self.to_string(),
        }
    }
}

pub fn is_lock_violation(err: &std::io::Error) -> bool {
    if err.kind() == std::io::ErrorKind::PermissionDenied {
        return true;
    }

    // ERROR_SHARING_VIOLATION / ERROR_LOCK_VIOLATION
    #[cfg(windows)]
    if matches!(err.raw_os_error(), Some(32) | Some(33)) {
        return true;
    }

    false
}

pub type Result<T> = std::result::Result<T, EtlError>;
