use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("User does not have sufficient privileges to access the layer: {layer}")]
    Authorization { layer: String },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status} returned by {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Capabilities document could not be parsed: {0}")]
    CapabilitiesParse(#[from] quick_xml::Error),

    #[error("Unknown coordinate reference system: {0}")]
    UnknownCrs(String),

    #[error("Coordinate transformation failed: {message}")]
    Transform { message: String },

    #[error("{format} is not a recognized vector format")]
    UnsupportedFormat { format: String },

    #[error("{service} must be WFS for the WFS extractor")]
    UnsupportedService { service: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid remote schema for {type_name}: {message}")]
    Schema { type_name: String, message: String },

    #[error("Failed to process feature {feature}: {message}")]
    Processing { feature: String, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Coarse grouping callers branch on. Authorization must never be folded
/// into a generic failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authorization,
    Transport,
    Georeferencing,
    Configuration,
    Processing,
    Io,
}

impl ExtractorError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ExtractorError::Authorization { .. } => ErrorCategory::Authorization,
            ExtractorError::Transport(_)
            | ExtractorError::HttpStatus { .. }
            | ExtractorError::CapabilitiesParse(_) => ErrorCategory::Transport,
            ExtractorError::UnknownCrs(_) | ExtractorError::Transform { .. } => {
                ErrorCategory::Georeferencing
            }
            ExtractorError::UnsupportedFormat { .. }
            | ExtractorError::UnsupportedService { .. }
            | ExtractorError::ConfigError { .. }
            | ExtractorError::MissingConfigError { .. }
            | ExtractorError::InvalidConfigValueError { .. }
            | ExtractorError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            ExtractorError::Schema { .. } | ExtractorError::Processing { .. } => {
                ErrorCategory::Processing
            }
            ExtractorError::IoError(_) => ErrorCategory::Io,
        }
    }

    pub fn is_authorization(&self) -> bool {
        self.category() == ErrorCategory::Authorization
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Authorization => format!("Access denied: {}", self),
            ErrorCategory::Transport => format!("The remote service is unreachable: {}", self),
            ErrorCategory::Georeferencing => format!("Bounding box could not be reprojected: {}", self),
            ErrorCategory::Configuration => format!("Bad request or configuration: {}", self),
            ErrorCategory::Processing => format!("Extraction aborted: {}", self),
            ErrorCategory::Io => format!("Local file system error: {}", self),
        }
    }

    /// Process exit code used by the CLI.
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Configuration => 1,
            ErrorCategory::Transport => 2,
            ErrorCategory::Authorization => 3,
            ErrorCategory::Georeferencing => 4,
            ErrorCategory::Processing => 5,
            ErrorCategory::Io => 6,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtractorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_is_distinct_from_transport() {
        let denied = ExtractorError::Authorization {
            layer: "roads".to_string(),
        };
        let unreachable = ExtractorError::HttpStatus {
            url: "http://example.com".to_string(),
            status: 404,
        };

        assert!(denied.is_authorization());
        assert!(!unreachable.is_authorization());
        assert_eq!(unreachable.category(), ErrorCategory::Transport);
        assert_ne!(denied.exit_code(), unreachable.exit_code());
        assert!(denied.to_string().contains("roads"));
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            ExtractorError::UnsupportedFormat {
                format: "kml".to_string()
            }
            .category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            ExtractorError::UnknownCrs("EPSG:99999".to_string()).category(),
            ErrorCategory::Georeferencing
        );
        assert_eq!(
            ExtractorError::Processing {
                feature: "roads.1".to_string(),
                message: "disk full".to_string()
            }
            .category(),
            ErrorCategory::Processing
        );
    }
}
