/// Core error types for the Strata rendering core.

/// A specialized Result type for Strata operations.
pub type StrataResult<T> = Result<T, StrataError>;

/// Top-level error type encompassing all Strata subsystems.
///
/// Configuration errors surface when effects are registered or values are
/// assigned, render errors abort the frame being rendered, and data errors
/// are reserved for values that escaped clipping.
#[derive(Debug, thiserror::Error)]
pub enum StrataError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("data error: {0}")]
    Data(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("image error: {0}")]
    Image(#[from] ::image::ImageError),
}

impl StrataError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        StrataError::Configuration(message.into())
    }

    /// Create a render error.
    pub fn render(message: impl Into<String>) -> Self {
        StrataError::Render(message.into())
    }

    /// Create a data error.
    pub fn data(message: impl Into<String>) -> Self {
        StrataError::Data(message.into())
    }

    /// Whether this error is fatal to the frame currently being rendered.
    pub fn is_render_failure(&self) -> bool {
        matches!(self, StrataError::Render(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_display() {
        let err = StrataError::configuration("duplicate parameter 'amount'");
        assert_eq!(
            err.to_string(),
            "configuration error: duplicate parameter 'amount'"
        );
    }

    #[test]
    fn test_render_error_is_fatal() {
        assert!(StrataError::render("out of memory").is_render_failure());
        assert!(!StrataError::data("nan").is_render_failure());
    }

    #[test]
    fn test_io_error_converts() {
        let err: StrataError = std::io::Error::other("boom").into();
        assert!(err.to_string().contains("boom"));
    }
}
