/// Failures the grading engine surfaces to its caller.
///
/// Missing grades are not errors; they come back as `None`.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GradingError {
    /// The team's grading setup cannot drive a calculation.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Activity or score data that indicates an upstream data bug.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl GradingError {
    pub fn config(message: impl Into<String>) -> Self {
        GradingError::Configuration(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        GradingError::InvalidInput(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            GradingError::Configuration(_) => "configuration_error",
            GradingError::InvalidInput(_) => "invalid_input",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            GradingError::Configuration(m) | GradingError::InvalidInput(m) => m,
        }
    }
}
