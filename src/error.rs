use crate::value::Value;

#[derive(thiserror::Error, Debug)]
pub enum CoordinatorError {
    #[error("Type error: {message}")]
    TypeError { message: String },

    #[error("Async generator body is gone (generator already completed)")]
    BodyMissing,
}

impl CoordinatorError {
    pub fn type_error(message: impl Into<String>) -> Self {
        CoordinatorError::TypeError { message: message.into() }
    }
}

// Rejection payloads are plain values; errors cross the settlement boundary
// as their rendered message.
impl From<CoordinatorError> for Value {
    fn from(err: CoordinatorError) -> Self {
        Value::String(err.to_string())
    }
}
