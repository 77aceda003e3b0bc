//! Error types for imterra-core
//!
//! Only load-time programmer mistakes and failed fetches are errors.
//! Reference resolution and renderer creation never fail loudly: they
//! resolve to `None` and the caller treats that as a no-op.

use thiserror::Error;

/// Result type alias for imterra operations
pub type Result<T> = std::result::Result<T, ImterraError>;

/// Main error type for imterra operations
#[derive(Error, Debug)]
pub enum ImterraError {
    /// Registry errors (variants, collections)
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// A descriptor did not match any registered variant shape
    #[error("Invalid descriptor: {0}")]
    Descriptor(#[from] DescriptorError),

    /// Fetch errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised while registering variants or collections
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Variant registered without a name
    #[error("Variant name must not be empty")]
    AnonymousVariant,

    /// Variant or nested registry name already taken
    #[error("Variant already registered: {0}")]
    AlreadyRegistered(String),

    /// Collection id already present in the scope
    #[error("Collection already registered: {0}")]
    DuplicateCollection(String),

    /// Unknown variant name
    #[error("Variant not found: {0}")]
    NotFound(String),

    /// A layer or interaction id is already taken in its collection
    #[error("Duplicate id '{id}' in collection '{collection}'")]
    DuplicateId { collection: String, id: String },
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "field '{}': {}", self.field, self.message)
    }
}

/// Errors from validating a declarative layer/entity/interaction descriptor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    /// Descriptor is not a JSON object
    #[error("descriptor must be an object")]
    NotAnObject,

    /// Descriptor has no `type` discriminator
    #[error("descriptor has no 'type' discriminator")]
    MissingDiscriminator,

    /// Discriminator names no registered variant
    #[error("unknown variant '{0}'")]
    UnknownVariant(String),

    /// Fields did not match the variant shape
    #[error("variant '{}' rejected {} field(s): {}", .variant, .errors.len(), join(.errors))]
    Invalid {
        variant: String,
        errors: Vec<ValidationError>,
    },
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors from asynchronous fetches
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The request was superseded or cancelled. Never reported to callers
    /// of `FetchSlot`; it is swallowed there.
    #[error("Fetch cancelled")]
    Cancelled,

    /// The request itself failed
    #[error("Fetch failed: {0}")]
    Failed(String),
}

impl FetchError {
    /// Whether this error is the cancellation sentinel
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Value is out of valid range
    #[error("Value out of range: {0}")]
    OutOfRange(String),

    /// Configuration text could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::AlreadyRegistered("tile".to_string());
        assert!(err.to_string().contains("tile"));
    }

    #[test]
    fn test_descriptor_error_lists_fields() {
        let err = DescriptorError::Invalid {
            variant: "tile".to_string(),
            errors: vec![
                ValidationError {
                    field: "url".to_string(),
                    message: "required field missing".to_string(),
                },
                ValidationError {
                    field: "opacity".to_string(),
                    message: "expected number, got string".to_string(),
                },
            ],
        };
        let text = err.to_string();
        assert!(text.contains("2 field(s)"));
        assert!(text.contains("url"));
        assert!(text.contains("opacity"));
    }

    #[test]
    fn test_fetch_cancel_sentinel() {
        assert!(FetchError::Cancelled.is_cancelled());
        assert!(!FetchError::Failed("timeout".into()).is_cancelled());
    }

    #[test]
    fn test_umbrella_conversion() {
        let err: ImterraError = RegistryError::AnonymousVariant.into();
        assert!(matches!(err, ImterraError::Registry(_)));
    }
}
