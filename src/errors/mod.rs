//! Error taxonomy and classification.

mod error;

pub use error::{ErrorClass, ErrorKind, ProviderError, ProviderResult};
