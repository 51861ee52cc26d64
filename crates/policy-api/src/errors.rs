//! Error classification for request handlers

use crate::mapper::MapperError;
use policy_store::StoreError;

/// Who is at fault for a failed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad request or exhausted quota
    Client,
    /// Internal failure
    Server,
}

impl ErrorClass {
    /// HTTP status code for the class
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorClass::Client => 400,
            ErrorClass::Server => 500,
        }
    }
}

/// Classify a store failure
pub fn classify(err: &StoreError) -> ErrorClass {
    if err.is_allocation_exhausted() {
        return ErrorClass::Client;
    }
    match err {
        StoreError::InvalidTagLength(_) => ErrorClass::Client,
        _ => ErrorClass::Server,
    }
}

/// Classify a mapping failure
pub fn classify_mapper(err: &MapperError) -> ErrorClass {
    match err {
        MapperError::Unmarshal(_) | MapperError::Validate(_) => ErrorClass::Client,
        MapperError::Marshal(_) => ErrorClass::Server,
    }
}
