//! Error taxonomy for loading, resolving and rendering a fabric

use thiserror::Error;

use crate::models::ValidationReport;

/// Errors surfaced by the fabric compiler
#[derive(Debug, Error)]
pub enum FabricError {
    /// The topology document is malformed or references unknown entities.
    /// Carries every offending record, not just the first one.
    #[error("validation failed with {count} issue(s): {0}", count = .0.len())]
    Validation(ValidationReport),

    /// Connection shape matches neither the spine nor the leaf pattern
    #[error("cannot infer fabric role for {device}: {reason}")]
    RoleAmbiguous { device: String, reason: String },

    /// No address on the device's Loopback interface
    #[error("{device} has no loopback address to use as router-id")]
    MissingRouterId { device: String },

    /// No ASN in the device's attribute bag
    #[error("{device} has no ASN")]
    MissingAsn { device: String },

    /// Address pin outside every subnet declared for the interface's purpose
    #[error("{address} on {interface} is outside every {purpose} subnet")]
    AddressOutOfSubnet {
        interface: String,
        address: String,
        purpose: String,
    },

    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// Store-level constraint violation (self-loop, interface already cabled)
    #[error("{0}")]
    Conflict(String),

    #[error("template error: {0}")]
    Template(String),

    /// Backing store or remote API failure
    #[error(transparent)]
    Backend(anyhow::Error),
}

/// Result type for fabric operations
pub type FabricResult<T> = Result<T, FabricError>;

impl FabricError {
    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        FabricError::NotFound {
            resource,
            id: id.into(),
        }
    }

    /// Short machine-readable tag used in batch failure reports
    pub fn kind(&self) -> &'static str {
        match self {
            FabricError::Validation(_) => "validation",
            FabricError::RoleAmbiguous { .. } => "role_ambiguous",
            FabricError::MissingRouterId { .. } => "missing_router_id",
            FabricError::MissingAsn { .. } => "missing_asn",
            FabricError::AddressOutOfSubnet { .. } => "address_out_of_subnet",
            FabricError::NotFound { .. } => "not_found",
            FabricError::Conflict(_) => "conflict",
            FabricError::Template(_) => "template",
            FabricError::Backend(_) => "backend",
        }
    }
}

impl From<anyhow::Error> for FabricError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<FabricError>() {
            Ok(typed) => typed,
            Err(other) => FabricError::Backend(other),
        }
    }
}

impl From<tera::Error> for FabricError {
    fn from(err: tera::Error) -> Self {
        // tera nests the useful message in the source chain
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(inner) = source {
            message = format!("{}: {}", message, inner);
            source = inner.source();
        }
        FabricError::Template(message)
    }
}
