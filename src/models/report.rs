use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One offending record found while validating a topology document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Record locator, e.g. `devices[3] (leaf1)`
    pub record: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.record, self.message)
    }
}

/// Every issue found in a document; a non-empty report aborts the load
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn push(&mut self, record: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            record: record.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.issues.iter().map(|i| i.to_string()).collect();
        f.write_str(&lines.join("; "))
    }
}

/// An address pin the loader refused to bind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedBinding {
    pub device: String,
    pub interface: String,
    pub address: String,
    pub reason: String,
}

/// Summary of a successful load
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub regions: usize,
    pub sites: usize,
    pub device_types: usize,
    pub subnets: usize,
    pub devices: usize,
    pub interfaces: usize,
    pub addresses: usize,
    pub links: usize,
    pub rejected_bindings: Vec<RejectedBinding>,
}

/// A device whose render was skipped, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderFailure {
    pub device: String,
    pub kind: String,
    pub message: String,
}

/// Result of one batch compilation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub outputs: BTreeMap<String, String>,
    pub failures: Vec<RenderFailure>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outputs.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Request body for a batch render; an empty selection means every device
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RenderRequest {
    #[serde(default)]
    pub devices: Vec<String>,
}
