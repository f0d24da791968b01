// ABOUTME: Diagnostics accumulator for skippable problems during a sweep.
// ABOUTME: Collects warnings that exclude one unit but never abort the run.

/// Collects non-fatal warnings during a reconciliation run.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Count warnings of one kind.
    pub fn count(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }
}

/// A non-fatal warning collected during a run.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unparseable_timestamp(message: impl Into<String>) -> Self {
        Self::new(WarningKind::UnparseableTimestamp, message)
    }

    pub fn undated_manifest(message: impl Into<String>) -> Self {
        Self::new(WarningKind::UndatedManifest, message)
    }

    pub fn invalid_digest(message: impl Into<String>) -> Self {
        Self::new(WarningKind::InvalidDigest, message)
    }

    pub fn unreadable_config(message: impl Into<String>) -> Self {
        Self::new(WarningKind::UnreadableConfig, message)
    }

    pub fn unresolved_reference(message: impl Into<String>) -> Self {
        Self::new(WarningKind::UnresolvedReference, message)
    }

    pub fn audit_write(message: impl Into<String>) -> Self {
        Self::new(WarningKind::AuditWrite, message)
    }
}

/// Categories of warnings that can occur during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Manifest creation time could not be parsed; kept without a timestamp.
    UnparseableTimestamp,
    /// Manifest has no creation time; excluded from age filtering.
    UndatedManifest,
    /// Manifest digest missing or malformed; excluded from the catalog.
    InvalidDigest,
    /// A workload configuration could not be read; that instance is skipped.
    UnreadableConfig,
    /// An image reference could not be resolved; it protects nothing.
    UnresolvedReference,
    /// The audit file could not be written.
    AuditWrite,
}
