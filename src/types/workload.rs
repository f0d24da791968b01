// ABOUTME: Identifier for a workload instance that references an image.
// ABOUTME: Primary instances render as `app`, deployment slots as `app/slot`.

use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WorkloadInstance {
    /// The instance's active (production) configuration.
    Primary { app: String },
    /// A secondary deployment environment of an instance.
    Slot { app: String, slot: String },
}

impl WorkloadInstance {
    pub fn primary(app: impl Into<String>) -> Self {
        Self::Primary { app: app.into() }
    }

    pub fn slot(app: impl Into<String>, slot: impl Into<String>) -> Self {
        Self::Slot {
            app: app.into(),
            slot: slot.into(),
        }
    }

    pub fn app(&self) -> &str {
        match self {
            Self::Primary { app } | Self::Slot { app, .. } => app,
        }
    }
}

impl fmt::Display for WorkloadInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary { app } => write!(f, "{app}"),
            Self::Slot { app, slot } => write!(f, "{app}/{slot}"),
        }
    }
}

impl Serialize for WorkloadInstance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
