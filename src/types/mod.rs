// ABOUTME: Validated domain types shared by the engine and its collaborators.
// ABOUTME: Digests, image references, workload identifiers and registry names.

mod digest;
mod image_ref;
mod registry_name;
mod workload;

pub use digest::{Digest, ParseDigestError};
pub use image_ref::{DEFAULT_TAG, ImageReference, ParseImageRefError, ReferenceTarget};
pub use registry_name::{LOGIN_SERVER_SUFFIX, RegistryName, RegistryNameError};
pub use workload::WorkloadInstance;
