//! Server statistics: parsing, live reporting, and the polling task

pub mod poller;
pub mod reporter;

pub use poller::run_poller;
pub use reporter::Reporter;

use crate::error::{ErrorPolicy, HeapgrowError, Result};
use std::collections::HashMap;

pub const HEAP_SIZE: &str = "heap_size";
pub const NUM_OBJECTS: &str = "num_objects";
pub const NUM_HOOK_GROUPS: &str = "tile38_num_hook_groups";
pub const NUM_OBJECT_GROUPS: &str = "tile38_num_object_groups";

/// Bytes to GiB
pub fn gib(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0 / 1024.0
}

/// The handful of numbers the reporter shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStats {
    pub heap_size: u64,
    pub num_objects: u64,
    pub num_hook_groups: u64,
    pub num_object_groups: u64,
}

impl ServerStats {
    /// Extract from the `SERVER` and `SERVER EXT` replies
    ///
    /// Under [`ErrorPolicy::Degrade`] a missing or non-numeric field reads as zero.
    pub fn from_maps(
        server: &HashMap<String, String>,
        ext: &HashMap<String, String>,
        policy: ErrorPolicy,
    ) -> Result<Self> {
        Ok(Self {
            heap_size: field(server, HEAP_SIZE, policy)?,
            num_objects: field(server, NUM_OBJECTS, policy)?,
            num_hook_groups: field(ext, NUM_HOOK_GROUPS, policy)?,
            num_object_groups: field(ext, NUM_OBJECT_GROUPS, policy)?,
        })
    }
}

fn field(map: &HashMap<String, String>, name: &str, policy: ErrorPolicy) -> Result<u64> {
    let raw = map.get(name).map(|v| v.trim());
    match raw.and_then(|v| v.parse::<u64>().ok()) {
        Some(n) => Ok(n),
        None if policy.is_fatal() => Err(HeapgrowError::StatField {
            field: name.to_string(),
            value: raw.unwrap_or("<missing>").to_string(),
        }),
        None => {
            log::trace!("Stat field {} unreadable ({:?}), using 0", name, raw);
            Ok(0)
        }
    }
}
