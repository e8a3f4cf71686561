use crate::time::Micros;
use serde::{Deserialize, Serialize};

/// Outcome of reading one object.
///
/// Failures other than "not found" are reported through the surrounding
/// `Result`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    /// The object exists and was decoded
    Found(T),
    /// The appliance reports no such object
    NotFound,
}

impl<T> Lookup<T> {
    /// Whether the object exists
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    /// Borrow the decoded object
    pub fn found(&self) -> Option<&T> {
        match self {
            Lookup::Found(v) => Some(v),
            Lookup::NotFound => None,
        }
    }

    /// Convert into an `Option`, dropping the distinction from errors
    pub fn into_option(self) -> Option<T> {
        match self {
            Lookup::Found(v) => Some(v),
            Lookup::NotFound => None,
        }
    }

    /// Map the decoded object
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Lookup<U> {
        match self {
            Lookup::Found(v) => Lookup::Found(f(v)),
            Lookup::NotFound => Lookup::NotFound,
        }
    }
}

impl<T> From<Lookup<T>> for Option<T> {
    fn from(lookup: Lookup<T>) -> Self {
        lookup.into_option()
    }
}

/// Status returned by the upload namespace after a chunk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStatus {
    /// Bytes the appliance still expects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_byte_count: Option<u64>,

    /// Declared total size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_byte_count: Option<u64>,

    /// Where the appliance stored the file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_file_path: Option<String>,

    /// Last modification of the upload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_micros: Option<Micros>,
}
