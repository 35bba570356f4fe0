use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Header carried by every input and output message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Header {
    /// Capture time, as the duration since the Unix epoch.
    pub stamp: Duration,
    /// Identifier of the coordinate frame the payload is expressed in.
    pub frame_id: String,
}

impl Header {
    /// Returns a new Header
    pub fn new(stamp: Duration, frame_id: impl Into<String>) -> Header {
        Header {
            stamp,
            frame_id: frame_id.into(),
        }
    }
}
