/// Backend-issued job identifier. Opaque to everything but the backend.
pub type JobId = String;

/// Identifier the master assigns to a worker node when it connects.
pub type NodeId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
