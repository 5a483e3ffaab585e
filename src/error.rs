use std::fmt;

use thiserror::Error;

/// Errors that can occur in the sync core
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the reconciliation engine
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// An error from the profile resolver
    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    /// An error from the transport collaborator
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Result type for sync operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while folding a sync response
///
/// None of these abort the pass; the offending section is skipped and the
/// rest of the response still applies.
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    /// A response section was present but not of the expected shape
    #[error("Malformed section: {context}")]
    MalformedSection {
        /// Where in the response the bad shape was found
        context: String,
    },
}

/// Errors that can occur while resolving member profiles
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    /// The lookup collaborator could not produce a profile
    #[error("Profile lookup failed for {user_id}: {reason}")]
    LookupFailed {
        /// User the lookup was for
        user_id: String,
        /// Collaborator-supplied failure description
        reason: String,
    },

    /// The lookup was cancelled before completing
    #[error("Profile lookup cancelled for {user_id}")]
    Cancelled {
        /// User the lookup was for
        user_id: String,
    },
}

impl ProfileError {
    /// Create a new LookupFailed error
    pub fn lookup_failed<E: fmt::Display>(user_id: impl Into<String>, error: E) -> Self {
        Self::LookupFailed { user_id: user_id.into(), reason: error.to_string() }
    }
}

/// Failures surfaced by the transport collaborator
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// The poll request could not be completed
    #[error("Network failure: {0}")]
    Network(String),

    /// The response body could not be decoded
    #[error("Malformed response body: {0}")]
    Decode(String),
}

impl TransportError {
    /// Create a new Network error
    pub fn network<E: fmt::Display>(error: E) -> Self {
        Self::Network(error.to_string())
    }

    /// Create a new Decode error
    pub fn decode<E: fmt::Display>(error: E) -> Self {
        Self::Decode(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_errors_convert_into_the_top_error() {
        let error: Error = TransportError::network("connection reset").into();
        assert_eq!(error.to_string(), "Transport error: Network failure: connection reset");

        let error: Error = ProfileError::lookup_failed("@claire:bar", "404").into();
        assert_eq!(
            error.to_string(),
            "Profile error: Profile lookup failed for @claire:bar: 404"
        );

        let error: Error =
            SyncError::MalformedSection { context: "rooms[!r:hs].state".to_owned() }.into();
        assert_eq!(error.to_string(), "Sync error: Malformed section: rooms[!r:hs].state");
    }
}
