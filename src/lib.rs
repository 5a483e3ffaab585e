//! Client-side sync engine for a Matrix-style federated messaging
//! protocol.
//!
//! A remote server periodically delivers incremental sync responses
//! describing changes to the rooms a user participates in. This crate folds
//! each response into durable client-side state — per-room membership,
//! metadata, timelines, receipts, and global presence — preserving the
//! protocol's ordering and consistency guarantees, and fans out typed
//! change notifications after every reconciliation pass.
//!
//! The poll transport, the profile lookup endpoint, persistence, and
//! encryption are collaborators behind the [`client::SyncTransport`] and
//! [`resolver::ProfileSource`] traits; this crate owns only the
//! reconciliation semantics.

pub mod client;
pub mod directory;
pub mod error;
pub mod member;
pub mod receipts;
pub mod resolver;
pub mod room;
pub mod sync;
pub mod timeline;
pub mod types;

#[cfg(test)]
mod testutil;

pub use client::{
    BackoffPolicy,
    ClientState,
    ExponentialBackoff,
    SyncClient,
    SyncTransport,
};
pub use directory::{User, UserDirectory};
pub use error::{Error, ProfileError, Result, SyncError, TransportError};
pub use member::RoomMember;
pub use receipts::{ReceiptEntry, ReceiptStore};
pub use resolver::{NullProfileSource, ProfileResolver, ProfileSource, ResolvedProfile};
pub use room::{Room, RoomState, EMPTY_ROOM_NAME};
pub use sync::{
    AppliedSync,
    MemberChange,
    SyncConfig,
    SyncEngine,
    SyncState,
    SyncUpdate,
};
pub use timeline::Timeline;
pub use types::*;
