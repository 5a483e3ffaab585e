//! Pure protocol types shared across the crate.

pub mod event;
pub mod event_kind;
pub mod member_content;
pub mod membership_state;
pub mod power_levels_content;
pub mod presence_content;
pub mod presence_state;
pub mod profile;
pub mod receipt_content;
pub mod room_name_content;
pub mod room_topic_content;
pub mod sync;
pub mod typing_content;

pub use event::Event;
pub use event_kind::EventKind;
pub use member_content::MemberEventContent;
pub use membership_state::MembershipState;
pub use power_levels_content::PowerLevelsEventContent;
pub use presence_content::PresenceEventContent;
pub use presence_state::PresenceState;
pub use profile::ProfileInfo;
pub use receipt_content::{ReceiptData, ReceiptEventContent};
pub use room_name_content::RoomNameEventContent;
pub use room_topic_content::RoomTopicEventContent;
pub use sync::{
    InvitedRoomUpdate,
    JoinedRoomUpdate,
    LeftRoomUpdate,
    RoomsUpdate,
    SyncResponse,
};
pub use typing_content::TypingEventContent;
