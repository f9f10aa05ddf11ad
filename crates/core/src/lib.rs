pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod markup;
pub mod platform;
pub mod reference;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use audit::{AuditActor, AuditEntry, AuditRecorder, AuditStore, AuditStoreError};
pub use domain::event::{EventDetail, EventId, EventRef};
pub use domain::guest::{DecisionStatus, Guest, GuestStatus};
pub use errors::InterfaceError;
pub use markup::escape_markdown_v2;
pub use platform::{EventPage, EventPlatform, GuestPage, GuestStatusUpdate, PlatformError};
pub use reference::{AmbiguityMatch, EventMention, Grounding, ReferenceResolver, ResolveError};
