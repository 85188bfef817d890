//! Database model modules - extends Database with domain-specific methods
//!
//! Each module adds `impl Database` blocks with methods for a specific table group.

mod attendance;      // attendance
mod children;        // children
mod contact;         // contact_messages
mod enrollments;     // enrollments
mod events;          // events, event_rsvps
mod feedback;        // feedback
mod gallery;         // gallery_items
mod groups;          // kid_groups
mod journal;         // journal_entries
mod menus;           // dishes, menu_entries
mod messages;        // messages, notifications
mod payments;        // payments
pub mod reports;     // read-only aggregates across tables
mod users;           // users, auth_sessions

pub use children::ChildFilter;
pub use gallery::NewGalleryItem;
pub use journal::JournalFilter;
pub use payments::PaymentFilter;
