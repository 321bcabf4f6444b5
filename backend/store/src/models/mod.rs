pub mod conversation;
pub mod donation;
pub mod notification;
pub mod rating;
pub mod slot;
pub mod user;

pub use conversation::{Conversation, DonationRef, DonationSummary, Message, PopulatedConversation};
pub use donation::{Category, Condition, Donation, DonationStatus, ImageLinks, Listing};
pub use notification::{Notification, NotificationKind};
pub use rating::{Rating, RatingSummary};
pub use slot::{PickupSlot, SlotStatus};
pub use user::{Role, User, UserRef, UserSummary};
