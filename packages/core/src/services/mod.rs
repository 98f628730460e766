//! Business Services
//!
//! The concrete policy and service layer riding on the generic store:
//!
//! - `TaskMapService` - the main task store with its full policy pipeline
//! - `RecurrenceService` - recurrence computation and clock subscriptions
//! - `SharingPolicy` / `TaskTagsService` / `AutoExpiryPolicy` - cascade
//!   policies for sharing, the tag index, and retention
//! - `TrackedItemMapService` / `UpgradeMapService` - auxiliary variants
//! - `UserSettingsStore` - reactive per-user configuration

pub mod expiry;
pub mod recurrence;
pub mod settings;
pub mod sharing;
pub mod tags;
pub mod task_map;
pub mod tracked_item_map;
pub mod upgrade_map;

pub use expiry::AutoExpiryPolicy;
pub use recurrence::RecurrenceService;
pub use settings::{UserSettingsStore, USER_SETTINGS_CACHE_KEY};
pub use sharing::SharingPolicy;
pub use tags::TaskTagsService;
pub use task_map::{TaskMapService, TASK_MAP_CACHE_KEY};
pub use tracked_item_map::{TrackedItemMapService, TRACKED_ITEM_MAP_CACHE_KEY};
pub use upgrade_map::{UpgradeMapService, UPGRADE_MAP_CACHE_KEY};
