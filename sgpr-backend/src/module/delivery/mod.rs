//! Incremental delivery of listing records to subscribed destinations

mod channel;
pub mod registry;
pub mod tracker;

pub use channel::DeliveryChannel;
pub use registry::{DestinationRegistry, RegistryError, Snapshot, REGISTRY_FILE};
pub use tracker::{
    select_pending, CycleReport, DeliveryReport, DeliveryTracker, Progress, Watermarks,
    DEFAULT_LOOKBACK_HOURS, DEFAULT_SEND_TIMEOUT_SECS,
};
