mod types;

pub use types::{ApplicationStatus, Category, DestinationId};
