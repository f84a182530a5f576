pub mod ids;
pub mod message;
pub mod record;
pub mod priority;
pub mod events;

pub use ids::JobId;
pub use message::{JobMessage, StoredMessage};
pub use record::{JobStatus, QueueInfo, ReservedJob};
pub use priority::{JobPriority, Lane};
pub use events::{JobEvent, SweepSource};
