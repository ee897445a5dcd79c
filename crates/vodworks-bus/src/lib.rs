//! Redis Streams event bus.
//!
//! Upload events arrive on one stream consumed through a consumer group;
//! stage status events go out on one stream per stage family. Publication
//! is fire-and-forget from the pipeline's point of view: nothing awaits a
//! consumer.

pub mod bus;
pub mod error;

pub use bus::{stream_for, BusConfig, EventBus, EventPublisher, IncomingUpload};
pub use error::{BusError, BusResult};
