//! Application services composing the domain contracts.

pub mod health;
pub mod relay;
pub mod sync;
pub mod vector;

pub use health::{HealthReport, HealthService, SubsystemHealth};
pub use relay::{accumulate, ChannelAddr, ChannelPublisher, StreamRelay};
pub use sync::{IntervalTicker, ItemRef, ManualTicker, MetadataSource, SyncEngine, Ticker};
pub use vector::VectorService;
