pub mod dispatch;

pub use dispatch::{DeliveryOutcome, DispatchSettings, DispatchWorker, TickSummary};
