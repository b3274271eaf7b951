// Raw frame dispatch: exposure reconciliation and forwarding.

pub mod dispatcher;
pub mod stats;

pub use dispatcher::{dispatch_cycle, CycleOutcome, DispatchConfig, FrameDispatcher};
pub use stats::{DispatchSnapshot, DispatchStats};
