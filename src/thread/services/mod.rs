//! Orchestration services: relay, closure scheduling, the per-thread state
//! machine, and the registry.

mod error;
mod manager;
mod relay;
mod scheduler;
mod thread;

pub use error::{ThreadError, ThreadResult};
pub use manager::{
    GENESIS_SCAN_LIMIT, ManagerSettings, ThreadManager, ThreadRegistry,
    disambiguate_channel_name, extract_correspondent_id, topic_for,
};
pub use relay::{MessageRelay, RelayParams, build_mirror_card, role_footer};
pub use scheduler::ClosureScheduler;
pub use thread::{EDIT_SCAN_LIMIT, Thread};
