//! Services
//!
//! The moving parts of the recorder: file watching, diffing, broadcast
//! fan-out, and the background analysis components.

pub mod architecture;
pub mod baseline;
pub mod broadcaster;
pub mod correlator;
pub mod diff;
pub mod extract;
pub mod git;
pub mod ignore;
pub mod summary;
pub mod supervisor;
pub mod tasks;
pub mod text;
pub mod watcher;

pub use architecture::ArchitectureTracker;
pub use broadcaster::Broadcaster;
pub use correlator::Correlator;
pub use summary::Summarizer;
pub use supervisor::WatcherSupervisor;
pub use tasks::TaskPool;
