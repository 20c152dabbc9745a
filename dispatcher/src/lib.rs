pub mod clock;
pub mod scheduler;

pub use clock::SystemClock;
pub use scheduler::{screen, CycleReport, Scheduler, Skip};
