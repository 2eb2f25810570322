pub mod ddim;
pub mod error;
pub mod euler;
pub mod euler_ancestral;
pub mod schedule;
pub mod scheduler;

pub use ddim::DdimScheduler;
pub use error::{Result, SchedulerError};
pub use euler::EulerDiscreteScheduler;
pub use euler_ancestral::EulerAncestralScheduler;
pub use schedule::NoiseSchedule;
pub use scheduler::{Scheduler, SchedulerKind, SchedulerMode};
