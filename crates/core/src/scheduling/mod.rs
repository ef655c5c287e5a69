//! Timezone-aware fetch scheduling

pub mod ports;
pub mod service;

pub use ports::{job_task, CronSchedule, JobScheduler, JobTask};
pub use service::SchedulerService;
