//! Cron-driven execution of the daily reminder job.

pub mod cron;
pub mod engine;

pub use self::cron::JobSchedule;
pub use self::engine::run_scheduler_loop;
