pub mod history;
pub mod job;
pub mod scheduler;

pub use history::{HistoryRange, HistoryService};
pub use job::MoodJob;
pub use scheduler::DailyScheduler;
