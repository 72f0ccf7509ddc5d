pub mod actions;
pub mod cache;
pub mod config;
pub mod controller;
pub mod tasks;

pub use actions::{GraphAction, GraphAnswer, Notification, NotificationLevel};
pub use cache::CommitDetailCache;
pub use config::LogConfig;
pub use controller::{LogUpdate, VcsLogController};
pub use tasks::TaskQueue;
