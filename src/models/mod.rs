pub mod interview;
pub mod notification_log;
pub mod slot;
pub mod user;
