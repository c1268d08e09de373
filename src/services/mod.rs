pub mod booking_service;
pub mod interview_service;
pub mod notification_service;
pub mod slot_service;
pub mod state_machine;
