pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::config::Config;
use crate::database::ledger::InterviewLedger;
use crate::services::{
    booking_service::BookingService,
    interview_service::InterviewService,
    notification_service::Notifier,
    slot_service::{SlotProvider, SlotService},
    state_machine::StartPolicy,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub ledger_backend: &'static str,
    pub booking_service: BookingService,
    pub interview_service: InterviewService,
    pub slot_service: SlotService,
}

impl AppState {
    pub fn new(
        config: Config,
        ledger: Arc<dyn InterviewLedger>,
        notifier: Arc<dyn Notifier>,
        slot_provider: Arc<dyn SlotProvider>,
    ) -> Self {
        let ledger_backend = if config.database_url.is_some() {
            "postgres"
        } else {
            "memory"
        };
        let booking_service = BookingService::new(ledger.clone(), notifier.clone(), &config);
        let interview_service =
            InterviewService::new(ledger.clone(), notifier, StartPolicy::from_config(&config));
        let slot_service = SlotService::new(slot_provider, ledger);

        Self {
            config: Arc::new(config),
            ledger_backend,
            booking_service,
            interview_service,
            slot_service,
        }
    }
}
