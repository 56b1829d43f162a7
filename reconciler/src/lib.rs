//! Daily job that turns open incidents into service-desk tickets, marks them
//! resolved and sends an SMS alert per ticket.

pub mod channel;
pub mod config;
pub mod cycle;
pub mod error;
pub mod schedule;
pub mod ticketing;
pub mod types;

pub use channel::SmsClient;
pub use config::{
    DEFAULT_CONFIG_PATH, ReconcilerConfig, ScheduleConfig, SmsConfig, TicketTemplate,
    TicketingConfig, load_config,
};
pub use cycle::{Reconciler, sms_message};
pub use error::ServiceError;
pub use schedule::{delay_until_next, next_run_after, parse_run_at};
pub use ticketing::TicketingClient;
pub use types::{AuthToken, CycleReport, TicketReceipt};
