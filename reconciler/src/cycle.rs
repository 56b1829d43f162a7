use std::sync::Arc;

use core_types::IncidentRecord;
use storage::IncidentStore;
use tracing::{error, info, warn};

use crate::channel::SmsClient;
use crate::error::ServiceError;
use crate::ticketing::{TicketingClient, incident_tag};
use crate::types::CycleReport;

/// What happened to a single incident within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    /// Ticket raised, row resolved, SMS out.
    Done { sms_sent: bool },
    /// Ticket raised but the row could not be resolved; it will be
    /// ticketed again next cycle.
    TicketedUnresolved { sms_sent: bool },
    Failed,
}

pub struct Reconciler {
    store: Arc<dyn IncidentStore>,
    ticketing: TicketingClient,
    sms: SmsClient,
}

impl Reconciler {
    pub fn new(store: Arc<dyn IncidentStore>, ticketing: TicketingClient, sms: SmsClient) -> Self {
        Self {
            store,
            ticketing,
            sms,
        }
    }

    /// Polls open incidents and works through them one at a time. A failure
    /// on one incident never stops the others.
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        let incidents = match self.store.open_incidents().await {
            Ok(list) => list,
            Err(e) => {
                error!("polling open incidents failed: {e}");
                report.poll_failed = true;
                return report;
            }
        };
        report.polled = incidents.len();
        if incidents.is_empty() {
            info!("no open incidents");
            return report;
        }
        info!("{} open incident(s) to reconcile", incidents.len());

        for incident in &incidents {
            match self.process(incident).await {
                Outcome::Done { sms_sent } => {
                    report.ticketed += 1;
                    report.resolved += 1;
                    report.sms_sent += usize::from(sms_sent);
                }
                Outcome::TicketedUnresolved { sms_sent } => {
                    report.ticketed += 1;
                    report.sms_sent += usize::from(sms_sent);
                    report.failed += 1;
                }
                Outcome::Failed => report.failed += 1,
            }
        }

        info!(
            polled = report.polled,
            ticketed = report.ticketed,
            resolved = report.resolved,
            sms_sent = report.sms_sent,
            failed = report.failed,
            "cycle finished"
        );
        report
    }

    async fn process(&self, incident: &IncidentRecord) -> Outcome {
        let tag = incident_tag(incident);
        let Some(id) = incident.id else {
            warn!("{tag}: row without id, skipped");
            return Outcome::Failed;
        };

        // A fresh token per incident; tokens are not reused across tickets.
        let token = match self.ticketing.authenticate().await {
            Ok(token) => token,
            Err(e) => {
                error!("{tag}: authentication failed: {e}");
                return Outcome::Failed;
            }
        };

        match self.ticketing.create_ticket(&token, incident).await {
            Ok(receipt) => match receipt.ticket_id {
                Some(ticket) => info!("{tag}: ticket {ticket} created"),
                None => info!("{tag}: ticket created (status {})", receipt.status),
            },
            Err(e) => {
                error!("{tag}: ticket creation failed: {e}");
                return Outcome::Failed;
            }
        }

        let resolved = match self.store.mark_resolved(id).await {
            Ok(()) => true,
            Err(e) => {
                error!("{tag}: ticket exists but status update failed: {e}");
                false
            }
        };

        let sms_sent = match self.notify(incident).await {
            Ok(()) => true,
            Err(e) => {
                warn!("{tag}: sms not sent: {e}");
                false
            }
        };

        if resolved {
            Outcome::Done { sms_sent }
        } else {
            Outcome::TicketedUnresolved { sms_sent }
        }
    }

    async fn notify(&self, incident: &IncidentRecord) -> Result<(), ServiceError> {
        let message = sms_message(self.sms.message_prefix(), incident);
        self.sms.send(&message).await
    }
}

pub fn sms_message(prefix: &str, incident: &IncidentRecord) -> String {
    format!(
        "{prefix}: {host} ({user}) CPU {cpu}% MEM {mem}% TEMP {temp}C at {at}",
        host = incident.host_name,
        user = incident.user,
        cpu = incident.cpu_usage,
        mem = incident.memory_usage,
        temp = incident.temperature,
        at = incident.incident_at,
    )
}
