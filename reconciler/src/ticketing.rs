use core_types::IncidentRecord;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::config::TicketingConfig;
use crate::error::ServiceError;
use crate::types::{AuthToken, TicketReceipt};

const SERVICE: &str = "service desk";

/// Client for the service-desk REST API.
#[derive(Debug, Clone)]
pub struct TicketingClient {
    http: reqwest::Client,
    config: TicketingConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthRequest<'a> {
    console_type: i64,
    password: &'a str,
    provider_id: i64,
    user_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TicketPayload {
    applicant_id: i64,
    category_id: i64,
    company_id: i64,
    contract_id: i64,
    console_type: &'static str,
    current_time: i64,
    customer_id: i64,
    description: String,
    foreground_color_rgb: &'static str,
    group_id: i64,
    impact_id: i64,
    instance: i64,
    is_fee_available: bool,
    item_type: i64,
    item_version: i64,
    model_id: i64,
    priority_reason: &'static str,
    project_id: i64,
    reason_id: i64,
    registry_type_id: i64,
    service_id: i64,
    state_id: i64,
    subject: String,
    survey_token: &'static str,
    list_additional_field: Vec<Value>,
    temp_item_id: i64,
}

impl TicketingClient {
    pub fn new(config: TicketingConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ServiceError::transport(SERVICE, e))?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    pub async fn authenticate(&self) -> Result<AuthToken, ServiceError> {
        let password = self
            .config
            .password
            .as_deref()
            .ok_or(ServiceError::NotConfigured("service desk password"))?;

        let body = AuthRequest {
            console_type: self.config.console_type,
            password,
            provider_id: self.config.provider_id,
            user_name: &self.config.user_name,
        };

        let res = self
            .http
            .post(self.url("authentication/"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::transport(SERVICE, e))?;

        if !res.status().is_success() {
            return Err(ServiceError::from_response(SERVICE, res).await);
        }

        let token: AuthToken = res.json().await.map_err(|e| ServiceError::Malformed {
            service: SERVICE,
            detail: format!("authentication body: {e}"),
        })?;
        if token.token.trim().is_empty() {
            return Err(ServiceError::Malformed {
                service: SERVICE,
                detail: "empty token".to_string(),
            });
        }
        Ok(token)
    }

    pub async fn create_ticket(
        &self,
        token: &AuthToken,
        incident: &IncidentRecord,
    ) -> Result<TicketReceipt, ServiceError> {
        let payload = self.payload(incident);

        let res = self
            .http
            .post(self.url("item/"))
            .header("X-Authorization", format!("Bearer {}", token.token))
            .json(&payload)
            .send()
            .await
            .map_err(|e| ServiceError::transport(SERVICE, e))?;

        let status = res.status();
        if !status.is_success() {
            return Err(ServiceError::from_response(SERVICE, res).await);
        }

        let body: Value = res.json().await.unwrap_or(Value::Null);
        debug!(?body, "ticket created");
        Ok(TicketReceipt {
            status: status.as_u16(),
            ticket_id: ticket_id(&body),
        })
    }

    fn payload(&self, incident: &IncidentRecord) -> TicketPayload {
        let t = &self.config.template;
        TicketPayload {
            applicant_id: t.applicant_id,
            category_id: t.category_id,
            company_id: t.company_id,
            contract_id: t.contract_id,
            console_type: "specialist",
            current_time: 0,
            customer_id: t.customer_id,
            description: ticket_description(&t.subject_prefix, incident),
            foreground_color_rgb: "",
            group_id: t.group_id,
            impact_id: t.impact_id,
            instance: t.instance,
            is_fee_available: true,
            item_type: t.item_type,
            item_version: 0,
            model_id: t.model_id,
            priority_reason: "",
            project_id: t.project_id,
            reason_id: t.reason_id,
            registry_type_id: t.registry_type_id,
            service_id: t.service_id,
            state_id: t.state_id,
            subject: ticket_subject(&t.subject_prefix, incident),
            survey_token: "",
            list_additional_field: vec![json!({})],
            temp_item_id: -1,
        }
    }
}

/// `[incident:<id>] <host>`: lets the desk spot a ticket raised twice for the
/// same incident.
pub fn incident_tag(incident: &IncidentRecord) -> String {
    match incident.id {
        Some(id) => format!("[incident:{id}] {}", incident.host_name),
        None => format!("[incident:?] {}", incident.host_name),
    }
}

pub fn ticket_subject(prefix: &str, incident: &IncidentRecord) -> String {
    format!("{prefix} {}", incident_tag(incident))
}

pub fn ticket_description(prefix: &str, incident: &IncidentRecord) -> String {
    format!(
        "{prefix} {tag}\n\
         Serial: {serial}\n\
         User: {user} ({domain})\n\
         Public IP: {ip}  MAC: {mac}\n\
         Hardware: {manufacturer} {model}\n\
         CPU {cpu}%  Memory {mem}%  Disk {disk}%  Temperature {temp}°C\n\
         Detected at {at}",
        tag = incident_tag(incident),
        serial = incident.serial_number,
        user = incident.user,
        domain = incident.domain,
        ip = incident.public_ip,
        mac = incident.mac,
        manufacturer = incident.manufacturer,
        model = incident.model,
        cpu = incident.cpu_usage,
        mem = incident.memory_usage,
        disk = incident.disk_usage,
        temp = incident.temperature,
        at = incident.incident_at,
    )
}

fn ticket_id(body: &Value) -> Option<i64> {
    body.as_i64()
        .or_else(|| body.get("id").and_then(Value::as_i64))
        .or_else(|| body.get("itemId").and_then(Value::as_i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::IncidentStatus;

    fn incident() -> IncidentRecord {
        IncidentRecord {
            id: Some(42),
            host_name: "PC01".into(),
            serial_number: "SN1".into(),
            cpu_usage: 95,
            memory_usage: 40,
            disk_usage: 50,
            temperature: 60,
            incident_at: "2025-06-02 17:20:00".into(),
            status: IncidentStatus::Open,
            domain: "CORP".into(),
            public_ip: "198.51.100.4".into(),
            user: "mlopez".into(),
            mac: "00:1A".into(),
            manufacturer: "HP".into(),
            model: "EliteBook".into(),
        }
    }

    #[test]
    fn subject_and_description_carry_the_incident_tag() {
        let inc = incident();
        assert_eq!(ticket_subject("Alert", &inc), "Alert [incident:42] PC01");
        let desc = ticket_description("Alert", &inc);
        assert!(desc.starts_with("Alert [incident:42] PC01\n"));
        assert!(desc.contains("CPU 95%"));
        assert!(desc.contains("Temperature 60°C"));
    }

    #[test]
    fn payload_has_the_fixed_shape() {
        let client = TicketingClient::new(TicketingConfig::default()).unwrap();
        let value = serde_json::to_value(client.payload(&incident())).unwrap();
        assert_eq!(value["consoleType"], "specialist");
        assert_eq!(value["categoryId"], 6941);
        assert_eq!(value["tempItemId"], -1);
        assert_eq!(value["isFeeAvailable"], true);
        assert_eq!(value["listAdditionalField"], json!([{}]));
        assert_eq!(value["subject"], "Workstation incident [incident:42] PC01");
    }

    #[test]
    fn ticket_id_shapes() {
        assert_eq!(ticket_id(&json!(7)), Some(7));
        assert_eq!(ticket_id(&json!({"id": 8})), Some(8));
        assert_eq!(ticket_id(&json!({"itemId": 9})), Some(9));
        assert_eq!(ticket_id(&json!({"other": 1})), None);
        assert_eq!(ticket_id(&Value::Null), None);
    }
}
