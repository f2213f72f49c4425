use async_trait::async_trait;
use serde::Serialize;

use crate::error::EmailError;
use crate::notifier::{render, NotificationPayload, Notifier, TemplateKind};
use crate::validators::normalize_email;

/// Sends account notifications through an HTTP email API (`POST {base_url}/email`).
#[derive(Clone)]
pub struct EmailClient {
    http_client: reqwest::Client,
    base_url: String,
    sender: SenderAddress,
}

#[derive(Clone, Debug)]
pub struct SenderAddress(String);

impl SenderAddress {
    pub fn parse(s: &str) -> Result<Self, EmailError> {
        let email = normalize_email(s)
            .map_err(|e| EmailError::ConfigurationError(format!("sender: {}", e)))?;
        Ok(Self(email))
    }

    pub fn inner(&self) -> &str {
        &self.0
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html_body: &'a str,
    tag: TemplateKind,
}

impl EmailClient {
    pub fn new(
        base_url: String,
        sender: SenderAddress,
        timeout: std::time::Duration,
    ) -> Result<Self, EmailError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmailError::ConfigurationError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
            sender,
        })
    }

    pub async fn send_email(
        &self,
        recipient: &str,
        subject: &str,
        html_content: &str,
        tag: TemplateKind,
    ) -> Result<(), EmailError> {
        let url = format!("{}/email", self.base_url);
        let request = SendEmailRequest {
            from: self.sender.inner(),
            to: recipient,
            subject,
            html_body: html_content,
            tag,
        };

        self.http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to reach email service");
                EmailError::SendFailed(e.to_string())
            })?
            .error_for_status()
            .map_err(|e| {
                tracing::error!(error = %e, "Email service returned error");
                EmailError::ServiceUnavailable(e.to_string())
            })?;

        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailClient {
    async fn send(
        &self,
        kind: TemplateKind,
        recipient: &str,
        payload: &NotificationPayload,
    ) -> Result<(), EmailError> {
        let recipient = normalize_email(recipient)
            .map_err(|_| EmailError::InvalidRecipient("recipient address".to_string()))?;
        let email = render(kind, payload);

        self.send_email(&recipient, &email.subject, &email.html, kind).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_address_parse_valid_email() {
        let sender = SenderAddress::parse("No-Reply@Example.com").unwrap();
        assert_eq!(sender.inner(), "no-reply@example.com");
    }

    #[test]
    fn sender_address_parse_invalid_email() {
        assert!(matches!(
            SenderAddress::parse("invalid-email"),
            Err(EmailError::ConfigurationError(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_service_is_a_send_failure() {
        let client = EmailClient::new(
            // Port 9 on localhost is discard; nothing answers HTTP there
            "http://127.0.0.1:9".to_string(),
            SenderAddress::parse("no-reply@example.com").unwrap(),
            std::time::Duration::from_millis(200),
        )
        .unwrap();

        let payload = NotificationPayload {
            full_name: "Ana Perez".to_string(),
            email: "ana@example.com".to_string(),
            url: None,
        };
        let result = client.send(TemplateKind::Welcome, "ana@example.com", &payload).await;
        assert!(matches!(result, Err(EmailError::SendFailed(_))));
    }
}
