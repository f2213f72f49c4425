//! Outbound account notifications.
//!
//! The token lifecycle only knows the `Notifier` trait. Delivery is best
//! effort: a failed send is logged by the caller and never undoes the token
//! write that preceded it.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::error::EmailError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    EmailVerification,
    PasswordReset,
    Welcome,
    PasswordChanged,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationPayload {
    pub full_name: String,
    pub email: String,
    /// Link carrying the token, for the kinds that have one
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

/// Builds the subject and HTML body. The name and link are user influenced
/// and are escaped before they reach the markup.
pub fn render(kind: TemplateKind, payload: &NotificationPayload) -> RenderedEmail {
    let name = html_escape::encode_text(&payload.full_name);
    let link =
        html_escape::encode_double_quoted_attribute(payload.url.as_deref().unwrap_or_default());

    let (subject, body) = match kind {
        TemplateKind::EmailVerification => (
            "Verify your email address",
            format!(
                "<p>Hi {name},</p><p>Confirm your email address by opening \
                 <a href=\"{link}\">this link</a>.</p>"
            ),
        ),
        TemplateKind::PasswordReset => (
            "Reset your password",
            format!(
                "<p>Hi {name},</p><p>Choose a new password at \
                 <a href=\"{link}\">this link</a>. \
                 If you did not ask for a reset you can ignore this email.</p>"
            ),
        ),
        TemplateKind::Welcome => (
            "Welcome aboard",
            format!("<p>Hi {name},</p><p>Your email is verified and your account is ready.</p>"),
        ),
        TemplateKind::PasswordChanged => (
            "Your password was changed",
            format!(
                "<p>Hi {name},</p><p>The password for this account was just changed. \
                 If this was not you, reset it immediately.</p>"
            ),
        ),
    };

    RenderedEmail {
        subject: subject.to_string(),
        html: body,
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        kind: TemplateKind,
        recipient: &str,
        payload: &NotificationPayload,
    ) -> Result<(), EmailError>;
}

#[derive(Debug, Clone)]
pub struct Delivery {
    pub kind: TemplateKind,
    pub recipient: String,
    pub payload: NotificationPayload,
}

impl Delivery {
    /// The `token` query parameter of the delivered link
    pub fn token(&self) -> Option<&str> {
        let url = self.payload.url.as_deref()?;
        let (_, query) = url.split_once('?')?;
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix("token="))
    }
}

/// Keeps every delivery in memory instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    deliveries: Mutex<Vec<Delivery>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every send fails with `ServiceUnavailable` and nothing is recorded
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.lock().clone()
    }

    pub fn last(&self, kind: TemplateKind, recipient: &str) -> Option<Delivery> {
        self.lock()
            .iter()
            .rev()
            .find(|d| d.kind == kind && d.recipient == recipient)
            .cloned()
    }

    pub fn last_token(&self, kind: TemplateKind, recipient: &str) -> Option<String> {
        self.last(kind, recipient)
            .and_then(|d| d.token().map(str::to_string))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Delivery>> {
        self.deliveries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(
        &self,
        kind: TemplateKind,
        recipient: &str,
        payload: &NotificationPayload,
    ) -> Result<(), EmailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EmailError::ServiceUnavailable(
                "recording notifier set to fail".to_string(),
            ));
        }

        self.lock().push(Delivery {
            kind,
            recipient: recipient.to_string(),
            payload: payload.clone(),
        });
        Ok(())
    }
}
