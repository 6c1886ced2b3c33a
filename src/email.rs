//! Simulated Email Notifications
//!
//! Nothing is delivered. Every "sent" email is appended to the
//! `emailNotifications` list in durable storage, where an inbox view can read
//! it back and mark it read.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{AdminRequest, EmailNotification};
use crate::storage::{keys, read_json, write_json, KeyValueStore, StorageError};

/// Default simulated delivery delay
pub const DEFAULT_SEND_DELAY: Duration = Duration::from_millis(1000);

/// Outbox for simulated notification emails
pub struct EmailService {
    store: Arc<dyn KeyValueStore>,
    site_email: String,
    send_delay: Duration,
    default_admin_password: String,
}

impl EmailService {
    pub fn new(store: Arc<dyn KeyValueStore>, site_email: impl Into<String>, send_delay: Duration) -> Self {
        Self {
            store,
            site_email: site_email.into(),
            send_delay,
            default_admin_password: crate::auth::DEFAULT_ADMIN_PASSWORD.to_string(),
        }
    }

    /// Override the password quoted in approval emails
    pub fn with_default_admin_password(mut self, password: impl Into<String>) -> Self {
        self.default_admin_password = password.into();
        self
    }

    /// Address that receives admin request notifications
    pub fn site_email(&self) -> &str {
        &self.site_email
    }

    /// Tell the site owner about a new admin request
    pub fn send_admin_request_notification(
        &self,
        request: &AdminRequest,
    ) -> Result<EmailNotification, StorageError> {
        let subject = "New admin account request";
        let body = format!(
            "A new admin account request was received:\n\n\
             Name: {} {}\n\
             Email: {}\n\
             Phone: {}\n\
             Position: {}\n\
             Reason: {}\n\
             Requested: {}\n\n\
             Log in to the admin dashboard to respond to this request.",
            request.first_name,
            request.last_name,
            request.email,
            request.phone,
            request.position,
            request.reason,
            request.request_date.format("%Y-%m-%d"),
        );

        let notification = self.store_notification(subject, &body, &self.site_email)?;
        info!("Admin request notification sent for {}", request.email);
        Ok(notification)
    }

    /// Subject and body telling the requester how their request was decided
    pub fn approval_message(&self, user_email: &str, approved: bool, reason: Option<&str>) -> (&'static str, String) {
        if approved {
            (
                "Admin account request approved",
                format!(
                    "Hello,\n\n\
                     Your request for an admin account has been approved.\n\n\
                     You can now log in with:\n\
                     Email: {}\n\
                     Default password: {}\n\n\
                     Please change your password after your first login.\n\n\
                     Thank you.",
                    user_email, self.default_admin_password,
                ),
            )
        } else {
            let reason_line = reason
                .filter(|r| !r.trim().is_empty())
                .map(|r| format!("Reason: {}\n", r))
                .unwrap_or_default();
            (
                "Admin account request rejected",
                format!(
                    "Hello,\n\n\
                     We are sorry, your request for an admin account has been rejected.\n\
                     {}\n\
                     If you have any questions, please contact us.\n\n\
                     Thank you.",
                    reason_line,
                ),
            )
        }
    }

    /// Tell the requester how their admin request was decided
    pub fn send_approval_notification(
        &self,
        user_email: &str,
        approved: bool,
        reason: Option<&str>,
    ) -> Result<EmailNotification, StorageError> {
        let (subject, body) = self.approval_message(user_email, approved, reason);

        let notification = self.store_notification(subject, &body, user_email)?;
        info!("Approval notification sent to {} (approved: {})", user_email, approved);
        Ok(notification)
    }

    /// Append a notification to the outbox
    pub fn store_notification(
        &self,
        subject: &str,
        body: &str,
        recipient: &str,
    ) -> Result<EmailNotification, StorageError> {
        let notification = EmailNotification {
            id: Uuid::new_v4().to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            recipient: recipient.to_string(),
            sent_at: Utc::now(),
            read: false,
        };

        let mut notifications = self.notifications();
        notifications.push(notification.clone());
        write_json(self.store.as_ref(), keys::EMAIL_NOTIFICATIONS, &notifications)?;

        debug!("Stored notification {} for {}", notification.id, recipient);
        Ok(notification)
    }

    /// All stored notifications, oldest first
    pub fn notifications(&self) -> Vec<EmailNotification> {
        read_json(self.store.as_ref(), keys::EMAIL_NOTIFICATIONS).unwrap_or_default()
    }

    /// Notifications addressed to one recipient
    pub fn notifications_for(&self, recipient: &str) -> Vec<EmailNotification> {
        self.notifications()
            .into_iter()
            .filter(|n| n.recipient == recipient)
            .collect()
    }

    /// Mark a notification read; returns false if the id is unknown
    pub fn mark_as_read(&self, notification_id: &str) -> Result<bool, StorageError> {
        let mut notifications = self.notifications();

        let Some(notification) = notifications.iter_mut().find(|n| n.id == notification_id) else {
            return Ok(false);
        };
        notification.read = true;

        write_json(self.store.as_ref(), keys::EMAIL_NOTIFICATIONS, &notifications)?;
        Ok(true)
    }

    pub fn unread_count(&self) -> usize {
        self.notifications().iter().filter(|n| !n.read).count()
    }

    /// Simulate sending an email: wait out the delivery delay, then store it
    pub async fn send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<EmailNotification, StorageError> {
        debug!("Sending email to {}: {}", to, subject);

        tokio::time::sleep(self.send_delay).await;

        self.store_notification(subject, body, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RequestStatus;
    use crate::storage::MemoryStore;

    fn service() -> EmailService {
        EmailService::new(Arc::new(MemoryStore::new()), "site@example.com", Duration::ZERO)
    }

    fn request() -> AdminRequest {
        AdminRequest {
            id: "req-1".into(),
            first_name: "Omar".into(),
            last_name: "Saleh".into(),
            email: "omar@example.com".into(),
            phone: "0500000000".into(),
            position: "Editor".into(),
            reason: "Manage content".into(),
            status: RequestStatus::Pending,
            request_date: Utc::now(),
            processed_date: None,
            processed_by: None,
        }
    }

    #[test]
    fn test_admin_request_notification_goes_to_site() {
        let email = service();
        let sent = email.send_admin_request_notification(&request()).unwrap();

        assert_eq!(sent.recipient, "site@example.com");
        assert_eq!(sent.recipient, email.site_email());
        assert!(sent.body.contains("omar@example.com"));
        assert!(sent.body.contains("Manage content"));
        assert_eq!(email.unread_count(), 1);
    }

    #[test]
    fn test_approval_body_quotes_default_password() {
        let email = service().with_default_admin_password("start-here");
        let sent = email
            .send_approval_notification("omar@example.com", true, None)
            .unwrap();

        assert_eq!(sent.recipient, "omar@example.com");
        assert!(sent.body.contains("start-here"));
    }

    #[test]
    fn test_rejection_body_includes_reason() {
        let email = service();
        let with_reason = email
            .send_approval_notification("omar@example.com", false, Some("Position filled"))
            .unwrap();
        let without = email
            .send_approval_notification("omar@example.com", false, Some("  "))
            .unwrap();

        assert!(with_reason.body.contains("Reason: Position filled"));
        assert!(!without.body.contains("Reason:"));
        assert_eq!(email.notifications_for("omar@example.com").len(), 2);
    }

    #[test]
    fn test_mark_as_read() {
        let email = service();
        let first = email.store_notification("a", "b", "x@example.com").unwrap();
        email.store_notification("c", "d", "x@example.com").unwrap();

        assert!(email.mark_as_read(&first.id).unwrap());
        assert!(!email.mark_as_read("unknown").unwrap());
        assert_eq!(email.unread_count(), 1);
    }

    #[tokio::test]
    async fn test_send_email_stores_after_delay() {
        let email = EmailService::new(
            Arc::new(MemoryStore::new()),
            "site@example.com",
            Duration::from_millis(20),
        );

        let started = std::time::Instant::now();
        email.send_email("x@example.com", "Hi", "Body").await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(20));
        assert_eq!(email.notifications().len(), 1);
    }
}
