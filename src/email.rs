//! Email service for password resets and booking notifications.

use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::path::Path;

use crate::{config::Config, errors::Error};

pub struct EmailService {
    transport: EmailTransport,
    from_email: String,
    from_name: String,
    base_url: String,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

impl EmailService {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let email_config = &config.email;

        let transport = match &email_config.transport {
            crate::config::EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                if !use_tls {
                    tracing::warn!("SMTP TLS is disabled - this is not recommended for production");
                }

                let smtp_builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                } else {
                    Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host))
                }
                .map_err(|e| Error::Internal {
                    operation: format!("create SMTP transport: {e}"),
                })?
                .port(*port)
                .credentials(Credentials::new(username.clone(), password.clone()));

                EmailTransport::Smtp(smtp_builder.build())
            }
            crate::config::EmailTransportConfig::File { path } => {
                let emails_dir = Path::new(path);
                if !emails_dir.exists() {
                    std::fs::create_dir_all(emails_dir).map_err(|e| Error::Internal {
                        operation: format!("create emails directory: {e}"),
                    })?;
                }
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(emails_dir))
            }
        };

        Ok(Self {
            transport,
            from_email: email_config.from_email.clone(),
            from_name: email_config.from_name.clone(),
            base_url: config.public_url.clone(),
        })
    }

    pub async fn send_password_reset_email(
        &self,
        to_email: &str,
        to_name: Option<&str>,
        token_id: &uuid::Uuid,
        token: &str,
    ) -> Result<(), Error> {
        let reset_link = format!("{}/reset-password?id={}&token={}", self.base_url, token_id, token);

        let subject = "Password Reset Request";
        let body = self.create_password_reset_body(to_name, &reset_link);

        self.send_email(to_email, to_name, subject, &body).await
    }

    pub async fn send_booking_created_email(
        &self,
        to_email: &str,
        to_name: Option<&str>,
        lawyer_name: &str,
        scheduled_at: &chrono::DateTime<chrono::Utc>,
    ) -> Result<(), Error> {
        let subject = "Consultation Booked";
        let body = self.create_booking_created_body(to_name, lawyer_name, scheduled_at);

        self.send_email(to_email, to_name, subject, &body).await
    }

    async fn send_email(&self, to_email: &str, to_name: Option<&str>, subject: &str, body: &str) -> Result<(), Error> {
        let from = format!("{} <{}>", self.from_name, self.from_email)
            .parse::<Mailbox>()
            .map_err(|e| Error::Internal {
                operation: format!("parse from email: {e}"),
            })?;

        let to = if let Some(name) = to_name {
            format!("{name} <{to_email}>")
        } else {
            to_email.to_string()
        }
        .parse::<Mailbox>()
        .map_err(|e| Error::Internal {
            operation: format!("parse to email: {e}"),
        })?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body.to_string())
            .map_err(|e| Error::Internal {
                operation: format!("build email message: {e}"),
            })?;

        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send SMTP email: {e}"),
                })?;
            }
            EmailTransport::File(file) => {
                file.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send file email: {e}"),
                })?;
            }
        }

        Ok(())
    }

    fn create_password_reset_body(&self, to_name: Option<&str>, reset_link: &str) -> String {
        let greeting = if let Some(name) = to_name {
            format!("Hello {name},")
        } else {
            "Hello,".to_string()
        };

        format!(
            r#"<!DOCTYPE html>
<html>
<body>
    <h2>Password Reset Request</h2>
    <p>{greeting}</p>
    <p>We received a request to reset your password. If you didn't make this request, you can safely ignore this email.</p>
    <p><a href="{reset_link}">Reset your password</a></p>
    <p>Or copy and paste this link into your browser:</p>
    <p>{reset_link}</p>
    <p>This link will expire in 30 minutes for security reasons.</p>
    <p>This is an automated message, please do not reply to this email.</p>
</body>
</html>"#
        )
    }

    fn create_booking_created_body(
        &self,
        to_name: Option<&str>,
        lawyer_name: &str,
        scheduled_at: &chrono::DateTime<chrono::Utc>,
    ) -> String {
        let greeting = if let Some(name) = to_name {
            format!("Hello {name},")
        } else {
            "Hello,".to_string()
        };

        format!(
            r#"<!DOCTYPE html>
<html>
<body>
    <h2>Consultation Booked</h2>
    <p>{greeting}</p>
    <p>Your consultation with {lawyer_name} is booked for {scheduled}.</p>
    <p>It will be confirmed as soon as your payment completes. You can track it from your dashboard.</p>
    <p>This is an automated message, please do not reply to this email.</p>
</body>
</html>"#,
            scheduled = scheduled_at.format("%Y-%m-%d %H:%M UTC"),
        )
    }
}
