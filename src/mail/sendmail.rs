use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, SinglePart, header},
    transport::smtp::authentication::Credentials,
};
use thiserror::Error;

use crate::config::MailConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("failed to build email: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Outgoing mail over SMTP (STARTTLS).
///
/// Built once at startup from `MailConfig`. Without SMTP settings the mailer is
/// disabled: messages are logged and dropped, which keeps local setups and tests
/// free of a mail server.
#[derive(Clone)]
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Option<Mailbox>,
}

impl Mailer {
    pub fn new(config: Option<&MailConfig>) -> Result<Self, MailError> {
        let Some(config) = config else {
            return Ok(Self::disabled());
        };

        let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_server)?
            .credentials(creds)
            .port(config.smtp_port)
            .build();

        Ok(Mailer {
            transport: Some(transport),
            from: Some(config.from.parse()?),
        })
    }

    pub fn disabled() -> Self {
        Mailer {
            transport: None,
            from: None,
        }
    }

    /// Fill `template` with `placeholders` and send it as an HTML email.
    pub async fn send_html(
        &self,
        to_email: &str,
        subject: &str,
        template: &str,
        placeholders: &[(&str, String)],
    ) -> Result<(), MailError> {
        let (Some(transport), Some(from)) = (&self.transport, &self.from) else {
            tracing::warn!(to = %to_email, subject = %subject, "SMTP is not configured, email dropped");
            return Ok(());
        };

        let body = render_template(template, placeholders);

        let email = Message::builder()
            .from(from.clone())
            .to(to_email.parse()?)
            .subject(subject)
            .singlepart(
                SinglePart::builder()
                    .header(header::ContentType::TEXT_HTML)
                    .body(body),
            )?;

        transport.send(email).await?;
        tracing::info!(to = %to_email, subject = %subject, "Email sent");
        Ok(())
    }
}

/// Replace every `{{key}}` occurrence with its value.
pub fn render_template(template: &str, placeholders: &[(&str, String)]) -> String {
    let mut rendered = template.to_string();
    for (key, value) in placeholders {
        rendered = rendered.replace(&format!("{{{{{key}}}}}"), value);
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_placeholders() {
        let rendered = render_template(
            "<p>{{code}} / {{code}} / {{missing}}</p>",
            &[("code", "123456".to_string())],
        );
        assert_eq!(rendered, "<p>123456 / 123456 / {{missing}}</p>");
    }

    #[tokio::test]
    async fn disabled_mailer_drops_messages() {
        let mailer = Mailer::new(None).unwrap();
        let result = mailer
            .send_html("donor@example.com", "Subject", "<p>hi</p>", &[])
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn rejects_bad_sender() {
        let config = MailConfig {
            smtp_server: "smtp.example.com".to_string(),
            smtp_port: 587,
            smtp_username: "bot".to_string(),
            smtp_password: "pw".to_string(),
            from: "not an address".to_string(),
        };
        assert!(matches!(Mailer::new(Some(&config)), Err(MailError::Address(_))));
    }
}
