use async_trait::async_trait;
use lettre::message::{header, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::plugins::traits::{NotificationResult, NotifierPlugin};
use crate::utils::error::AppError;

pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailNotifier {
    /// `Ok(None)` when no sender or recipient is configured.
    pub fn from_config(config: &SmtpConfig) -> Result<Option<Self>, AppError> {
        let (Some(from_address), Some(to_address)) = (&config.from_address, &config.to_address) else {
            return Ok(None);
        };

        let from = parse_mailbox(&format!("{} <{}>", config.from_name, from_address))?;
        let to = parse_mailbox(to_address)?;

        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host).map_err(|e| plugin_error(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        }
        .port(config.port);

        let mailer = match (&config.username, &config.password) {
            (Some(username), Some(password)) => builder
                .credentials(Credentials::new(username.clone(), password.clone()))
                .build(),
            _ => builder.build(),
        };

        Ok(Some(Self { mailer, from, to }))
    }

    /// The first line of the message becomes the subject.
    fn build_message(&self, message: &str) -> Result<Message, AppError> {
        let subject = message.lines().next().unwrap_or("New listing").trim();

        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(format!("New listing: {}", subject))
            .header(header::ContentType::TEXT_PLAIN)
            .body(message.to_string())
            .map_err(|e| plugin_error(e.to_string()))
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, AppError> {
    address
        .parse()
        .map_err(|e| plugin_error(format!("invalid address '{}': {}", address, e)))
}

fn plugin_error(message: String) -> AppError {
    AppError::Plugin {
        plugin_type: "email".to_string(),
        message,
    }
}

#[async_trait]
impl NotifierPlugin for EmailNotifier {
    fn name(&self) -> &str {
        "Email Notifier"
    }

    fn plugin_type(&self) -> &str {
        "email"
    }

    async fn notify(&self, message: &str) -> Result<NotificationResult, AppError> {
        let email = self.build_message(message)?;

        match self.mailer.send(email).await {
            Ok(response) => Ok(NotificationResult::sent(response.message().next().map(str::to_string))),
            Err(e) => Ok(NotificationResult::failed(e.to_string())),
        }
    }

    async fn test_connection(&self) -> Result<bool, AppError> {
        Ok(self.mailer.test_connection().await.unwrap_or(false))
    }
}
