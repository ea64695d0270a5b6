//! Outbound send primitive.
//!
//! The pipeline talks to a [`Dispatcher`]; [`SmtpDispatcher`] is the lettre
//! backed implementation that relays through a single authenticated SMTP
//! host, with the sending account as the `From` identity.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};

use crate::accounts::Account;
use crate::error::{ConfigError, DispatchError};

/// Sends one email from a sender account.
///
/// Implementations must return `Ok` only once the message is accepted for
/// delivery; callers record the send against the account quota on `Ok`.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn send(
        &self,
        account: &Account,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), DispatchError>;
}

/// SMTP relay settings.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    /// Socket timeout inside lettre. The blocking send is not interrupted
    /// when a caller stops waiting earlier.
    pub timeout: Duration,
}

impl SmtpConfig {
    /// Build config from `SMTP_HOST` (required), `SMTP_PORT`, `SMTP_USERNAME`,
    /// `SMTP_PASSWORD` and `SMTP_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("SMTP_HOST")
            .map_err(|_| ConfigError::MissingEnvVar("SMTP_HOST".into()))?;

        let port = match std::env::var("SMTP_PORT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "SMTP_PORT".into(),
                message: format!("'{raw}' is not a port number"),
            })?,
            Err(_) => 587,
        };

        let timeout = std::env::var("SMTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        Ok(Self {
            host,
            port,
            username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
            password: SecretString::from(std::env::var("SMTP_PASSWORD").unwrap_or_default()),
            timeout,
        })
    }
}

/// [`Dispatcher`] over lettre's blocking SMTP transport.
pub struct SmtpDispatcher {
    config: SmtpConfig,
}

impl SmtpDispatcher {
    pub fn new(config: SmtpConfig) -> Self {
        // Already installed is fine; any other caller picked a provider first.
        let _ = rustls::crypto::ring::default_provider().install_default();
        Self { config }
    }

    fn transport(&self) -> Result<SmtpTransport, DispatchError> {
        let creds = Credentials::new(
            self.config.username.clone(),
            self.config.password.expose_secret().to_string(),
        );

        Ok(SmtpTransport::relay(&self.config.host)
            .map_err(|e| DispatchError::Build(format!("SMTP relay error: {e}")))?
            .port(self.config.port)
            .credentials(creds)
            .timeout(Some(self.config.timeout))
            .build())
    }
}

#[async_trait]
impl Dispatcher for SmtpDispatcher {
    async fn send(
        &self,
        account: &Account,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), DispatchError> {
        let email = build_message(account, to, subject, body)?;
        let transport = self.transport()?;
        let account_email = account.email.clone();

        let sent = tokio::task::spawn_blocking(move || transport.send(&email))
            .await
            .map_err(|e| DispatchError::Transport {
                account: account_email.clone(),
                reason: format!("send task failed: {e}"),
            })?;

        sent.map_err(|e| DispatchError::Transport {
            account: account_email,
            reason: format!("SMTP send failed: {e}"),
        })?;

        tracing::info!(from = %account.email, to = %to, "Email sent");
        Ok(())
    }
}

fn parse_address(address: &str) -> Result<Address, DispatchError> {
    address
        .trim()
        .parse::<Address>()
        .map_err(|e| DispatchError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

/// Build the RFC 5322 message for one send.
pub fn build_message(
    account: &Account,
    to: &str,
    subject: &str,
    body: &str,
) -> Result<Message, DispatchError> {
    let display_name = (!account.first_name.trim().is_empty()).then(|| account.first_name.clone());
    let from = Mailbox::new(display_name, parse_address(&account.email)?);
    let to = Mailbox::new(None, parse_address(to)?);

    Message::builder()
        .from(from)
        .to(to)
        .subject(subject)
        .body(body.to_string())
        .map_err(|e| DispatchError::Build(e.to_string()))
}
