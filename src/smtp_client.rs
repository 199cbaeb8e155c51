//! Delivery of composed mail through an authenticated SMTP relay.

use crate::config::Config;
use crate::error::Error;
use crate::message::compose;
use crate::replies::Language;
use crate::submission::Submission;
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Anything able to hand a message over to a mail delivery system.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Delivers `message`, reporting only success or failure.
    async fn deliver(&self, message: Message) -> Result<(), Error>;
}

/// Authenticated connection settings for the third-party relay.
pub struct SmtpRelay {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpRelay {
    /// Builds the transport. Uses implicit TLS unless STARTTLS is configured.
    ///
    /// No connection is opened here; the pool connects on first delivery.
    pub fn new(config: &Config) -> Result<Self, Error> {
        let builder = if config.smtp_starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_server_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_server_host)?
        };

        let mailer = builder
            .port(config.smtp_server_port)
            .credentials(Credentials::new(
                config.smtp_server_username.clone(),
                config.smtp_server_password.clone(),
            ))
            .timeout(Some(config.dispatch_timeout()))
            .build();

        Ok(Self { mailer })
    }
}

#[async_trait]
impl MailTransport for SmtpRelay {
    async fn deliver(&self, message: Message) -> Result<(), Error> {
        log::debug!("Handing message over to the SMTP relay");
        self.mailer.send(message).await?;
        log::debug!("SMTP relay accepted the message");
        Ok(())
    }
}

/// Sends validated submissions to the site owner's mailbox.
pub struct Dispatcher {
    transport: Arc<dyn MailTransport>,
    sender: Mailbox,
    recipient: Mailbox,
    language: Language,
    timeout: Duration,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("sender", &self.sender)
            .field("recipient", &self.recipient)
            .field("language", &self.language)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn MailTransport>,
        sender: Mailbox,
        recipient: Mailbox,
        language: Language,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            sender,
            recipient,
            language,
            timeout,
        }
    }

    /// Builds a dispatcher from the relay configuration.
    ///
    /// The sender is the SMTP account itself, the recipient the configured receiver.
    pub fn from_config(config: &Config, transport: Arc<dyn MailTransport>) -> Result<Self, Error> {
        Ok(Self::new(
            transport,
            config.smtp_server_username.parse()?,
            config.site_mail_receiver.parse()?,
            config.language(),
            config.dispatch_timeout(),
        ))
    }

    /// Composes the mail for `submission` and delivers it within the timeout.
    ///
    /// Nothing is retried; the visitor resubmits.
    pub async fn send(&self, submission: &Submission) -> Result<(), Error> {
        let message = compose(submission, &self.sender, &self.recipient, self.language)?;
        match tokio::time::timeout(self.timeout, self.transport.deliver(message)).await {
            Ok(result) => result,
            Err(_) => Err(Error::DispatchTimeout(self.timeout)),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;
    use testresult::TestResult;

    /// Records every delivered message, or fails when told to.
    #[derive(Debug, Default)]
    pub(crate) struct FakeTransport {
        pub(crate) delivered: Mutex<Vec<Vec<u8>>>,
        pub(crate) failure: Option<&'static str>,
        pub(crate) delay: Option<Duration>,
    }

    impl FakeTransport {
        pub(crate) fn failing(reason: &'static str) -> Self {
            Self {
                failure: Some(reason),
                ..Default::default()
            }
        }

        pub(crate) fn hanging() -> Self {
            Self {
                delay: Some(Duration::from_secs(30)),
                ..Default::default()
            }
        }

        pub(crate) fn delivered_count(&self) -> usize {
            self.delivered.lock().map(|d| d.len()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl MailTransport for FakeTransport {
        async fn deliver(&self, message: Message) -> Result<(), Error> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(reason) = self.failure {
                return Err(Error::Io(std::io::Error::other(reason)));
            }
            self.delivered
                .lock()
                .map_err(|_| Error::LockPoisoned)?
                .push(message.formatted());
            Ok(())
        }
    }

    pub(crate) fn dispatcher(transport: Arc<FakeTransport>, timeout: Duration) -> Dispatcher {
        Dispatcher::new(
            transport,
            "site@example.org".parse().expect("valid sender"),
            "owner@example.org".parse().expect("valid recipient"),
            Language::En,
            timeout,
        )
    }

    fn submission() -> Submission {
        Submission {
            name: "Jane".to_string(),
            email: "jane@x.com".parse().expect("valid address"),
            message: "Hello there".to_string(),
        }
    }

    #[tokio::test]
    async fn test_send_delivers_composed_message() -> TestResult {
        let transport = Arc::new(FakeTransport::default());
        let dispatcher = dispatcher(transport.clone(), Duration::from_secs(1));
        dispatcher.send(&submission()).await?;

        let delivered = transport.delivered.lock().expect("lock");
        let raw = String::from_utf8_lossy(delivered.first().expect("one message"));
        assert!(raw.contains("Subject: Website message from Jane"));
        assert!(raw.contains("To: owner@example.org"));
        Ok(())
    }

    #[tokio::test]
    async fn test_send_reports_transport_failure() {
        let transport = Arc::new(FakeTransport::failing("535 authentication failed"));
        let dispatcher = dispatcher(transport, Duration::from_secs(1));
        assert!(matches!(
            dispatcher.send(&submission()).await,
            Err(Error::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_send_times_out() {
        let transport = Arc::new(FakeTransport::hanging());
        let dispatcher = dispatcher(transport.clone(), Duration::from_millis(20));
        assert!(matches!(
            dispatcher.send(&submission()).await,
            Err(Error::DispatchTimeout(_))
        ));
        assert_eq!(transport.delivered_count(), 0);
    }

    #[test]
    fn test_from_config_rejects_bad_receiver() -> TestResult {
        let config = Config::default().with_overrides(|key| match key {
            "SMTP_SERVER_USERNAME" => Some("site@example.org".to_string()),
            "SITE_MAIL_RECEIVER" => Some("not an address".to_string()),
            _ => None,
        })?;
        let result = Dispatcher::from_config(&config, Arc::new(FakeTransport::default()));
        assert!(matches!(result, Err(Error::Address(_))));
        Ok(())
    }
}
