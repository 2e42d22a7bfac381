//! Sending the nightly report.

use std::time::Duration;

use nb_config::recipients::Recipients;
use nb_io::Runner;
use tracing::{info, warn};

use crate::prelude::*;

const SEND_TIMEOUT: Duration = Duration::from_secs(5 * 60);

pub trait Mailer {
    fn send(&self, recipients: &Recipients, subject: &str, body: &str) -> Result<()>;
}

/// Complete message, headers included.
pub fn compose(recipients: &Recipients, subject: &str, body: &str) -> String {
    let to: Vec<String> = recipients
        .iter()
        .map(|(name, address)| {
            if name.is_empty() {
                address.clone()
            } else {
                format!("{name} {address}")
            }
        })
        .collect();
    format!(
        "To: {}\nSubject: {subject}\nContent-Type: text/plain; charset=utf-8\n\n{body}",
        to.join(", ")
    )
}

/// Pipes the message into a sendmail-like command.
pub struct CommandMailer {
    command: String,
}

impl CommandMailer {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Mailer for CommandMailer {
    fn send(&self, recipients: &Recipients, subject: &str, body: &str) -> Result<()> {
        if recipients.is_empty() {
            warn!("No recipients, the report is not sent");
            return Ok(());
        }
        let output = Runner::shell(&self.command)
            .stdin(compose(recipients, subject, body))
            .timeout(SEND_TIMEOUT)
            .output();
        if !output.success() {
            return Err(Error::Mail(output.status));
        }
        info!("Report sent to {} recipients", recipients.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn recipients() -> Recipients {
        Recipients::from([
            (String::from("Night Owl"), String::from("<owl@example.com>")),
            (String::from("Early Bird"), String::from("<bird@example.com>")),
        ])
    }

    #[test]
    fn test_compose() {
        let message = compose(&recipients(), "Nightly build", "All green\n");
        assert_eq!(
            message,
            "To: Early Bird <bird@example.com>, Night Owl <owl@example.com>\n\
             Subject: Nightly build\n\
             Content-Type: text/plain; charset=utf-8\n\
             \n\
             All green\n"
        );
    }

    #[test]
    fn test_command_mailer_pipes_message() {
        let dir = tempfile::tempdir().expect("Couldn't create temp dir");
        let sent = dir.path().join("sent.txt");
        let mailer = CommandMailer::new(format!("cat > {}", sent.display()));

        mailer
            .send(&recipients(), "Nightly build", "body\n")
            .expect("Couldn't send");
        let message = fs::read_to_string(&sent).expect("Nothing sent");
        assert!(message.starts_with("To: Early Bird"));
        assert!(message.ends_with("\n\nbody\n"));
    }

    #[test]
    fn test_failing_mailer() {
        let mailer = CommandMailer::new("exit 75");
        let result = mailer.send(&recipients(), "Nightly build", "body");
        assert!(matches!(result, Err(Error::Mail(75))));
    }

    #[test]
    fn test_no_recipients_sends_nothing() {
        let mailer = CommandMailer::new("exit 1");
        assert!(mailer.send(&Recipients::new(), "Nightly build", "body").is_ok());
    }
}
