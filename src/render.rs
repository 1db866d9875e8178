use std::fmt;

use crate::error::ChatError;
use crate::state::Recipient;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "Not connected"),
            ConnectionStatus::Connecting => write!(f, "Connecting"),
            ConnectionStatus::Connected => write!(f, "Connected"),
        }
    }
}

/// A line appended to the conversation view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatLine {
    Public {
        sender: String,
        text: String,
        timestamp: String,
    },
    PrivateReceived {
        from: String,
        text: String,
        timestamp: String,
    },
    PrivateSent {
        to: String,
        text: String,
        timestamp: String,
    },
    ServerError {
        message: String,
    },
}

impl fmt::Display for ChatLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatLine::Public {
                sender,
                text,
                timestamp,
            } if sender.is_empty() => write!(f, "[{timestamp}] {text}"),
            ChatLine::Public {
                sender,
                text,
                timestamp,
            } => write!(f, "[{timestamp}] <{sender}> {text}"),
            ChatLine::PrivateReceived {
                from,
                text,
                timestamp,
            } => write!(f, "[{timestamp}] (private from {from}) {text}"),
            ChatLine::PrivateSent {
                to,
                text,
                timestamp,
            } => write!(f, "[{timestamp}] (private to {to}) {text}"),
            ChatLine::ServerError { message } => write!(f, "[error] {message}"),
        }
    }
}

/// Local wall-clock time as zero-padded `HH:MM`, used when the server sends
/// no timestamp.
pub fn local_clock() -> String {
    chrono::Local::now().format("%H:%M").to_string()
}

/// Presentation side of the session. Every callback is made from the
/// dispatch loop, one at a time.
pub trait Renderer {
    fn status_changed(&mut self, status: ConnectionStatus);

    /// The presence list was replaced. `recipients` is the list of peers
    /// that can be addressed, never containing the local identity.
    fn peers_changed(&mut self, peers: &[String], recipients: &[&str], selection: &Recipient);

    fn selection_changed(&mut self, selection: &Recipient);

    fn identity_changed(&mut self, identity: &str);

    fn typing_shown(&mut self, sender: &str);

    fn typing_hidden(&mut self);

    fn append(&mut self, line: ChatLine);

    /// An action was aborted or an inbound record was dropped.
    fn report(&mut self, error: &ChatError);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_lines() {
        let public = ChatLine::Public {
            sender: "bob".into(),
            text: "hi".into(),
            timestamp: "09:05".into(),
        };
        assert_eq!(public.to_string(), "[09:05] <bob> hi");

        let anonymous = ChatLine::Public {
            sender: String::new(),
            text: "bob: hi".into(),
            timestamp: "09:05".into(),
        };
        assert_eq!(anonymous.to_string(), "[09:05] bob: hi");

        let received = ChatLine::PrivateReceived {
            from: "bob".into(),
            text: "hi".into(),
            timestamp: "09:05".into(),
        };
        assert_eq!(received.to_string(), "[09:05] (private from bob) hi");

        let error = ChatLine::ServerError {
            message: "User 'x' not found or offline".into(),
        };
        assert_eq!(error.to_string(), "[error] User 'x' not found or offline");
    }

    #[test]
    fn local_clock_is_zero_padded_hours_and_minutes() {
        let clock = local_clock();
        assert_eq!(clock.len(), 5);
        assert_eq!(&clock[2..3], ":");
        assert!(clock
            .chars()
            .enumerate()
            .all(|(i, c)| i == 2 || c.is_ascii_digit()));
    }
}
