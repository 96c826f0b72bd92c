use crate::error::{ModemError, Result};
use std::fmt;
use std::str::FromStr;

/// Closed command vocabulary shared by both endpoints.
///
/// Values are fixed at build time. Any value not listed here (including 0)
/// is invalid on the wire and is never mapped to a neighbouring command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Trigger an image capture
    Capture = 1,
    /// Capture finished
    Done = 2,
    /// Capture failed
    Error = 3,
    /// Connection test
    Ping = 4,
    /// Answer to `Ping`
    Pong = 5,
}

impl Command {
    pub const ALL: [Command; 5] = [
        Command::Capture,
        Command::Done,
        Command::Error,
        Command::Ping,
        Command::Pong,
    ];

    pub fn value(self) -> u16 {
        self as u16
    }

    pub fn from_value(value: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|command| command.value() == value)
    }

    pub fn name(self) -> &'static str {
        match self {
            Command::Capture => "CAPTURE",
            Command::Done => "DONE",
            Command::Error => "ERROR",
            Command::Ping => "PING",
            Command::Pong => "PONG",
        }
    }

    /// Conventional acknowledgement a responder sends without consulting anyone.
    pub fn reply(self) -> Option<Command> {
        match self {
            Command::Ping => Some(Command::Pong),
            _ => None,
        }
    }

    /// Largest value in the table; the frame's data field must be able to hold it.
    pub fn max_value() -> u16 {
        Self::ALL.iter().map(|command| command.value()).max().unwrap_or(0)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Command {
    type Err = ModemError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|command| command.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ModemError::UnknownCommandName(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_are_unique() {
        for (i, a) in Command::ALL.iter().enumerate() {
            for b in &Command::ALL[i + 1..] {
                assert_ne!(a.value(), b.value(), "{} and {} share a value", a, b);
            }
        }
    }

    #[test]
    fn test_value_lookup_is_bijective() {
        for command in Command::ALL {
            assert_eq!(Command::from_value(command.value()), Some(command));
        }
    }

    #[test]
    fn test_unmapped_values_are_rejected() {
        assert_eq!(Command::from_value(0), None);
        for value in 6..16 {
            assert_eq!(Command::from_value(value), None, "value {} should be unmapped", value);
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("capture".parse::<Command>().unwrap(), Command::Capture);
        assert_eq!(" PONG ".parse::<Command>().unwrap(), Command::Pong);
        assert!("reboot".parse::<Command>().is_err());
    }

    #[test]
    fn test_ping_replies_pong() {
        assert_eq!(Command::Ping.reply(), Some(Command::Pong));
        assert_eq!(Command::Capture.reply(), None);
        assert_eq!(Command::max_value(), 5);
    }
}
