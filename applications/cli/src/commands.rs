//! Interactive command parsing

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// One line typed at the prompt
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    Pause,
    Next,
    Prev,
    Shuffle,
    /// Jump back five seconds
    Back,
    Repeat,
    Volume(f32),
    Seek(Duration),
    Status,
    Stop,
    Help,
    Quit,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseCommandError(String);

impl fmt::Display for ParseCommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ParseCommandError {}

pub const HELP: &str = "\
commands:
  play | pause | stop       transport
  next | prev | shuffle     navigation
  back                      jump back 5 seconds
  repeat                    cycle repeat mode
  vol <db>                  set gain (-40..40 dB)
  seek <secs>               seek within the track
  status                    print the player state
  quit";

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(ParseCommandError("empty command".into()));
        };
        let arg = words.next();

        let command = match (verb.to_ascii_lowercase().as_str(), arg) {
            ("play" | "p", None) => Self::Play,
            ("pause", None) => Self::Pause,
            ("next" | "n", None) => Self::Next,
            ("prev" | "previous", None) => Self::Prev,
            ("shuffle", None) => Self::Shuffle,
            ("back" | "replay", None) => Self::Back,
            ("repeat", None) => Self::Repeat,
            ("status", None) => Self::Status,
            ("stop", None) => Self::Stop,
            ("help" | "?", None) => Self::Help,
            ("quit" | "exit" | "q", None) => Self::Quit,
            ("vol" | "volume", Some(db)) => Self::Volume(
                db.parse()
                    .map_err(|_| ParseCommandError(format!("invalid gain: {db}")))?,
            ),
            ("seek", Some(secs)) => {
                let secs: f64 = secs
                    .parse()
                    .map_err(|_| ParseCommandError(format!("invalid position: {secs}")))?;
                if !secs.is_finite() || secs < 0.0 {
                    return Err(ParseCommandError(format!("invalid position: {secs}")));
                }
                Self::Seek(Duration::from_secs_f64(secs))
            }
            ("vol" | "volume" | "seek", None) => {
                return Err(ParseCommandError(format!("{verb} needs an argument")));
            }
            _ => return Err(ParseCommandError(format!("unknown command: {}", line.trim()))),
        };

        if words.next().is_some() {
            return Err(ParseCommandError(format!("too many arguments: {}", line.trim())));
        }
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_transport_words() {
        assert_eq!("play".parse(), Ok(Command::Play));
        assert_eq!("  NEXT ".parse(), Ok(Command::Next));
        assert_eq!("back".parse(), Ok(Command::Back));
        assert_eq!("q".parse(), Ok(Command::Quit));
    }

    #[test]
    fn parses_arguments() {
        assert_eq!("vol -6.5".parse(), Ok(Command::Volume(-6.5)));
        assert_eq!("seek 90".parse(), Ok(Command::Seek(Duration::from_secs(90))));
    }

    #[test]
    fn rejects_bad_input() {
        assert!("".parse::<Command>().is_err());
        assert!("dance".parse::<Command>().is_err());
        assert!("vol".parse::<Command>().is_err());
        assert!("vol loud".parse::<Command>().is_err());
        assert!("seek -3".parse::<Command>().is_err());
        assert!("play now".parse::<Command>().is_err());
    }
}
