//! Command line parsing and the validated runtime [`Config`].
//!
//! This is external-collaborator territory (§1): the responder core only
//! ever sees the resulting, already-validated [`Config`] value. Parsing is
//! done by hand, the same way the original C daemon used `getopt`, since the
//! surface is five flags and a positional list.

use std::time::Duration;

use crate::error::{ErrorKind, Result};
use crate::message::CACHE_TIMEOUT;

pub const PKG_NAME: &str = "ssdpd";
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_ANNOUNCE_INTERVAL: u64 = 300;
const DEFAULT_REFRESH_INTERVAL: u64 = 600;

const ANNOUNCE_RANGE: std::ops::RangeInclusive<u64> = 30..=900;
const REFRESH_RANGE: std::ops::RangeInclusive<u64> = 5..=1800;

/// Outcome of parsing argv: either a runtime [`Config`], or a request to
/// print something and exit immediately (handled by `main`).
pub enum ParseOutcome {
    Run(Config),
    PrintAndExit { message: String, code: i32 },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub debug: bool,
    pub announce_interval: Duration,
    pub refresh_interval: Duration,
    /// Empty means "accept every interface with an address".
    pub iface_allowlist: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            debug: false,
            announce_interval: Duration::from_secs(DEFAULT_ANNOUNCE_INTERVAL),
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL),
            iface_allowlist: Vec::new(),
        }
    }
}

impl Config {
    /// Checks the one cross-field invariant the CLI can't enforce per-flag:
    /// the announce interval must leave peers a safety margin before their
    /// cached advertisement expires.
    pub fn validate(&self) -> Result<()> {
        if self.announce_interval.as_secs() * 2 >= CACHE_TIMEOUT.as_secs() {
            return Err(ErrorKind::InvalidConfig(format!(
                "announce interval {}s must be less than half of the {}s cache lifetime",
                self.announce_interval.as_secs(),
                CACHE_TIMEOUT.as_secs()
            ))
            .into());
        }
        Ok(())
    }
}

fn usage(code: i32) -> ParseOutcome {
    let message = format!(
        "Usage: {PKG_NAME} [-dhv] [-i SEC] [-r SEC] [IFACE [IFACE ...]]\n\n\
         \x20   -d        Developer debug mode\n\
         \x20   -h        This help text\n\
         \x20   -i SEC    SSDP notify interval (30-900), default {DEFAULT_ANNOUNCE_INTERVAL} sec\n\
         \x20   -r SEC    Interface refresh interval (5-1800), default {DEFAULT_REFRESH_INTERVAL} sec\n\
         \x20   -v        Show program version\n"
    );
    ParseOutcome::PrintAndExit { message, code }
}

/// Parse an argument iterator (excluding argv[0]) into a [`ParseOutcome`].
pub fn parse<I: IntoIterator<Item = String>>(args: I) -> ParseOutcome {
    let mut cfg = Config::default();
    let mut iter = args.into_iter().peekable();

    while let Some(arg) = iter.peek().cloned() {
        if arg == "-d" {
            cfg.debug = true;
            iter.next();
        } else if arg == "-h" {
            return usage(0);
        } else if arg == "-v" {
            return ParseOutcome::PrintAndExit {
                message: format!("{PKG_VERSION}\n"),
                code: 0,
            };
        } else if arg == "-i" || arg == "-r" {
            iter.next();
            let Some(value) = iter.next() else {
                return ParseOutcome::PrintAndExit {
                    message: format!("{arg} requires an argument\n"),
                    code: 2,
                };
            };
            let Ok(secs) = value.parse::<u64>() else {
                return ParseOutcome::PrintAndExit {
                    message: format!("{arg}: not a number: {value}\n"),
                    code: 2,
                };
            };
            let range = if arg == "-i" { ANNOUNCE_RANGE } else { REFRESH_RANGE };
            if !range.contains(&secs) {
                return ParseOutcome::PrintAndExit {
                    message: format!(
                        "{arg}: {secs} out of range ({}-{})\n",
                        range.start(),
                        range.end()
                    ),
                    code: 2,
                };
            }
            if arg == "-i" {
                cfg.announce_interval = Duration::from_secs(secs);
            } else {
                cfg.refresh_interval = Duration::from_secs(secs);
            }
        } else if let Some(rest) = arg.strip_prefix('-') {
            if !rest.is_empty() {
                return ParseOutcome::PrintAndExit {
                    message: format!("Unknown option: -{rest}\n"),
                    code: 2,
                };
            }
            iter.next();
        } else {
            break;
        }
    }

    cfg.iface_allowlist = iter.collect();

    if let Err(e) = cfg.validate() {
        return ParseOutcome::PrintAndExit {
            message: format!("{e}\n"),
            code: 2,
        };
    }

    ParseOutcome::Run(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_announce_interval_too_close_to_cache_timeout() {
        let mut cfg = Config::default();
        cfg.announce_interval = Duration::from_secs(900);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parses_flags_and_positional_allowlist() {
        let args = ["-d", "-i", "30", "eth0", "wlan0"].map(String::from);
        match parse(args) {
            ParseOutcome::Run(cfg) => {
                assert!(cfg.debug);
                assert_eq!(cfg.announce_interval, Duration::from_secs(30));
                assert_eq!(cfg.iface_allowlist, vec!["eth0", "wlan0"]);
            }
            ParseOutcome::PrintAndExit { message, .. } => panic!("unexpected exit: {message}"),
        }
    }

    #[test]
    fn rejects_interval_out_of_range() {
        let args = ["-i", "1"].map(String::from);
        match parse(args) {
            ParseOutcome::PrintAndExit { code, .. } => assert_eq!(code, 2),
            ParseOutcome::Run(_) => panic!("expected rejection"),
        }
    }

    #[test]
    fn help_exits_zero() {
        match parse(["-h".to_string()]) {
            ParseOutcome::PrintAndExit { code, .. } => assert_eq!(code, 0),
            ParseOutcome::Run(_) => panic!("expected usage"),
        }
    }
}
