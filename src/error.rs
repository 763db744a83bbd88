//! Error types for the responder core.
//!
//! The event loop (see [`crate::event_loop`]) only lets [`Error::Fatal`]
//! variants escape; everything else is logged and absorbed at the call site
//! per the severities in §7 of the design notes.

use std::io;
use std::net::AddrParseError;

error_chain::error_chain! {
    foreign_links {
        Io(io::Error);
        AddrParse(AddrParseError);
    }

    errors {
        /// Listener socket create/bind failure, identity generation failure.
        /// The process aborts with exit code 1.
        Fatal(msg: String) {
            description("fatal startup error")
            display("fatal startup error: {}", msg)
        }

        /// Per-interface socket open/bind/join failure during a refresh pass.
        /// The interface is skipped; the refresh continues.
        TransientInterface(ifname: String, msg: String) {
            description("could not open socket for interface")
            display("could not open socket for interface {}: {}", ifname, msg)
        }

        /// A configuration value violates an invariant checked at startup.
        InvalidConfig(msg: String) {
            description("invalid configuration")
            display("invalid configuration: {}", msg)
        }
    }
}
