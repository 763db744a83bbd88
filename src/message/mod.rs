//! The SSDP Message Codec (§4.5): formatting outbound NOTIFY/search-response
//! messages and parsing inbound M-SEARCH requests.

pub mod codec;

use std::time::Duration;

pub use codec::{format_message, parse_search_target, OutboundMessage};

/// Cache lifetime advertised to peers in `Cache-Control: max-age=`. The
/// announce interval must be strictly less than half of this (§3/§8).
pub const CACHE_TIMEOUT: Duration = Duration::from_secs(1800);
