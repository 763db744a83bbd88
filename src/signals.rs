//! Signal Handling (§4.12): install SIGTERM/SIGINT/SIGHUP/SIGQUIT handlers
//! that flip a shared flag, observed by the event loop's wait step.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::error::Result;

/// Register the shutdown signals against `flag`. Each one sets `flag` to
/// `true`; the event loop checks it after every wake and exits the loop
/// cleanly without touching the interrupted syscall itself.
pub fn install(flag: &Arc<AtomicBool>) -> Result<()> {
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(flag))?;
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(flag))?;
    signal_hook::flag::register(signal_hook::consts::SIGHUP, Arc::clone(flag))?;
    signal_hook::flag::register(signal_hook::consts::SIGQUIT, Arc::clone(flag))?;
    Ok(())
}
