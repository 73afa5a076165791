//! Write-settling: wait until a freshly written file stops growing.

use crate::defaults;
use std::fs;
use std::io;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

/// Polling window for size stabilization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleConfig {
    /// Give up after this long.
    pub window: Duration,
    /// Delay between size samples.
    pub poll: Duration,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            window: defaults::SETTLE_WINDOW,
            poll: defaults::SETTLE_POLL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// Two consecutive samples agreed on this non-zero size.
    Stable(u64),
    /// Still changing (or still empty) when the window closed.
    Unstable,
    /// The file disappeared.
    Missing,
}

/// Samples `size` until two consecutive non-zero readings match or the
/// window closes.
pub fn settle_with<F>(mut size: F, config: &SettleConfig) -> SettleOutcome
where
    F: FnMut() -> io::Result<u64>,
{
    let deadline = Instant::now() + config.window;
    let mut last = None;

    loop {
        match size() {
            Ok(current) => {
                if current > 0 && last == Some(current) {
                    return SettleOutcome::Stable(current);
                }
                last = Some(current);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => return SettleOutcome::Missing,
            Err(e) => {
                log::debug!("size sample failed: {e}");
                last = None;
            }
        }

        if Instant::now() >= deadline {
            return SettleOutcome::Unstable;
        }
        thread::sleep(config.poll);
    }
}

/// [`settle_with`] over the file's on-disk size.
pub fn wait_for_stable_size(path: &Path, config: &SettleConfig) -> SettleOutcome {
    settle_with(|| fs::metadata(path).map(|m| m.len()), config)
}
