//! Task watchdog.
//!
//! Resets the chip when the main task stops feeding it for longer than its
//! budget.  Fed once per tick and between broker connection attempts, so a
//! broker that never answers does not trip it.  Off-target it only counts
//! feeds.

use core::cell::Cell;

use log::{info, warn};

pub const WATCHDOG_TIMEOUT_MS: u32 = 10_000;

pub struct Watchdog {
    armed: bool,
    feeds: Cell<u32>,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl Watchdog {
    pub fn new() -> Self {
        Self::arm(WATCHDOG_TIMEOUT_MS)
    }

    /// Subscribe the calling task with a `timeout_ms` budget.  A task that
    /// cannot be subscribed runs unguarded; feeding stays harmless.
    pub fn arm(timeout_ms: u32) -> Self {
        let armed = subscribe_current_task(timeout_ms);
        if armed {
            info!("Task watchdog armed ({} ms)", timeout_ms);
        } else {
            warn!("Task watchdog unavailable, running unguarded");
        }
        Self {
            armed,
            feeds: Cell::new(0),
        }
    }

    pub fn feed(&self) {
        if self.armed {
            reset_current_task();
        }
        self.feeds.set(self.feeds.get().wrapping_add(1));
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn feeds(&self) -> u32 {
        self.feeds.get()
    }
}

#[cfg(target_os = "espidf")]
fn subscribe_current_task(timeout_ms: u32) -> bool {
    use esp_idf_svc::sys::{ESP_OK, esp_task_wdt_add, esp_task_wdt_config_t, esp_task_wdt_reconfigure};

    let cfg = esp_task_wdt_config_t {
        timeout_ms,
        idle_core_mask: 0,
        trigger_panic: true,
    };
    // SAFETY: FFI on the current task; `cfg` outlives the call.
    let ret = unsafe { esp_task_wdt_reconfigure(&cfg) };
    if ret != ESP_OK {
        log::debug!("esp_task_wdt_reconfigure: {}", ret);
    }
    // SAFETY: a null handle subscribes the calling task.
    unsafe { esp_task_wdt_add(core::ptr::null_mut()) == ESP_OK }
}

#[cfg(target_os = "espidf")]
fn reset_current_task() {
    // SAFETY: only reached once the current task is subscribed.
    unsafe {
        esp_idf_svc::sys::esp_task_wdt_reset();
    }
}

#[cfg(not(target_os = "espidf"))]
fn subscribe_current_task(_timeout_ms: u32) -> bool {
    true
}

#[cfg(not(target_os = "espidf"))]
fn reset_current_task() {}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;

    #[test]
    fn every_feed_is_counted() {
        let wd = Watchdog::arm(500);
        assert!(wd.is_armed());
        for _ in 0..3 {
            wd.feed();
        }
        assert_eq!(wd.feeds(), 3);
    }
}
