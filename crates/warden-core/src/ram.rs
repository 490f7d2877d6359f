//! Free-memory probe.

use std::sync::Mutex;
use sysinfo::{MemoryRefreshKind, RefreshKind, System};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Reports currently available system memory. Pure query, no state that
/// callers can observe.
pub trait RamProbe: Send + Sync {
    fn available_gb(&self) -> f64;
}

/// Reads available memory from the operating system.
pub struct SystemRamProbe {
    sys: Mutex<System>,
}

impl SystemRamProbe {
    pub fn new() -> Self {
        let sys = System::new_with_specifics(
            RefreshKind::nothing().with_memory(MemoryRefreshKind::nothing().with_ram()),
        );
        Self {
            sys: Mutex::new(sys),
        }
    }
}

impl Default for SystemRamProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl RamProbe for SystemRamProbe {
    fn available_gb(&self) -> f64 {
        let mut sys = self.sys.lock().unwrap_or_else(|e| e.into_inner());
        sys.refresh_memory_specifics(MemoryRefreshKind::nothing().with_ram());
        sys.available_memory() as f64 / BYTES_PER_GB
    }
}

impl<T: RamProbe + ?Sized> RamProbe for std::sync::Arc<T> {
    fn available_gb(&self) -> f64 {
        (**self).available_gb()
    }
}
