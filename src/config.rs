const DEFAULT_EVENT_CAPACITY: usize = 64;

#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Gates the whole engine. When false, opening the syncable storage is a
    /// no-op and sync stays disabled.
    pub sync_enabled: bool,
    /// Capacity of the broadcast channel carrying domain events.
    pub event_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_enabled: true,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Self {
        Self {
            sync_enabled: read_bool_env("DRIVE_SYNC_ENABLED", true),
            event_capacity: read_usize_env("DRIVE_SYNC_EVENT_CAPACITY", DEFAULT_EVENT_CAPACITY),
        }
    }
}

fn read_bool_env(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .map(|value| parse_bool(&value))
        .unwrap_or(default)
}

fn read_usize_env(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
