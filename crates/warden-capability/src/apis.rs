//! Built-in host API surfaces and their inert stand-ins
//!
//! The no-op implementations never fail: reads return harmless defaults and
//! writes do nothing.

use std::collections::HashMap;

use parking_lot::Mutex;

/// Well-known capability names for the built-in APIs
pub mod names {
    pub const STORAGE: &str = "storage";
    pub const HAPTICS: &str = "haptics";
    pub const AUDIO: &str = "audio";
}

/// Small key/value persistence scoped to one guest
pub trait StorageApi: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str);
}

/// Vibration feedback
pub trait HapticsApi: Send + Sync {
    /// Alternating on/off durations in milliseconds
    fn vibrate(&self, pattern: &[u32]);
    fn is_supported(&self) -> bool;
}

/// Short sound-effect playback
pub trait AudioApi: Send + Sync {
    fn play(&self, sound_id: &str, volume: f64);
    fn stop_all(&self);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopStorage;

impl StorageApi for NoopStorage {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&self, _key: &str, _value: String) {}

    fn remove(&self, _key: &str) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHaptics;

impl HapticsApi for NoopHaptics {
    fn vibrate(&self, _pattern: &[u32]) {}

    fn is_supported(&self) -> bool {
        false
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopAudio;

impl AudioApi for NoopAudio {
    fn play(&self, _sound_id: &str, _volume: f64) {}

    fn stop_all(&self) {}
}

/// In-process storage backed by a map
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl StorageApi for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.entries.lock().insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }
}
