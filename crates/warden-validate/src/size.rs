//! Serialized size measurement
//!
//! Size ceilings are checked against the compact JSON encoding without
//! materializing it. The value is streamed into a counting sink that fails
//! the serializer at the first write past the ceiling, so the reported
//! length is exact below the ceiling and only known to exceed it above.

use std::io;

use serde::Serialize;
use serde_json::{Map, Value};

/// Default ceiling for a whole event
pub const MAX_EVENT_BYTES: usize = 64 * 1024;

/// Default ceiling for a state-save payload
pub const MAX_STATE_BYTES: usize = 1024 * 1024;

struct ByteCounter {
    count: usize,
    cap: usize,
}

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.count = self.count.saturating_add(buf.len());
        if self.count > self.cap {
            return Err(io::Error::new(io::ErrorKind::Other, "size cap exceeded"));
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Encoded length of `value`, or some length above `cap` once it is exceeded
pub fn capped_len<T: Serialize + ?Sized>(value: &T, cap: usize) -> usize {
    let mut counter = ByteCounter { count: 0, cap };
    match serde_json::to_writer(&mut counter, value) {
        Ok(()) => counter.count,
        Err(_) => counter.count.max(cap.saturating_add(1)),
    }
}

/// Length in bytes of the compact JSON encoding of `value`
pub fn serialized_len(value: &Value) -> usize {
    capped_len(value, usize::MAX)
}

/// Encoded length of an object with one field left out
pub fn object_len_excluding(obj: &Map<String, Value>, skip: &str, cap: usize) -> usize {
    let mut len: usize = 2;
    let mut entries = 0usize;
    for (key, value) in obj.iter().filter(|(key, _)| key.as_str() != skip) {
        len = len
            .saturating_add(capped_len(key, cap))
            .saturating_add(1)
            .saturating_add(capped_len(value, cap));
        entries += 1;
        if len > cap {
            return len;
        }
    }
    len.saturating_add(entries.saturating_sub(1))
}
