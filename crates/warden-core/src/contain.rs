//! Panic containment for host- and guest-supplied callbacks

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Run `f`, turning a panic into its message
///
/// Callers only use this around callbacks whose partial effects they never
/// observe again, so unwind safety is asserted rather than required.
pub fn contain<R>(f: impl FnOnce() -> R) -> Result<R, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contain_passes_value_through() {
        assert_eq!(contain(|| 7), Ok(7));
    }

    #[test]
    fn test_contain_captures_message() {
        let err = contain(|| -> u8 { panic!("boom {}", 3) }).unwrap_err();
        assert_eq!(err, "boom 3");

        let err = contain(|| -> u8 { panic!("static") }).unwrap_err();
        assert_eq!(err, "static");
    }
}
