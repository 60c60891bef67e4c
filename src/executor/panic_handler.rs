use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// What was recovered from a panicking task body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicInfo {
    pub message: String,
}

impl PanicInfo {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        Self { message }
    }
}

impl fmt::Display for PanicInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panicked: {}", self.message)
    }
}

/// Run `f`, turning a panic into an `Err` so the calling worker survives it.
pub(crate) fn isolate<F, R>(f: F) -> Result<R, PanicInfo>
where
    F: FnOnce() -> R,
{
    catch_unwind(AssertUnwindSafe(f)).map_err(PanicInfo::from_payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolate_success() {
        assert_eq!(isolate(|| 42), Ok(42));
    }

    #[test]
    fn test_isolate_str_panic() {
        let info = isolate(|| {
            panic!("test panic");
        })
        .unwrap_err();
        assert_eq!(info.message, "test panic");
    }

    #[test]
    fn test_isolate_formatted_panic() {
        let n = 3;
        let info = isolate(|| {
            panic!("bad value {}", n);
        })
        .unwrap_err();
        assert_eq!(info.message, "bad value 3");
        assert_eq!(info.to_string(), "panicked: bad value 3");
    }

    #[test]
    fn test_isolate_opaque_payload() {
        let info = isolate(|| {
            std::panic::panic_any(17u8);
        })
        .unwrap_err();
        assert_eq!(info.message, "Unknown panic");
    }
}
