//! Crash reporting for recovered panics.

use std::any::Any;

/// Receives panics recovered while handling events.
///
/// The daemon keeps running after a report; implementations forward the
/// report to whatever crash telemetry the host process uses.
pub trait CrashReporter: Send + Sync {
    /// Report a recovered panic. `context` names the step that panicked.
    fn report(&self, context: &str, message: &str);
}

/// Logs recovered panics at `error` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCrashReporter;

impl CrashReporter for TracingCrashReporter {
    fn report(&self, context: &str, message: &str) {
        tracing::error!("Recovered panic in {}: {}", context, message);
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
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
    fn extracts_string_payloads() {
        let payload = std::panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static");

        let payload = std::panic::catch_unwind(|| panic!("formatted {}", 42)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "formatted 42");

        let payload = std::panic::catch_unwind(|| std::panic::panic_any(7u8)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
