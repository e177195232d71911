use serde::{Deserialize, Serialize};

/// Diagnostic verbosity. Never affects control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebugMode {
    #[default]
    None,
    Headers,
    Logs,
    Full,
}

impl DebugMode {
    pub fn should_log_debug(&self) -> bool {
        matches!(self, DebugMode::Logs | DebugMode::Full)
    }

    pub fn should_emit_headers(&self) -> bool {
        matches!(self, DebugMode::Headers | DebugMode::Full)
    }
}

#[doc(hidden)]
pub fn emit(line: &str) {
    #[cfg(target_arch = "wasm32")]
    worker::console_log!("{}", line);
    #[cfg(not(target_arch = "wasm32"))]
    eprintln!("{}", line);
}

/// Log at INFO level (always displayed)
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::emit(&format!("[INFO] {}", format!($($arg)*)))
    };
}

/// Log at DEBUG level (only when debug logging is enabled)
#[macro_export]
macro_rules! log_debug {
    ($mode:expr, $($arg:tt)*) => {
        if $mode.should_log_debug() {
            $crate::logger::emit(&format!("[DEBUG] {}", format!($($arg)*)))
        }
    };
}

/// Log errors (always displayed)
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logger::emit(&format!("[ERROR] {}", format!($($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_mode_parsing() {
        let mode: DebugMode = serde_json::from_str("\"full\"").unwrap();
        assert_eq!(mode, DebugMode::Full);
        assert!(serde_json::from_str::<DebugMode>("\"verbose\"").is_err());
    }

    #[test]
    fn test_debug_mode_gates() {
        assert!(!DebugMode::None.should_log_debug());
        assert!(!DebugMode::None.should_emit_headers());
        assert!(DebugMode::Headers.should_emit_headers());
        assert!(!DebugMode::Headers.should_log_debug());
        assert!(DebugMode::Logs.should_log_debug());
        assert!(DebugMode::Full.should_log_debug() && DebugMode::Full.should_emit_headers());
    }
}
