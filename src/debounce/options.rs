//! Debounce policy options and loose numeric coercion.

use std::time::Duration;

use serde_json::Value;

/// Edge and ceiling options for a debounced wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceOptions {
    /// Invoke on the leading edge of a burst (default `false`).
    pub leading: bool,
    /// Invoke on the trailing edge of a burst (default `true`).
    pub trailing: bool,
    /// Longest the target may go uninvoked while calls keep arriving.
    /// Floored at the wait. `None` means no ceiling.
    pub max_wait: Option<Duration>,
}

impl Default for DebounceOptions {
    fn default() -> Self {
        Self {
            leading: false,
            trailing: true,
            max_wait: None,
        }
    }
}

impl DebounceOptions {
    /// Options that invoke only on the leading edge.
    pub fn leading_only() -> Self {
        Self {
            leading: true,
            trailing: false,
            max_wait: None,
        }
    }

    pub fn with_leading(mut self, leading: bool) -> Self {
        self.leading = leading;
        self
    }

    pub fn with_trailing(mut self, trailing: bool) -> Self {
        self.trailing = trailing;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }
}

/// Resolved policy in whole milliseconds, as used by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Policy {
    pub wait: u64,
    pub max_wait: Option<u64>,
    pub leading: bool,
    pub trailing: bool,
}

impl Policy {
    pub fn new(wait: Duration, options: DebounceOptions) -> Self {
        let wait = duration_millis(wait);
        Self {
            wait,
            max_wait: options.max_wait.map(|max| duration_millis(max).max(wait)),
            leading: options.leading,
            trailing: options.trailing,
        }
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Coerce a loosely typed value into a millisecond count.
///
/// Numbers are truncated; numeric strings are parsed. Anything else, and any
/// negative or non-finite number, yields 0.
pub fn coerce_millis(value: &Value) -> u64 {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };

    match number {
        Some(n) if n.is_finite() && n > 0.0 => {
            if n >= u64::MAX as f64 {
                u64::MAX
            } else {
                n as u64
            }
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_options() {
        let options = DebounceOptions::default();
        assert!(!options.leading);
        assert!(options.trailing);
        assert_eq!(options.max_wait, None);
    }

    #[test]
    fn test_max_wait_floored_at_wait() {
        let options = DebounceOptions::default().with_max_wait(Duration::from_millis(50));
        let policy = Policy::new(Duration::from_millis(200), options);

        assert_eq!(policy.wait, 200);
        assert_eq!(policy.max_wait, Some(200));
    }

    #[test]
    fn test_max_wait_kept_when_larger() {
        let options = DebounceOptions::leading_only().with_max_wait(Duration::from_millis(300));
        let policy = Policy::new(Duration::from_millis(100), options);

        assert_eq!(policy.max_wait, Some(300));
        assert!(policy.leading);
        assert!(!policy.trailing);
    }

    #[test]
    fn test_coerce_numbers() {
        assert_eq!(coerce_millis(&json!(250)), 250);
        assert_eq!(coerce_millis(&json!(99.9)), 99);
        assert_eq!(coerce_millis(&json!(-5)), 0);
    }

    #[test]
    fn test_coerce_strings() {
        assert_eq!(coerce_millis(&json!("150")), 150);
        assert_eq!(coerce_millis(&json!(" 20.5 ")), 20);
        assert_eq!(coerce_millis(&json!("soon")), 0);
        assert_eq!(coerce_millis(&json!("")), 0);
        assert_eq!(coerce_millis(&json!("NaN")), 0);
    }

    #[test]
    fn test_coerce_other_values() {
        assert_eq!(coerce_millis(&Value::Null), 0);
        assert_eq!(coerce_millis(&json!([100])), 0);
        assert_eq!(coerce_millis(&json!({"ms": 100})), 0);
        assert_eq!(coerce_millis(&json!(true)), 1);
    }
}
