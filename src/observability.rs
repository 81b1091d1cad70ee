//! Structured diagnostics for the graph engine.
//!
//! The encoder, selectors and trainer make decisions that are hard to follow
//! from the outside. `log_metric!` emits them as a single key/value line on the
//! `debug` level of the `log` facade, so they cost nothing unless a logger is
//! installed and enabled for this crate.

/// Logs a structured key-value metric line at `debug` level.
///
/// # Example
/// ```
/// use zstrong::log_metric;
/// let choice = 2;
/// log_metric!("event" = "select", "node" = 5, "choice" = choice);
/// ```
#[macro_export]
macro_rules! log_metric {
    ($($key:literal = $value:expr),+ $(,)?) => {
        if $crate::__log::log_enabled!($crate::__log::Level::Debug) {
            let mut parts: Vec<String> = Vec::new();
            $(
                parts.push(format!("\"{}\": \"{}\"", $key, $value));
            )+
            $crate::__log::debug!("ZSTRONG_METRIC: {{ {} }}", parts.join(", "));
        }
    };
}

/// Installs `env_logger` as the global logger, honoring `RUST_LOG`.
///
/// Safe to call more than once; only the first call has an effect.
pub fn enable_verbose_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .is_test(cfg!(test))
        .try_init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_enable_verbose_logging_is_idempotent() {
        super::enable_verbose_logging();
        super::enable_verbose_logging();
        log_metric!("event" = "test", "value" = 1);
    }
}
