use std::collections::BTreeMap;
use std::fmt::Write as _;
use tracing::Level;

/// Fields attached to every line a [`StructuredLogger`] emits
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Producing module, e.g. "engine", "dbus", "envoy"
    pub component: String,
    pub device_instance: Option<u32>,
    /// Free-form extras, rendered in key order
    pub extra_fields: BTreeMap<String, String>,
}

impl LogContext {
    pub fn new(component: &str) -> Self {
        Self {
            component: component.to_string(),
            device_instance: None,
            extra_fields: BTreeMap::new(),
        }
    }

    pub fn with_device_instance(mut self, device_instance: u32) -> Self {
        self.device_instance = Some(device_instance);
        self
    }

    pub fn with_field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.extra_fields.insert(key.to_string(), value.into());
        self
    }

    /// `key=value` pairs of the extras, comma separated
    fn render_extras(&self) -> String {
        let mut out = String::new();
        for (i, (key, value)) in self.extra_fields.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let _ = write!(out, "{}={}", key, value);
        }
        out
    }
}

// tracing needs the level at compile time, so dispatch per level
macro_rules! emit_at {
    ($level:expr, $($fields:tt)+) => {
        match $level {
            Level::ERROR => tracing::error!($($fields)+),
            Level::WARN => tracing::warn!($($fields)+),
            Level::INFO => tracing::info!($($fields)+),
            Level::DEBUG => tracing::debug!($($fields)+),
            _ => tracing::trace!($($fields)+),
        }
    };
}

/// Component-tagged logger handed to each module
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    pub(crate) context: LogContext,
    extras: String,
}

impl StructuredLogger {
    pub fn new(context: LogContext) -> Self {
        let extras = context.render_extras();
        Self { context, extras }
    }

    pub fn component(&self) -> &str {
        &self.context.component
    }

    pub fn error(&self, message: &str) {
        self.log(Level::ERROR, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::WARN, message);
    }

    pub fn info(&self, message: &str) {
        self.log(Level::INFO, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(Level::DEBUG, message);
    }

    pub fn trace(&self, message: &str) {
        self.log(Level::TRACE, message);
    }

    fn log(&self, level: Level, message: &str) {
        let component = self.context.component.as_str();
        match (self.context.device_instance, self.extras.is_empty()) {
            (Some(instance), true) => {
                emit_at!(level, component, device_instance = instance, "{}", message)
            }
            (Some(instance), false) => emit_at!(
                level,
                component,
                device_instance = instance,
                ctx = %self.extras,
                "{}",
                message
            ),
            (None, true) => emit_at!(level, component, "{}", message),
            (None, false) => emit_at!(level, component, ctx = %self.extras, "{}", message),
        }
    }
}

pub fn get_logger(component: &str) -> StructuredLogger {
    StructuredLogger::new(LogContext::new(component))
}

pub fn get_logger_with_context(context: LogContext) -> StructuredLogger {
    StructuredLogger::new(context)
}
