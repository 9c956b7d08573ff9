//! Leveled logger. Writes to the Workers console on wasm32, stderr elsewhere.

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug = 0,
    #[default]
    Info = 1,
    Warn = 2,
    Error = 3,
    None = 4,
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "none" | "off" => Ok(LogLevel::None),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Logger {
    level: LogLevel,
    prefix: String,
}

impl Logger {
    pub fn new(level: LogLevel, prefix: impl Into<String>) -> Self {
        Self {
            level,
            prefix: prefix.into(),
        }
    }

    /// Same level, extra prefix segment (e.g. a per-send id).
    pub fn scoped(&self, scope: &str) -> Self {
        Self {
            level: self.level,
            prefix: format!("{}[{}] ", self.prefix.trim_end(), scope),
        }
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn debug(&self, message: &str) {
        if self.level <= LogLevel::Debug {
            self.emit(LogLevel::Debug, message);
        }
    }

    pub fn info(&self, message: &str) {
        if self.level <= LogLevel::Info {
            self.emit(LogLevel::Info, message);
        }
    }

    pub fn warn(&self, message: &str) {
        if self.level <= LogLevel::Warn {
            self.emit(LogLevel::Warn, message);
        }
    }

    pub fn error(&self, message: &str) {
        if self.level <= LogLevel::Error {
            self.emit(LogLevel::Error, message);
        }
    }

    #[cfg(target_arch = "wasm32")]
    fn emit(&self, level: LogLevel, message: &str) {
        let line = format!("{}{}", self.prefix, message);
        match level {
            LogLevel::Warn => worker::console_warn!("{}", line),
            LogLevel::Error => worker::console_error!("{}", line),
            _ => worker::console_log!("{}", line),
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn emit(&self, level: LogLevel, message: &str) {
        eprintln!("{:?} {}{}", level, self.prefix, message);
    }
}
