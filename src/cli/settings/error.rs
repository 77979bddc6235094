use std::fmt;

#[derive(Debug)]
pub enum SettingError {
    UnknownKey(String),
    InvalidBoolean(String),
    /// `set` was given no value. `example` is a full command line.
    MissingArgs {
        hint: &'static str,
        example: &'static str,
    },
    ConfigError(String),
}

impl SettingError {
    fn help(&self) -> Option<String> {
        match self {
            SettingError::UnknownKey(_) => {
                Some("Run 'murmur config' to see the available keys.".to_string())
            }
            SettingError::InvalidBoolean(_) => {
                Some("Use on/off, true/false, or yes/no.".to_string())
            }
            SettingError::MissingArgs { example, .. } => Some(format!("Example: {example}")),
            SettingError::ConfigError(_) => None,
        }
    }

    /// Writes the error and any usage hint to stderr.
    pub fn print(&self) {
        eprintln!("❌ {self}");
        if let Some(help) = self.help() {
            eprintln!("   {help}");
        }
    }
}

impl fmt::Display for SettingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingError::UnknownKey(key) => write!(f, "Unknown config key: {key}"),
            SettingError::InvalidBoolean(input) => write!(f, "Not an on/off value: {input}"),
            SettingError::MissingArgs { hint, .. } => f.write_str(hint),
            SettingError::ConfigError(msg) => write!(f, "Could not save the configuration: {msg}"),
        }
    }
}

impl std::error::Error for SettingError {}
