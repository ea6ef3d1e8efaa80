use crate::config::ConfigError;
use crate::port::PortError;
use std::fmt;

/// Application-level error for the `serial-adapter` binary.
///
/// Library callers deal with [`PortError`] and [`ConfigError`] directly; this
/// type only gathers them for the command-line front end.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Port(PortError),
    NoPortConfigured,
    InvalidPayload(String),
    Logging(String),
    Io(std::io::Error),
    Serde(serde_json::Error),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "Configuration problem: {e}"),
            Self::Port(e) if e.is_timeout() => write!(f, "No answer from the serial line: {e}"),
            Self::Port(e) => write!(f, "A serial port error occurred: {e}"),
            Self::NoPortConfigured => write!(
                f,
                "No serial port given. Pass --port or set [serial] port in the config file."
            ),
            Self::InvalidPayload(details) => write!(f, "The payload is invalid: {details}"),
            Self::Logging(details) => write!(f, "Could not initialise logging: {details}"),
            Self::Io(e) => write!(f, "An I/O error occurred: {e}"),
            Self::Serde(e) => write!(f, "A serialization error occurred: {e}"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Port(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::Serde(e) => Some(e),
            _ => None,
        }
    }
}

// Implement `From` conversions to allow the `?` operator to work seamlessly.
impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<PortError> for AppError {
    fn from(err: PortError) -> Self {
        AppError::Port(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serde(err)
    }
}

/// Parse a payload written as hex, with optional whitespace, `:` or `0x`
/// prefixes between bytes: `"01 04 00 00 00 02"`, `"0104000000 02"`.
pub fn parse_hex(input: &str) -> Result<Vec<u8>, AppError> {
    let digits: String = input
        .split(|c: char| c.is_whitespace() || c == ':' || c == ',')
        .map(|token| token.trim_start_matches("0x").trim_start_matches("0X"))
        .collect();

    if let Some(bad) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(AppError::InvalidPayload(format!(
            "{bad:?} is not a hex digit"
        )));
    }
    if digits.len() % 2 != 0 {
        return Err(AppError::InvalidPayload(format!(
            "odd number of hex digits in {input:?}"
        )));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| {
                AppError::InvalidPayload(format!("{:?} is not a hex byte", &digits[i..i + 2]))
            })
        })
        .collect()
}

/// Render bytes as space-separated upper-case hex.
pub fn format_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_hex_forms() {
        assert_eq!(
            parse_hex("01 04 00 00 00 02").unwrap(),
            vec![0x01, 0x04, 0x00, 0x00, 0x00, 0x02]
        );
        assert_eq!(parse_hex("0x01:0xff").unwrap(), vec![0x01, 0xFF]);
        assert_eq!(parse_hex("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_parse_hex_rejects_garbage() {
        assert!(matches!(parse_hex("0"), Err(AppError::InvalidPayload(_))));
        assert!(matches!(parse_hex("zz"), Err(AppError::InvalidPayload(_))));
    }

    #[test]
    fn test_format_hex() {
        assert_eq!(format_hex(&[0x01, 0xAB, 0x00]), "01 AB 00");
        assert_eq!(format_hex(&[]), "");
    }

    #[test]
    fn test_timeout_display() {
        let err = AppError::from(PortError::timeout(Duration::from_millis(200)));
        assert!(err.to_string().starts_with("No answer from the serial line"));
    }
}
