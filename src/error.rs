use thiserror::Error;

/// Trip logger error types
#[derive(Error, Debug)]
pub enum LoggerError {
    /// Device failed identity validation or refused its startup configuration.
    #[error("device identity mismatch: expected {expected:#04x}, got {found:#04x}")]
    IdentityMismatch { expected: u8, found: u8 },

    #[error("configuration failed: {0}")]
    Configuration(String),

    /// Operating mode opcode outside the device's closed mode set. Raised
    /// before any register write takes effect.
    #[error("invalid operating mode: {0:#04x}")]
    InvalidMode(u8),

    /// A single-channel read failed mid-session. Recoverable: the sample is
    /// skipped and the channel retried on its next due tick.
    #[error("sensor read failed: {0}")]
    SensorRead(String),

    #[error("bus transaction failed: {0}")]
    Bus(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LoggerError {
    /// True for failures the session survives by dropping one sample.
    pub fn is_transient(&self) -> bool {
        matches!(self, LoggerError::SensorRead(_) | LoggerError::Bus(_))
    }
}

/// Result type for logger operations
pub type Result<T> = std::result::Result<T, LoggerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(LoggerError::SensorRead("imu nack".to_string()).is_transient());
        assert!(LoggerError::Bus("arbitration lost".to_string()).is_transient());
        assert!(!LoggerError::InvalidMode(0x42).is_transient());
        assert!(!LoggerError::IdentityMismatch {
            expected: 0xA0,
            found: 0x00
        }
        .is_transient());
    }

    #[test]
    fn test_display_messages() {
        let err = LoggerError::IdentityMismatch {
            expected: 0xA0,
            found: 0x12,
        };
        assert_eq!(
            err.to_string(),
            "device identity mismatch: expected 0xa0, got 0x12"
        );

        let err = LoggerError::InvalidMode(0x09);
        assert!(err.to_string().contains("0x09"));
    }
}
