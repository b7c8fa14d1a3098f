/// Lifecycle of a live voice session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Connecting,
    Open,
    Error,
    Closed,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Error | SessionStatus::Closed)
    }
}

/// Health status for a capture or output device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceStatus {
    #[default]
    Ok,
    Error,
    Disabled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_status_default_connecting() {
        assert_eq!(SessionStatus::default(), SessionStatus::Connecting);
    }

    #[test]
    fn test_session_status_terminal() {
        assert!(!SessionStatus::Connecting.is_terminal());
        assert!(!SessionStatus::Open.is_terminal());
        assert!(SessionStatus::Error.is_terminal());
        assert!(SessionStatus::Closed.is_terminal());
    }

    #[test]
    fn test_device_status_default_ok() {
        assert_eq!(DeviceStatus::default(), DeviceStatus::Ok);
    }
}
