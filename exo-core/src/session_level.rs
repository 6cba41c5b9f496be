//! Session permission levels
//!
//! After authentication the controller grants the session an integer level
//! between 0 and 4. The level decides whether the session may only read or
//! may also write points.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Permission level granted to an authenticated session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SessionLevel {
    /// No permissions
    None,
    /// Read-only access
    Guest,
    /// Normal operation, may write
    Operator,
    /// Service technician
    Service,
    /// Full access
    Admin,
}

impl SessionLevel {
    /// Map a level reported by the controller
    ///
    /// # Returns
    ///
    /// `None` when the value is above the known 0-4 range. Values below 0
    /// grant no permissions.
    pub fn from_level(level: i64) -> Option<Self> {
        match level {
            i64::MIN..=0 => Some(SessionLevel::None),
            1 => Some(SessionLevel::Guest),
            2 => Some(SessionLevel::Operator),
            3 => Some(SessionLevel::Service),
            4 => Some(SessionLevel::Admin),
            _ => None,
        }
    }

    /// Get the numeric level as carried on the wire
    pub fn level(&self) -> u8 {
        match self {
            SessionLevel::None => 0,
            SessionLevel::Guest => 1,
            SessionLevel::Operator => 2,
            SessionLevel::Service => 3,
            SessionLevel::Admin => 4,
        }
    }

    /// Get the role name
    pub fn role_name(&self) -> &'static str {
        match self {
            SessionLevel::None => "None",
            SessionLevel::Guest => "Guest",
            SessionLevel::Operator => "Operator",
            SessionLevel::Service => "Service",
            SessionLevel::Admin => "Admin",
        }
    }

    /// Check if the level allows writing points (Operator and above)
    pub fn can_write(&self) -> bool {
        *self >= SessionLevel::Operator
    }
}

impl fmt::Display for SessionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.role_name(), self.level())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_level() {
        assert_eq!(SessionLevel::from_level(0), Some(SessionLevel::None));
        assert_eq!(SessionLevel::from_level(2), Some(SessionLevel::Operator));
        assert_eq!(SessionLevel::from_level(4), Some(SessionLevel::Admin));
        assert_eq!(SessionLevel::from_level(5), None);
        assert_eq!(SessionLevel::from_level(-1), Some(SessionLevel::None));
        assert_eq!(SessionLevel::from_level(i64::MIN), Some(SessionLevel::None));
    }

    #[test]
    fn test_can_write() {
        assert!(!SessionLevel::None.can_write());
        assert!(!SessionLevel::Guest.can_write());
        assert!(SessionLevel::Operator.can_write());
        assert!(SessionLevel::Service.can_write());
        assert!(SessionLevel::Admin.can_write());
    }

    #[test]
    fn test_level_round_trip() {
        for level in 0..=4 {
            let session_level = SessionLevel::from_level(level).unwrap();
            assert_eq!(session_level.level() as i64, level);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(SessionLevel::Service.to_string(), "Service (3)");
    }
}
