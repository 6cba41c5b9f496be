use serde::{Deserialize, Serialize};

/// Identity reported by the controller
///
/// Set from the handshake reply and replaced whenever the controller pushes
/// a new identity frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(default)]
    pub controller_name: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub serial: Option<String>,
}

impl Identity {
    pub fn new(
        controller_name: Option<String>,
        project_name: Option<String>,
        serial: Option<String>,
    ) -> Self {
        Self {
            controller_name,
            project_name,
            serial,
        }
    }

    /// Check if nothing has been reported yet
    pub fn is_empty(&self) -> bool {
        self.controller_name.is_none() && self.project_name.is_none() && self.serial.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_from_json() {
        let identity: Identity = serde_json::from_str(
            r#"{"controllerName":"HS-1","projectName":"Boiler room","serial":"0042"}"#,
        )
        .unwrap();
        assert_eq!(identity.controller_name.as_deref(), Some("HS-1"));
        assert_eq!(identity.project_name.as_deref(), Some("Boiler room"));
        assert_eq!(identity.serial.as_deref(), Some("0042"));
    }

    #[test]
    fn test_identity_default_is_empty() {
        assert!(Identity::default().is_empty());
        let partial: Identity = serde_json::from_str(r#"{"serial":"7"}"#).unwrap();
        assert!(!partial.is_empty());
        assert!(partial.controller_name.is_none());
    }
}
