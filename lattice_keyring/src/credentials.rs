use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Pairing credentials of a Lattice, as returned by the connector.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(rename = "deviceID")]
    pub device_id: Option<String>,
    pub password: Option<String>,

    /// Overrides the signing service url of the network
    pub endpoint: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("device_id", &self.device_id)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl Credentials {
    pub fn new(device_id: &str, password: &str, endpoint: Option<&str>) -> Self {
        Self {
            device_id: Some(device_id.to_string()),
            password: Some(password.to_string()),
            endpoint: endpoint.map(ToString::to_string),
        }
    }

    pub fn has_credentials(&self, app_name: &str) -> bool {
        self.device_id.is_some() && self.password.is_some() && !app_name.is_empty()
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Derive the key seeding the session transport encryption.
    ///
    /// It's the sha256 of password, device id and app name concatenated, the signing service
    /// recognizes a paired app only if the same key is used across reconnections.
    pub fn session_key(&self, app_name: &str) -> Result<[u8; 32]> {
        match (&self.password, &self.device_id) {
            (Some(password), Some(device_id)) if !app_name.is_empty() => {
                let mut hasher = Sha256::new();
                hasher.update(password.as_bytes());
                hasher.update(device_id.as_bytes());
                hasher.update(app_name.as_bytes());
                Ok(hasher.finalize().into())
            }
            _ => Err(Error::MissingCredentials),
        }
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}

/// The json payload sent back by the connector page.
#[derive(Debug, Deserialize)]
pub(crate) struct CredentialsPayload {
    #[serde(rename = "deviceID")]
    device_id: Option<String>,
    password: Option<String>,
    endpoint: Option<String>,
}

impl CredentialsPayload {
    pub(crate) fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    pub(crate) fn into_credentials(self) -> Result<Credentials> {
        let non_empty = |s: Option<String>| s.filter(|s| !s.is_empty());
        match (non_empty(self.device_id), non_empty(self.password)) {
            (Some(device_id), Some(password)) => Ok(Credentials {
                device_id: Some(device_id),
                password: Some(password),
                endpoint: non_empty(self.endpoint),
            }),
            _ => Err(Error::InvalidCredentials),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn has_credentials() {
        let empty = Credentials::default();
        assert!(!empty.has_credentials("app"));

        let creds = Credentials::new("dev", "pass", None);
        assert!(creds.has_credentials("app"));
        assert!(!creds.has_credentials(""));

        let half = Credentials {
            device_id: Some("dev".into()),
            ..Default::default()
        };
        assert!(!half.has_credentials("app"));
    }

    #[test]
    fn session_key_deterministic() {
        let creds = Credentials::new("dev", "pass", None);
        let a = creds.session_key("app").unwrap();
        let b = creds.session_key("app").unwrap();
        assert_eq!(a, b);

        // the endpoint doesn't contribute
        let with_endpoint = Credentials::new("dev", "pass", Some("https://example.com"));
        assert_eq!(with_endpoint.session_key("app").unwrap(), a);

        assert_ne!(
            Credentials::new("dev", "pass2", None).session_key("app").unwrap(),
            a
        );
        assert_ne!(
            Credentials::new("dev2", "pass", None).session_key("app").unwrap(),
            a
        );
        assert_ne!(creds.session_key("app2").unwrap(), a);
    }

    #[test]
    fn session_key_vector() {
        let creds = Credentials::new("dev", "pass", None);
        let expected = Sha256::digest(b"passdevapp");
        assert_eq!(creds.session_key("app").unwrap()[..], expected[..]);
    }

    #[test]
    fn session_key_missing_credentials() {
        let err = Credentials::default().session_key("app").unwrap_err();
        assert!(matches!(err, Error::MissingCredentials));
        let creds = Credentials::new("dev", "pass", None);
        assert!(matches!(
            creds.session_key("").unwrap_err(),
            Error::MissingCredentials
        ));
    }

    #[test]
    fn payload() {
        let payload =
            CredentialsPayload::from_json(r#"{"deviceID":"abc","password":"pw"}"#).unwrap();
        let creds = payload.into_credentials().unwrap();
        assert_eq!(creds, Credentials::new("abc", "pw", None));

        let payload = CredentialsPayload::from_json(
            r#"{"deviceID":"abc","password":"pw","endpoint":"https://my.signer"}"#,
        )
        .unwrap();
        let creds = payload.into_credentials().unwrap();
        assert_eq!(creds.endpoint(), Some("https://my.signer"));

        let payload = CredentialsPayload::from_json(r#"{"deviceID":"abc"}"#).unwrap();
        assert!(matches!(
            payload.into_credentials().unwrap_err(),
            Error::InvalidCredentials
        ));

        assert!(CredentialsPayload::from_json("not json").is_err());
    }

    #[test]
    fn debug_redacts_password() {
        let creds = Credentials::new("dev", "secret", None);
        let s = format!("{creds:?}");
        assert!(!s.contains("secret"));
    }
}
