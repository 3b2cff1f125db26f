use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt};

pub const DEFAULT_API_VERSION: &str = "60.0";

/// Session details for one org.
///
/// Obtaining the access token is the caller's concern.
#[derive(Clone, Serialize, Deserialize)]
pub struct OrgCredentials {
    pub alias: String,
    pub instance_url: String,
    pub access_token: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

impl OrgCredentials {
    /// Reads `SF_INSTANCE_URL`, `SF_ACCESS_TOKEN` and optionally
    /// `SF_API_VERSION` and `SF_ORG_ALIAS` from a variable map.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, String> {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let instance_url = get("SF_INSTANCE_URL").ok_or("SF_INSTANCE_URL is not set")?;
        let access_token = get("SF_ACCESS_TOKEN").ok_or("SF_ACCESS_TOKEN is not set")?;

        Ok(OrgCredentials {
            alias: get("SF_ORG_ALIAS").unwrap_or_else(|| "default".to_string()),
            instance_url,
            access_token,
            api_version: get("SF_API_VERSION").unwrap_or_else(default_api_version),
        })
    }
}

impl fmt::Debug for OrgCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrgCredentials")
            .field("alias", &self.alias)
            .field("instance_url", &self.instance_url)
            .field("access_token", &"***")
            .field("api_version", &self.api_version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vars_requires_token() {
        let mut vars = HashMap::new();
        vars.insert("SF_INSTANCE_URL".into(), "https://x".into());
        assert!(OrgCredentials::from_vars(&vars).is_err());

        vars.insert("SF_ACCESS_TOKEN".into(), "abc".into());
        let creds = OrgCredentials::from_vars(&vars).unwrap();
        assert_eq!(creds.alias, "default");
        assert_eq!(creds.api_version, DEFAULT_API_VERSION);
        assert!(!format!("{creds:?}").contains("abc"));
    }
}
