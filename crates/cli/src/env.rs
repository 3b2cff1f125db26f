use connectors::salesforce::credentials::OrgCredentials;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::CliError;

/// Process environment overlaid with the contents of `.env` files.
#[derive(Debug, Clone)]
pub struct EnvManager {
    vars: HashMap<String, String>,
    sensitive_patterns: Vec<String>,
}

impl EnvManager {
    pub fn new() -> Self {
        Self {
            vars: std::env::vars().collect(),
            sensitive_patterns: Self::default_sensitive_patterns(),
        }
    }

    /// `<config dir>/dataload/.env`, when the platform has a config dir.
    pub fn default_file() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("dataload").join(".env"))
    }

    /// Load variables from a .env file
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), CliError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("Failed to read env file {}: {}", path.display(), e))
        })?;

        let loaded = self.parse_env_content(&content)?;
        for key in &loaded {
            debug!(key = %key, value = %self.display_value(key), "Loaded env variable");
        }
        Ok(())
    }

    pub fn all(&self) -> &HashMap<String, String> {
        &self.vars
    }

    pub fn credentials(&self) -> Result<OrgCredentials, CliError> {
        OrgCredentials::from_vars(&self.vars).map_err(CliError::Credentials)
    }

    pub fn is_sensitive(&self, key: &str) -> bool {
        let key = key.to_ascii_lowercase();
        self.sensitive_patterns.iter().any(|p| key.contains(p.as_str()))
    }

    /// The value of `key` fit for logs.
    fn display_value(&self, key: &str) -> String {
        match self.vars.get(key) {
            Some(_) if self.is_sensitive(key) => "****".to_string(),
            Some(value) => value.clone(),
            None => String::new(),
        }
    }

    /// Returns the keys set by `content`, in file order.
    fn parse_env_content(&mut self, content: &str) -> Result<Vec<String>, CliError> {
        let mut loaded = Vec::new();
        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let line = line.strip_prefix("export ").unwrap_or(line);
            let Some((key, value)) = line.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid env file: malformed line {} (expected KEY=VALUE)",
                    line_num + 1
                )));
            };

            let key = key.trim();
            if key.is_empty() {
                return Err(CliError::Config(format!(
                    "Invalid env file: empty key at line {}",
                    line_num + 1
                )));
            }

            self.vars.insert(key.to_string(), Self::unquote_value(value));
            loaded.push(key.to_string());
        }

        Ok(loaded)
    }

    fn unquote_value(value: &str) -> String {
        let value = value.trim();
        for quote in ['"', '\''] {
            if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
                return value[1..value.len() - 1].to_string();
            }
        }
        value.to_string()
    }

    fn default_sensitive_patterns() -> Vec<String> {
        ["password", "passwd", "secret", "token", "key", "auth", "credential", "private"]
            .into_iter()
            .map(String::from)
            .collect()
    }
}

impl Default for EnvManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn empty() -> EnvManager {
        EnvManager {
            vars: HashMap::new(),
            sensitive_patterns: EnvManager::default_sensitive_patterns(),
        }
    }

    #[test]
    fn test_parse_basic_env() {
        let mut env = empty();
        let content = r#"
# Comment
KEY1=value1
export KEY2=value2
        "#;

        let loaded = env.parse_env_content(content).unwrap();
        assert_eq!(loaded, vec!["KEY1", "KEY2"]);
        assert_eq!(env.vars.get("KEY1").unwrap(), "value1");
        assert_eq!(env.vars.get("KEY2").unwrap(), "value2");
    }

    #[test]
    fn test_parse_quoted_values() {
        let mut env = empty();
        let content = r#"
QUOTED="value with spaces"
SINGLE='single quoted'
UNQUOTED=no_spaces
TOKEN=a=b
        "#;

        env.parse_env_content(content).unwrap();
        assert_eq!(env.vars.get("QUOTED").unwrap(), "value with spaces");
        assert_eq!(env.vars.get("SINGLE").unwrap(), "single quoted");
        assert_eq!(env.vars.get("UNQUOTED").unwrap(), "no_spaces");
        assert_eq!(env.vars.get("TOKEN").unwrap(), "a=b");
    }

    #[test]
    fn test_invalid_env_format() {
        let mut env = empty();
        assert!(env.parse_env_content("INVALID LINE WITHOUT EQUALS").is_err());
        assert!(env.parse_env_content("=value").is_err());
    }

    #[test]
    fn test_credentials_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "SF_INSTANCE_URL=https://example.my.salesforce.com").unwrap();
        writeln!(file, "SF_ACCESS_TOKEN=\"00Dxx!secret\"").unwrap();

        let mut env = empty();
        env.load_from_file(file.path()).unwrap();

        let creds = env.credentials().unwrap();
        assert_eq!(creds.instance_url, "https://example.my.salesforce.com");
        assert_eq!(creds.access_token, "00Dxx!secret");
        assert_eq!(env.display_value("SF_ACCESS_TOKEN"), "****");
        assert_eq!(
            env.display_value("SF_INSTANCE_URL"),
            "https://example.my.salesforce.com"
        );
    }

    #[test]
    fn test_missing_credentials() {
        let env = empty();
        assert!(matches!(env.credentials(), Err(CliError::Credentials(_))));
    }
}
