use std::collections::HashMap;
use std::env;
use std::fmt;

/// Somewhere secrets can be read from by variable name.
pub trait SecretSource: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
}

/// Reads secrets from the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecrets;

impl SecretSource for EnvSecrets {
    fn get(&self, name: &str) -> Option<String> {
        env::var(name).ok()
    }
}

impl SecretSource for HashMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        HashMap::get(self, name).cloned()
    }
}

/// A shared HMAC key. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}

/// Per-target secret lookup. The variable for target `blog` with prefix
/// `WEBHOOK_SECRET_` is `WEBHOOK_SECRET_BLOG`.
pub struct Secrets {
    prefix: String,
    source: Box<dyn SecretSource>,
}

impl Secrets {
    pub fn new(prefix: impl Into<String>, source: impl SecretSource + 'static) -> Self {
        Self {
            prefix: prefix.into(),
            source: Box::new(source),
        }
    }

    pub fn from_env(prefix: impl Into<String>) -> Self {
        Self::new(prefix, EnvSecrets)
    }

    pub fn variable_name(&self, target_id: &str) -> String {
        format!("{}{}", self.prefix, target_id.to_uppercase())
    }

    /// Empty values count as unset.
    pub fn secret_for(&self, target_id: &str) -> Option<Secret> {
        self.source
            .get(&self.variable_name(target_id))
            .filter(|value| !value.is_empty())
            .map(Secret)
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secrets(pairs: &[(&str, &str)]) -> Secrets {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Secrets::new("WEBHOOK_SECRET_", map)
    }

    #[test]
    fn derives_uppercased_variable_name() {
        let secrets = secrets(&[]);
        assert_eq!(secrets.variable_name("blog"), "WEBHOOK_SECRET_BLOG");
        assert_eq!(secrets.variable_name("my-App"), "WEBHOOK_SECRET_MY-APP");
    }

    #[test]
    fn looks_up_secret_by_derived_name() {
        let secrets = secrets(&[("WEBHOOK_SECRET_BLOG", "hunter2")]);
        assert_eq!(secrets.secret_for("blog").unwrap().as_bytes(), b"hunter2");
        assert!(secrets.secret_for("shop").is_none());
    }

    #[test]
    fn empty_secret_is_treated_as_missing() {
        let secrets = secrets(&[("WEBHOOK_SECRET_BLOG", "")]);
        assert!(secrets.secret_for("blog").is_none());
    }

    #[test]
    fn debug_output_hides_secret_value() {
        let secrets = secrets(&[("WEBHOOK_SECRET_BLOG", "hunter2")]);
        let rendered = format!("{:?}", secrets.secret_for("blog").unwrap());
        assert!(!rendered.contains("hunter2"));
    }
}
