use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Normalized identity fields consumed by the identity upsert. Each
/// provider maps its own payload shape into this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub provider_user_id: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Supported identity providers. A closed set: adding a provider means
/// adding a variant and its field mapping here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Github,
}

impl Provider {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Github => "github",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "google" => Ok(Provider::Google),
            "github" => Ok(Provider::Github),
            other => Err(Error::BadRequest(format!("unknown provider: {other}"))),
        }
    }

    /// Maps a raw provider userinfo payload to normalized fields.
    ///
    /// Google returns `{id, email, name, picture}`; GitHub returns
    /// `{id, email, name, avatar_url}` with a numeric id.
    pub fn resolve(&self, raw: &Value) -> Result<Profile> {
        let (id_key, name_key, avatar_key) = match self {
            Provider::Google => ("id", "name", "picture"),
            Provider::Github => ("id", "name", "avatar_url"),
        };

        let provider_user_id = match &raw[id_key] {
            Value::String(s) if !s.is_empty() => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => {
                return Err(Error::BadRequest(format!(
                    "{} profile missing '{id_key}'",
                    self.as_str()
                )));
            }
        };

        let email = raw["email"]
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                Error::BadRequest(format!("{} profile missing 'email'", self.as_str()))
            })?
            .to_string();

        Ok(Profile {
            provider_user_id,
            email,
            display_name: raw[name_key].as_str().map(String::from),
            avatar_url: raw[avatar_key].as_str().map(String::from),
        })
    }
}
