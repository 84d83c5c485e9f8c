use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub full_name: String,
}

/// The parts of a push delivery the dispatcher looks at. Everything else in the
/// payload is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub repository: Option<Repository>,
}

impl WebhookEvent {
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            after: None,
            repository: None,
        }
    }

    pub fn short_commit(&self) -> Option<&str> {
        self.after.as_deref().map(|sha| sha.get(..7).unwrap_or(sha))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_push_payload() {
        let event = WebhookEvent::from_slice(
            br#"{
                "ref": "refs/heads/main",
                "before": "0000000000000000000000000000000000000000",
                "after": "6113728f27ae82c7b1a177c8d03f9e96e0adf246",
                "repository": {"full_name": "octo/blog", "private": false},
                "pusher": {"name": "octo"}
            }"#,
        )
        .unwrap();

        assert_eq!(event.reference, "refs/heads/main");
        assert_eq!(event.short_commit(), Some("6113728"));
        assert_eq!(event.repository.unwrap().full_name, "octo/blog");
    }

    #[test]
    fn ref_is_required() {
        assert!(WebhookEvent::from_slice(br#"{"zen":"Keep it logically awesome."}"#).is_err());
    }

    #[test]
    fn optional_fields_may_be_absent() {
        let event = WebhookEvent::from_slice(br#"{"ref":"refs/tags/v1"}"#).unwrap();
        assert!(event.after.is_none());
        assert!(event.short_commit().is_none());
    }
}
