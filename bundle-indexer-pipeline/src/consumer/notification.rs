//! Notification that a bundle version was stored or deleted.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::PipelineError;

/// The input of one indexing run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleNotification {
    pub bundle_uuid: Uuid,
    pub bundle_version: String,
    /// Whether the bundle version was deleted rather than stored.
    #[serde(default)]
    pub deleted: bool,
}

impl BundleNotification {
    pub fn new(bundle_uuid: Uuid, bundle_version: impl Into<String>) -> Self {
        Self {
            bundle_uuid,
            bundle_version: bundle_version.into(),
            deleted: false,
        }
    }

    pub fn deletion(bundle_uuid: Uuid, bundle_version: impl Into<String>) -> Self {
        Self {
            deleted: true,
            ..Self::new(bundle_uuid, bundle_version)
        }
    }

    /// Read a notification from a subscription event.
    ///
    /// The bundle fields are either at the top level or nested under
    /// `match`, as subscription callbacks deliver them. A `deleted` flag is
    /// looked up in the same place and at the top level.
    ///
    /// # Arguments
    ///
    /// * `event` - The event payload
    ///
    /// # Returns
    ///
    /// * `Ok(BundleNotification)` - The bundle the event refers to
    /// * `Err(PipelineError)` - If the bundle UUID or version is missing or malformed
    pub fn from_event(event: &Value) -> Result<Self, PipelineError> {
        let fields = event.get("match").unwrap_or(event);

        let bundle_uuid = fields
            .get("bundle_uuid")
            .and_then(Value::as_str)
            .ok_or_else(|| PipelineError::invalid_notification("missing bundle_uuid"))?;
        let bundle_uuid = Uuid::parse_str(bundle_uuid).map_err(|e| {
            PipelineError::invalid_notification(format!("bad bundle_uuid {bundle_uuid:?}: {e}"))
        })?;
        let bundle_version = fields
            .get("bundle_version")
            .and_then(Value::as_str)
            .filter(|version| !version.is_empty())
            .ok_or_else(|| PipelineError::invalid_notification("missing bundle_version"))?;
        let deleted = [fields, event]
            .iter()
            .any(|source| source.get("deleted").and_then(Value::as_bool) == Some(true));

        Ok(Self {
            bundle_uuid,
            bundle_version: bundle_version.to_string(),
            deleted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_nested_event() {
        let event = json!({
            "subscription_id": "sub",
            "match": {
                "bundle_uuid": "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa",
                "bundle_version": "2020-01-01T00:00:00.000Z"
            }
        });

        let notification = BundleNotification::from_event(&event).unwrap();

        assert_eq!(
            notification,
            BundleNotification::new(
                Uuid::parse_str("aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa").unwrap(),
                "2020-01-01T00:00:00.000Z"
            )
        );
    }

    #[test]
    fn test_from_flat_deletion_event() {
        let uuid = Uuid::new_v4();
        let event = json!({
            "bundle_uuid": uuid.to_string(),
            "bundle_version": "2020-01-02T00:00:00.000Z",
            "deleted": true
        });

        let notification = BundleNotification::from_event(&event).unwrap();

        assert_eq!(
            notification,
            BundleNotification::deletion(uuid, "2020-01-02T00:00:00.000Z")
        );
    }

    #[test]
    fn test_invalid_events_are_rejected() {
        let missing_version = json!({"match": {"bundle_uuid": Uuid::new_v4().to_string()}});
        let bad_uuid = json!({"bundle_uuid": "nope", "bundle_version": "v"});

        for event in [missing_version, bad_uuid] {
            assert!(matches!(
                BundleNotification::from_event(&event),
                Err(PipelineError::InvalidNotification(_))
            ));
        }
    }
}
