use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Push item priority
///
/// Controls whether an item may reach a live connection and whether a
/// successful live delivery silences the item's sound hint.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "i64", into = "i64")]
pub enum Priority {
    /// Live delivery and mobile wake
    #[default]
    Normal,
    /// Live delivery and mobile wake; a live delivery clears the sound hint
    SilentWhenLive,
    /// Mobile wake only, never written to a live connection
    MobileOnly,
}

impl Priority {
    /// Parse a submitted value; anything unparsable or outside 1..=3 is `Normal`.
    pub fn from_raw(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.trim().parse::<i64>().ok())
            .map(Priority::from)
            .unwrap_or_default()
    }

    pub fn as_i16(&self) -> i16 {
        match self {
            Priority::Normal => 1,
            Priority::SilentWhenLive => 2,
            Priority::MobileOnly => 3,
        }
    }

    pub fn allows_live_delivery(&self) -> bool {
        !matches!(self, Priority::MobileOnly)
    }

    pub fn silences_on_live_delivery(&self) -> bool {
        matches!(self, Priority::SilentWhenLive)
    }
}

impl From<i64> for Priority {
    fn from(value: i64) -> Self {
        match value {
            2 => Priority::SilentWhenLive,
            3 => Priority::MobileOnly,
            _ => Priority::Normal,
        }
    }
}

impl From<Priority> for i64 {
    fn from(priority: Priority) -> Self {
        priority.as_i16() as i64
    }
}

/// Parse a submitted timestamp; unparsable or negative values become 0.
pub fn parse_timestamp(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .map(|ts| ts.max(0))
        .unwrap_or(0)
}

/// A push item as submitted by a producer, before the store accepts it
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewPushItem {
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub url: Option<String>,
    pub token: String,
    #[serde(default)]
    pub unix_timestamp: i64,
    #[serde(default)]
    pub priority: i64,
}

/// A submission that passed validation and normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidPushItem {
    pub title: String,
    pub body: String,
    pub url: Option<String>,
    pub token: String,
    pub unix_timestamp: i64,
    pub priority: Priority,
}

impl NewPushItem {
    /// Reject missing title/token and coerce timestamp and priority.
    ///
    /// Token existence is checked by the store, not here.
    pub fn validate(self) -> Result<ValidPushItem> {
        if self.title.is_empty() || self.token.is_empty() {
            return Err(AppError::Validation("token and title required".to_string()));
        }

        Ok(ValidPushItem {
            title: self.title,
            body: self.body,
            url: self.url.filter(|u| !u.is_empty()),
            token: self.token,
            unix_timestamp: self.unix_timestamp.max(0),
            priority: Priority::from(self.priority),
        })
    }
}

/// A persisted push item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushItem {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub unix_timestamp: i64,
    pub title: String,
    pub body: String,
    pub url: Option<String>,
    pub token: String,
    pub priority: Priority,
    /// Sound hint for the client; cleared once a quiet item reached a live connection
    pub sound: bool,
    /// Set once the item was retrieved by a non-live client
    pub accessed: bool,
}

impl PushItem {
    pub fn delivery_frame(&self) -> DeliveryFrame<'_> {
        DeliveryFrame {
            unix_timestamp: self.unix_timestamp,
            title: &self.title,
            body: &self.body,
            url: self.url.as_deref(),
        }
    }

    /// Serialized frame without the trailing newline
    pub fn to_frame_line(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.delivery_frame())?)
    }
}

/// Wire shape of one delivered item: a single JSON line
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DeliveryFrame<'a> {
    #[serde(rename = "UnixTimeStamp")]
    pub unix_timestamp: i64,
    #[serde(rename = "Title")]
    pub title: &'a str,
    #[serde(rename = "Body")]
    pub body: &'a str,
    #[serde(rename = "URL", skip_serializing_if = "Option::is_none")]
    pub url: Option<&'a str>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(priority: i64, unix_timestamp: i64) -> NewPushItem {
        NewPushItem {
            title: "Build finished".to_string(),
            body: "All green".to_string(),
            url: None,
            token: "2f0e1c9a-3b4d-4e5f-8a6b-7c8d9e0f1a2b".to_string(),
            unix_timestamp,
            priority,
        }
    }

    #[test]
    fn test_priority_out_of_range_is_normal() {
        assert_eq!(Priority::from(99), Priority::Normal);
        assert_eq!(Priority::from(0), Priority::Normal);
        assert_eq!(Priority::from(-1), Priority::Normal);
        assert_eq!(Priority::from(2), Priority::SilentWhenLive);
        assert_eq!(Priority::from(3), Priority::MobileOnly);
    }

    #[test]
    fn test_priority_from_raw_form_value() {
        assert_eq!(Priority::from_raw(None), Priority::Normal);
        assert_eq!(Priority::from_raw(Some("high")), Priority::Normal);
        assert_eq!(Priority::from_raw(Some(" 3 ")), Priority::MobileOnly);
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp(None), 0);
        assert_eq!(parse_timestamp(Some("-5")), 0);
        assert_eq!(parse_timestamp(Some("yesterday")), 0);
        assert_eq!(parse_timestamp(Some("1700000000")), 1_700_000_000);
    }

    #[test]
    fn test_validate_normalizes() {
        let valid = submission(99, -5).validate().unwrap();
        assert_eq!(valid.unix_timestamp, 0);
        assert_eq!(valid.priority, Priority::Normal);

        let valid = submission(0, 10).validate().unwrap();
        assert_eq!(valid.priority, Priority::Normal);
        assert_eq!(valid.unix_timestamp, 10);
    }

    #[test]
    fn test_validate_requires_title_and_token() {
        let mut item = submission(1, 0);
        item.title.clear();
        assert!(matches!(item.validate(), Err(AppError::Validation(_))));

        let mut item = submission(1, 0);
        item.token.clear();
        assert!(matches!(item.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_validate_drops_empty_url() {
        let mut item = submission(1, 0);
        item.url = Some(String::new());
        assert_eq!(item.validate().unwrap().url, None);
    }

    #[test]
    fn test_delivery_frame_shape() {
        let item = PushItem {
            id: 7,
            created_at: Utc::now(),
            unix_timestamp: 0,
            title: "greeting".to_string(),
            body: "hello".to_string(),
            url: None,
            token: "token".to_string(),
            priority: Priority::Normal,
            sound: true,
            accessed: false,
        };
        assert_eq!(
            item.to_frame_line().unwrap(),
            r#"{"UnixTimeStamp":0,"Title":"greeting","Body":"hello"}"#
        );

        let with_url = PushItem {
            url: Some("https://example.com/build/7".to_string()),
            ..item
        };
        assert_eq!(
            with_url.to_frame_line().unwrap(),
            r#"{"UnixTimeStamp":0,"Title":"greeting","Body":"hello","URL":"https://example.com/build/7"}"#
        );
    }

    #[test]
    fn test_priority_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&Priority::MobileOnly).unwrap(), "3");
        let parsed: Priority = serde_json::from_str("42").unwrap();
        assert_eq!(parsed, Priority::Normal);
    }
}
