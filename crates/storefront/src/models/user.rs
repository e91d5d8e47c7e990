//! Customer profile document (`users/{uid}`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use digitalhub_core::{Email, UserId};

/// A customer profile as stored in the `users` collection.
///
/// Every field is optional: documents written by older page versions (or by
/// the profile page's lazy creation) carry only a subset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// The stored name, or the email's local part when none is set.
    #[must_use]
    pub fn display_name(&self, email: &Email) -> String {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map_or_else(|| email.local_part().to_owned(), str::to_owned)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_falls_back_to_local_part() {
        let email = Email::parse("coolstar42@gmail.com").unwrap();
        assert_eq!(UserProfile::default().display_name(&email), "coolstar42");

        let named = UserProfile {
            name: Some("Ada".to_owned()),
            ..UserProfile::default()
        };
        assert_eq!(named.display_name(&email), "Ada");

        let blank = UserProfile {
            name: Some("  ".to_owned()),
            ..UserProfile::default()
        };
        assert_eq!(blank.display_name(&email), "coolstar42");
    }

    #[test]
    fn test_partial_document_deserializes() {
        let profile: UserProfile =
            serde_json::from_str(r#"{"email":"a@b.com","createdAt":"2024-05-01T10:00:00Z"}"#)
                .unwrap();
        assert_eq!(profile.email.as_deref(), Some("a@b.com"));
        assert!(profile.name.is_none());
        assert!(profile.created_at.is_some());
    }
}
