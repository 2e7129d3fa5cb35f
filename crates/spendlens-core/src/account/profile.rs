use super::validation::{ValidationErrors, is_valid_email};
use serde::{Deserialize, Serialize};

/// Current user as returned by `GET /api/v1/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl UserProfile {
    /// "First Last" when either is set, else the username.
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect();
        if parts.is_empty() {
            self.username.clone()
        } else {
            parts.join(" ")
        }
    }
}

/// Body of `PATCH /api/v1/me`. Unset optional fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ProfileUpdate {
    /// Starts from the profile's current values.
    pub fn from_profile(profile: &UserProfile) -> Self {
        Self {
            username: profile.username.clone(),
            email: profile.email.clone(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            bio: profile.bio.clone(),
            avatar_url: profile.avatar_url.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if self.username.trim().chars().count() < 3 {
            errors.push("username", "Username must be at least 3 characters");
        }
        if !is_valid_email(self.email.trim()) {
            errors.push("email", "Please enter a valid email address");
        }
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile() -> UserProfile {
        serde_json::from_value(json!({
            "id": "u-1",
            "username": "alice",
            "email": "alice@example.com",
            "first_name": "Alice",
            "last_name": null,
            "is_active": true
        }))
        .unwrap()
    }

    #[test]
    fn test_profile_tolerates_missing_fields() {
        let p = profile();
        assert_eq!(p.last_name, None);
        assert!(!p.is_verified);
        assert_eq!(p.display_name(), "Alice");
    }

    #[test]
    fn test_update_omits_unset_fields() {
        let mut update = ProfileUpdate::from_profile(&profile());
        update.bio = None;
        let body = serde_json::to_value(&update).unwrap();
        assert_eq!(
            body,
            json!({"username": "alice", "email": "alice@example.com", "first_name": "Alice"})
        );
    }

    #[test]
    fn test_update_validation() {
        let mut update = ProfileUpdate::from_profile(&profile());
        assert!(update.validate().is_ok());

        update.username = "al".into();
        update.email = "nope".into();
        let errors = update.validate().unwrap_err();
        assert!(errors.for_field("username").is_some());
        assert!(errors.for_field("email").is_some());
    }
}
