use anyhow::{Result, anyhow};
use spendlens_application::ClientContext;
use spendlens_core::account::{ProfileUpdate, UserProfile};

/// Fields given on the command line; `None` keeps the current value.
#[derive(Debug, Default)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

impl ProfileChanges {
    fn apply(self, update: &mut ProfileUpdate) {
        if let Some(username) = self.username {
            update.username = username;
        }
        if let Some(email) = self.email {
            update.email = email;
        }
        if self.first_name.is_some() {
            update.first_name = self.first_name;
        }
        if self.last_name.is_some() {
            update.last_name = self.last_name;
        }
        if self.bio.is_some() {
            update.bio = self.bio;
        }
        if self.avatar_url.is_some() {
            update.avatar_url = self.avatar_url;
        }
    }
}

pub async fn show(ctx: &ClientContext) -> Result<()> {
    let profile = ctx
        .account
        .profile()
        .await
        .map_err(|e| anyhow!(e.user_message()))?;
    print_profile(&profile);
    Ok(())
}

pub async fn update(ctx: &ClientContext, changes: ProfileChanges) -> Result<()> {
    let current = ctx
        .account
        .profile()
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    let mut update = ProfileUpdate::from_profile(&current);
    changes.apply(&mut update);

    let profile = ctx
        .account
        .update_profile(&update)
        .await
        .map_err(|e| anyhow!(e.user_message()))?;
    println!("Profile updated successfully");
    print_profile(&profile);
    Ok(())
}

fn print_profile(profile: &UserProfile) {
    println!("{}", profile.display_name());
    println!("  Username: {}", profile.username);
    println!("  Email:    {}", profile.email);
    if let Some(bio) = profile.bio.as_deref().filter(|b| !b.is_empty()) {
        println!("  Bio:      {}", bio);
    }
    if let Some(avatar) = profile.avatar_url.as_deref().filter(|a| !a.is_empty()) {
        println!("  Avatar:   {}", avatar);
    }
    println!(
        "  Status:   {}{}",
        if profile.is_active { "active" } else { "inactive" },
        if profile.is_verified { ", verified" } else { "" }
    );
    if let Some(created_at) = &profile.created_at {
        println!("  Joined:   {}", created_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_keeps_unset_fields() {
        let mut update = ProfileUpdate {
            username: "alice".into(),
            email: "alice@example.com".into(),
            bio: Some("old".into()),
            ..Default::default()
        };
        let changes = ProfileChanges {
            email: Some("new@example.com".into()),
            first_name: Some("Alice".into()),
            ..Default::default()
        };

        changes.apply(&mut update);

        assert_eq!(update.username, "alice");
        assert_eq!(update.email, "new@example.com");
        assert_eq!(update.first_name.as_deref(), Some("Alice"));
        assert_eq!(update.bio.as_deref(), Some("old"));
    }
}
