use anyhow::{Context, Result};

use crate::{
    db::{keys, Database},
    models::UserProfile,
};

impl Database {
    pub async fn load_profile(&self) -> Result<UserProfile> {
        let values = self
            .get_values(vec![keys::USERNAME, keys::USER_PHOTO])
            .await
            .context("Failed to read profile")?;
        let mut values = values.into_iter();

        Ok(UserProfile {
            display_name: values.next().flatten(),
            photo: values.next().flatten(),
        })
    }

    /// Store the profile; a `None` field removes its stored value.
    pub async fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        let mut writes = Vec::new();
        let mut removals = Vec::new();

        for (key, value) in [
            (keys::USERNAME, &profile.display_name),
            (keys::USER_PHOTO, &profile.photo),
        ] {
            match value {
                Some(value) => writes.push((key, value.clone())),
                None => removals.push(key),
            }
        }

        if !writes.is_empty() {
            self.put_values(writes).await.context("Failed to write profile")?;
        }
        if !removals.is_empty() {
            self.delete_values(removals)
                .await
                .context("Failed to clear profile fields")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn profile_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("profile.sqlite3")).unwrap();

        assert_eq!(db.load_profile().await.unwrap(), UserProfile::default());

        let profile = UserProfile {
            display_name: Some("Ada".into()),
            photo: Some("data:image/png;base64,YWJj".into()),
        };
        db.save_profile(&profile).await.unwrap();
        assert_eq!(db.load_profile().await.unwrap(), profile);

        db.save_profile(&UserProfile {
            display_name: Some("Ada L.".into()),
            photo: None,
        })
        .await
        .unwrap();
        let loaded = db.load_profile().await.unwrap();
        assert_eq!(loaded.display_name.as_deref(), Some("Ada L."));
        assert_eq!(loaded.photo, None);
    }
}
