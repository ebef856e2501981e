use super::{HeaderEdit, Matcher, Profile, ProfileError};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// The stored collection of profiles and which one is active.
///
/// At most one profile is enabled at a time; `set_active` keeps the
/// `enabled` flags consistent with `active_profile_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSet {
    pub profiles: Vec<Profile>,
    pub active_profile_id: Option<String>,
}

impl ProfileSet {
    pub fn new(profiles: Vec<Profile>) -> Self {
        let mut set = Self {
            profiles,
            active_profile_id: None,
        };
        set.normalize();
        set
    }

    /// A set holding one sample profile, already active
    pub fn with_sample() -> Self {
        let mut sample = Profile::new(Uuid::new_v4().to_string(), "Sample: Staging APIs");
        sample.color = Some("#6b4eff".to_string());
        sample.notes = Some("Adds X-Env: staging to example.com".to_string());
        sample.matchers = vec![Matcher::new(Uuid::new_v4().to_string(), "example.com")];
        sample.request_headers = vec![HeaderEdit::new(
            Uuid::new_v4().to_string(),
            "X-Env",
            "staging",
        )];

        sample.enabled = true;

        let active_profile_id = Some(sample.id.clone());
        let mut set = Self::new(vec![sample]);
        set.active_profile_id = active_profile_id;
        set
    }

    pub fn normalize(&mut self) {
        for profile in &mut self.profiles {
            profile.normalize();
        }
    }

    pub fn get(&self, id: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    /// The active profile, if its id is selected and it is enabled
    pub fn active_profile(&self) -> Option<&Profile> {
        let active_id = self.active_profile_id.as_deref()?;
        self.profiles
            .iter()
            .find(|p| p.id == active_id && p.enabled)
    }

    /// Make `id` the only enabled profile
    pub fn set_active(&mut self, id: &str) -> Result<(), ProfileError> {
        if self.get(id).is_none() {
            return Err(ProfileError::UnknownProfile(id.to_string()));
        }

        for profile in &mut self.profiles {
            profile.enabled = profile.id == id;
        }
        self.active_profile_id = Some(id.to_string());
        debug!("Active profile set to {}", id);
        Ok(())
    }

    /// Insert or replace a profile by id
    pub fn upsert(&mut self, mut profile: Profile) {
        profile.normalize();
        match self.profiles.iter_mut().find(|p| p.id == profile.id) {
            Some(existing) => *existing = profile,
            None => self.profiles.push(profile),
        }
    }

    /// Remove a profile. Deleting the active profile activates the first remaining one.
    pub fn delete(&mut self, id: &str) -> Result<Profile, ProfileError> {
        let index = self
            .profiles
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| ProfileError::UnknownProfile(id.to_string()))?;
        let removed = self.profiles.remove(index);

        if self.active_profile_id.as_deref() == Some(id) {
            match self.profiles.first().map(|p| p.id.clone()) {
                Some(next) => self.set_active(&next)?,
                None => self.active_profile_id = None,
            }
        }

        Ok(removed)
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
