use thiserror::Error;
use tokio::sync::watch;

use crate::dataset;
use crate::models::StudentProfile;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    #[error("no student profile with id {0}")]
    UnknownProfile(String),
}

/// Owner of the student roster and the currently selected profile.
///
/// Views receive the store explicitly and observe selection changes through
/// [`ProfileStore::subscribe`].
pub struct ProfileStore {
    roster: Vec<StudentProfile>,
    selected: watch::Sender<Option<StudentProfile>>,
}

impl ProfileStore {
    pub fn new(roster: Vec<StudentProfile>) -> Self {
        let (selected, _) = watch::channel(None);
        Self { roster, selected }
    }

    pub fn with_default_roster() -> Self {
        Self::new(dataset::default_roster().to_vec())
    }

    pub fn roster(&self) -> &[StudentProfile] {
        &self.roster
    }

    pub fn selected(&self) -> Option<StudentProfile> {
        self.selected.borrow().clone()
    }

    /// Select a profile by id. Subscribers are only notified when the selection changes.
    pub fn select(&self, id: &str) -> Result<StudentProfile, ProfileError> {
        let profile = self
            .roster
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| ProfileError::UnknownProfile(id.to_string()))?;

        let next = profile.clone();
        let changed = self.selected.send_if_modified(|current| {
            if current.as_ref().map(|p| p.id.as_str()) == Some(next.id.as_str()) {
                return false;
            }
            *current = Some(next);
            true
        });

        if changed {
            tracing::info!(student = %profile.id, "selected student profile");
        }
        Ok(profile)
    }

    pub fn clear(&self) {
        let changed = self.selected.send_if_modified(|current| current.take().is_some());
        if changed {
            tracing::info!("cleared student profile");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<StudentProfile>> {
        self.selected.subscribe()
    }
}
