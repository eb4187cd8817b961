//! Ordered profile list as presented to the operator.
//!
//! Slot 0 mirrors the profile the controller last reported via `MOULD_OK`;
//! the remaining slots are local profiles created on the panel.

use crate::error::ProfileError;
use crate::params::{MODE_MAX, MouldParams, NAME_MAX, ProfileMode, bounded};

const MIN_FILL: f32 = 0.01;
const MIN_TORQUE: f32 = 0.01;

#[derive(Debug, Clone)]
pub struct ProfileBook {
    profiles: Vec<MouldParams>,
    selected: Option<usize>,
    /// Name of the controller profile currently mirrored in slot 0.
    mirrored_name: String,
    limit: usize,
}

impl ProfileBook {
    /// Start from loaded profiles. An empty list gets the placeholder slot.
    pub fn from_loaded(mut profiles: Vec<MouldParams>, limit: usize) -> Self {
        let limit = limit.max(1);
        profiles.truncate(limit);
        if profiles.is_empty() {
            profiles.push(MouldParams::awaiting_controller());
        }
        Self {
            profiles,
            selected: None,
            mirrored_name: String::new(),
            limit,
        }
    }

    pub fn profiles(&self) -> &[MouldParams] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_profile(&self) -> Option<&MouldParams> {
        self.selected.and_then(|i| self.profiles.get(i))
    }

    pub fn select(&mut self, index: usize) -> Result<(), ProfileError> {
        if index >= self.profiles.len() {
            self.selected = None;
            return Err(ProfileError::NoSelection);
        }
        self.selected = Some(index);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Keep slot 0 in sync with the controller's active profile.
    ///
    /// Returns true when slot 0 now shows a different profile than before.
    pub fn mirror_active(&mut self, mould: &MouldParams) -> bool {
        if mould.name.is_empty() {
            return false;
        }
        let renamed = self.mirrored_name != mould.name;
        match self.profiles.first_mut() {
            Some(slot) => *slot = mould.clone(),
            None => self.profiles.push(mould.clone()),
        }
        if renamed {
            self.mirrored_name.clone_from(&mould.name);
            tracing::info!(name = %mould.name, "active controller profile mirrored");
        }
        renamed
    }

    /// Append a "Local N" profile with stock values. Returns its slot.
    pub fn create_local(&mut self) -> Result<usize, ProfileError> {
        if self.profiles.len() >= self.limit {
            return Err(ProfileError::LimitReached(self.limit));
        }
        let slot = self.profiles.len();
        self.profiles.push(MouldParams::local(slot + 1));
        tracing::info!(slot, "local profile created");
        Ok(slot)
    }

    /// Replace the selected profile with `edited` once it validates.
    pub fn update_selected(&mut self, mut edited: MouldParams) -> Result<usize, ProfileError> {
        let index = self.selected_index()?;
        edited.name = bounded(&edited.name, NAME_MAX);
        edited.mode = bounded(&edited.mode.to_ascii_uppercase(), MODE_MAX);
        validate(&edited)?;
        if index == 0 {
            self.mirrored_name.clone_from(&edited.name);
        }
        self.profiles[index] = edited;
        Ok(index)
    }

    /// Remove the selected profile. Slot 0 cannot be deleted.
    pub fn delete_selected(&mut self) -> Result<MouldParams, ProfileError> {
        let index = self.selected_index()?;
        if index == 0 {
            return Err(ProfileError::MirrorSlot);
        }
        self.selected = None;
        let removed = self.profiles.remove(index);
        tracing::info!(slot = index, name = %removed.name, "profile deleted");
        Ok(removed)
    }

    /// Append imported profiles until the limit. Returns how many were added.
    pub fn import(&mut self, profiles: impl IntoIterator<Item = MouldParams>) -> usize {
        let mut added = 0;
        for p in profiles {
            if self.profiles.len() >= self.limit {
                tracing::warn!(limit = self.limit, "profile limit reached during import");
                break;
            }
            self.profiles.push(p);
            added += 1;
        }
        added
    }

    pub fn can_edit(&self) -> bool {
        self.selected_profile().is_some()
    }

    pub fn can_delete(&self) -> bool {
        matches!(self.selected, Some(i) if i != 0 && i < self.profiles.len())
    }

    pub fn can_send(&self, safe_state: bool) -> bool {
        self.can_edit() && safe_state
    }

    fn selected_index(&self) -> Result<usize, ProfileError> {
        self.selected
            .filter(|&i| i < self.profiles.len())
            .ok_or(ProfileError::NoSelection)
    }
}

/// Mode-specific sanity checks applied to operator edits.
pub fn validate(p: &MouldParams) -> Result<(), ProfileError> {
    match p.mode_kind() {
        Some(ProfileMode::ThreeD) if p.inject_torque <= MIN_TORQUE => {
            Err(ProfileError::TorqueTooLow)
        }
        Some(ProfileMode::TwoD) if p.fill_volume <= MIN_FILL || p.fill_speed <= MIN_FILL => {
            Err(ProfileError::FillTooLow)
        }
        Some(_) => Ok(()),
        None => Err(ProfileError::UnknownMode(p.mode.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(name: &str) -> MouldParams {
        MouldParams {
            name: name.to_string(),
            fill_volume: 1.0,
            ..MouldParams::default()
        }
    }

    #[test]
    fn empty_book_starts_with_placeholder() {
        let book = ProfileBook::from_loaded(Vec::new(), 16);
        assert_eq!(book.len(), 1);
        assert_eq!(book.profiles()[0].name, "Awaiting QUERY_MOULD");
        assert_eq!(book.selected(), None);
    }

    #[test]
    fn mirror_replaces_slot_zero_and_reports_renames() {
        let mut book = ProfileBook::from_loaded(Vec::new(), 16);
        assert!(book.mirror_active(&controller("A")));
        assert!(!book.mirror_active(&controller("A")));
        assert!(book.mirror_active(&controller("B")));
        assert_eq!(book.profiles()[0].name, "B");
        assert!(!book.mirror_active(&controller("")));
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn predicates_follow_selection() {
        let mut book = ProfileBook::from_loaded(vec![controller("A")], 16);
        book.create_local().unwrap();
        assert!(!book.can_edit());
        book.select(0).unwrap();
        assert!(book.can_edit());
        assert!(!book.can_delete());
        assert!(book.can_send(true));
        assert!(!book.can_send(false));
        book.select(1).unwrap();
        assert!(book.can_delete());
        assert!(book.select(5).is_err());
        assert_eq!(book.selected(), None);
    }
}
