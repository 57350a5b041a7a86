//! In-memory cue store
//!
//! Used when no cue database exists yet and as the store in tests.

use super::CueStore;
use crate::error::{Error, Result};
use async_trait::async_trait;
use cuedeck_common::{SoundCue, VoiceOverSpec};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryCueStore {
    cues: RwLock<Vec<SoundCue>>,
    group_voices: RwLock<HashMap<Uuid, VoiceOverSpec>>,
}

impl InMemoryCueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a cue, keeping insertion order for new ids
    pub async fn insert(&self, cue: SoundCue) {
        let mut cues = self.cues.write().await;
        match cues.iter_mut().find(|c| c.id == cue.id) {
            Some(existing) => *existing = cue,
            None => cues.push(cue),
        }
    }

    /// Assign (or clear with `None`) a group's voice
    pub async fn set_group_voice(&self, group_id: Uuid, voice: Option<VoiceOverSpec>) {
        let mut voices = self.group_voices.write().await;
        match voice {
            Some(v) => {
                voices.insert(group_id, v);
            }
            None => {
                voices.remove(&group_id);
            }
        }
    }
}

#[async_trait]
impl CueStore for InMemoryCueStore {
    async fn cue(&self, id: Uuid) -> Result<SoundCue> {
        self.cues
            .read()
            .await
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("cue {}", id)))
    }

    async fn cues(&self) -> Result<Vec<SoundCue>> {
        Ok(self.cues.read().await.clone())
    }

    async fn voice_for_group(&self, group_id: Uuid) -> Result<Option<VoiceOverSpec>> {
        Ok(self.group_voices.read().await.get(&group_id).cloned())
    }
}
