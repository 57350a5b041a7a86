//! Read-only cue store
//!
//! The player never writes cue records. It reads them at trigger time and
//! asks the store for a group's currently assigned voice so that a change to
//! the group voice applies to every cue in the group without rewriting them.

mod memory;
mod sqlite;

pub use memory::InMemoryCueStore;
pub use sqlite::{SqliteCueStore, SCHEMA};

use crate::error::Result;
use async_trait::async_trait;
use cuedeck_common::{SoundCue, VoiceOverSpec};
use uuid::Uuid;

/// Query capability over the external cue store
#[async_trait]
pub trait CueStore: Send + Sync {
    /// Look up one cue; `Error::NotFound` when it does not exist
    async fn cue(&self, id: Uuid) -> Result<SoundCue>;

    /// All cues in display order
    async fn cues(&self) -> Result<Vec<SoundCue>>;

    /// Voice currently assigned to a group, if any
    async fn voice_for_group(&self, group_id: Uuid) -> Result<Option<VoiceOverSpec>>;
}
