//! SQLite-backed cue store
//!
//! Opens the cue database read-only (`mode=ro`). Expected tables:
//! - `cue_groups`: group id and its optional assigned voice
//! - `cues`: one row per cue, voice-over columns inline

use super::CueStore;
use crate::error::{Error, Result};
use async_trait::async_trait;
use cuedeck_common::{FadeOutSpec, MusicSource, SoundCue, VoiceOverSpec, VoiceType};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Table definitions the store reads from
pub const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS cue_groups (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        voice_type TEXT,
        voice_id TEXT,
        voice_rate REAL,
        voice_pitch REAL,
        voice_volume REAL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cues (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        group_id TEXT REFERENCES cue_groups(id),
        sort_order INTEGER NOT NULL DEFAULT 0,
        music_source TEXT NOT NULL DEFAULT 'local',
        track_ref TEXT,
        start_offset_seconds REAL NOT NULL DEFAULT 0,
        fade_out_enabled INTEGER NOT NULL DEFAULT 0,
        fade_out_seconds REAL NOT NULL DEFAULT 2.0,
        voice_enabled INTEGER NOT NULL DEFAULT 0,
        voice_text TEXT,
        voice_type TEXT,
        voice_id TEXT,
        voice_rate REAL,
        voice_pitch REAL,
        voice_volume REAL,
        pre_delay_seconds REAL NOT NULL DEFAULT 0,
        post_delay_seconds REAL NOT NULL DEFAULT 0,
        is_voice_only INTEGER NOT NULL DEFAULT 0,
        is_lineup_announcement INTEGER NOT NULL DEFAULT 0,
        artwork_ref TEXT
    )
    "#,
];

const CUE_COLUMNS: &str = "id, name, group_id, music_source, track_ref, start_offset_seconds, \
     fade_out_enabled, fade_out_seconds, voice_enabled, voice_text, voice_type, voice_id, \
     voice_rate, voice_pitch, voice_volume, pre_delay_seconds, post_delay_seconds, \
     is_voice_only, is_lineup_announcement, artwork_ref";

pub struct SqliteCueStore {
    pool: SqlitePool,
}

impl SqliteCueStore {
    /// Open an existing cue database read-only
    pub async fn open(path: &Path) -> Result<Self> {
        let db_url = format!("sqlite:{}?mode=ro", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&db_url)
            .await?;

        info!("Opened cue database (read-only): {:?}", path);
        Ok(Self { pool })
    }
}

#[async_trait]
impl CueStore for SqliteCueStore {
    async fn cue(&self, id: Uuid) -> Result<SoundCue> {
        let row = sqlx::query(&format!("SELECT {} FROM cues WHERE id = ?", CUE_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("cue {}", id)))?;

        row_to_cue(&row)
    }

    async fn cues(&self) -> Result<Vec<SoundCue>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM cues ORDER BY sort_order, name",
            CUE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut cues = Vec::with_capacity(rows.len());
        for row in &rows {
            match row_to_cue(row) {
                Ok(cue) => cues.push(cue),
                Err(e) => warn!("Skipping unreadable cue row: {}", e),
            }
        }
        Ok(cues)
    }

    async fn voice_for_group(&self, group_id: Uuid) -> Result<Option<VoiceOverSpec>> {
        let row = sqlx::query(
            "SELECT voice_type, voice_id, voice_rate, voice_pitch, voice_volume \
             FROM cue_groups WHERE id = ?",
        )
        .bind(group_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let voice_id: Option<String> = row.try_get("voice_id")?;
        let Some(voice_id) = voice_id.filter(|v| !v.trim().is_empty()) else {
            return Ok(None);
        };

        let defaults = VoiceOverSpec::default();
        let voice = VoiceOverSpec {
            enabled: true,
            voice_type: parse_voice_type(row.try_get("voice_type")?),
            voice_id,
            rate: row
                .try_get::<Option<f64>, _>("voice_rate")?
                .map_or(defaults.rate, |v| v as f32),
            pitch: row
                .try_get::<Option<f64>, _>("voice_pitch")?
                .map_or(defaults.pitch, |v| v as f32),
            volume: row
                .try_get::<Option<f64>, _>("voice_volume")?
                .map_or(defaults.volume, |v| v as f32),
            ..defaults
        };

        Ok(Some(voice.normalized()))
    }
}

fn parse_uuid(column: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Internal(format!("invalid {} '{}': {}", column, value, e)))
}

fn parse_voice_type(value: Option<String>) -> VoiceType {
    value
        .as_deref()
        .and_then(VoiceType::from_str)
        .unwrap_or(VoiceType::OnDevice)
}

fn row_to_cue(row: &SqliteRow) -> Result<SoundCue> {
    let id = parse_uuid("cue id", &row.try_get::<String, _>("id")?)?;

    let group_id = match row.try_get::<Option<String>, _>("group_id")? {
        Some(g) if !g.is_empty() => Some(parse_uuid("group id", &g)?),
        _ => None,
    };

    let source: String = row.try_get("music_source")?;
    let music_source = MusicSource::from_str(&source).unwrap_or_else(|| {
        warn!("Cue {} has unknown music source '{}', using local", id, source);
        MusicSource::Local
    });

    let voice_text: Option<String> = row.try_get("voice_text")?;
    let voice_over = voice_text.map(|text| -> Result<VoiceOverSpec> {
        let defaults = VoiceOverSpec::default();
        Ok(VoiceOverSpec {
            enabled: row.try_get("voice_enabled")?,
            text,
            voice_type: parse_voice_type(row.try_get("voice_type")?),
            voice_id: row
                .try_get::<Option<String>, _>("voice_id")?
                .unwrap_or_default(),
            rate: row
                .try_get::<Option<f64>, _>("voice_rate")?
                .map_or(defaults.rate, |v| v as f32),
            pitch: row
                .try_get::<Option<f64>, _>("voice_pitch")?
                .map_or(defaults.pitch, |v| v as f32),
            volume: row
                .try_get::<Option<f64>, _>("voice_volume")?
                .map_or(defaults.volume, |v| v as f32),
            pre_delay_seconds: row.try_get("pre_delay_seconds")?,
            post_delay_seconds: row.try_get("post_delay_seconds")?,
        }
        .normalized())
    });

    let cue = SoundCue {
        id,
        name: row.try_get("name")?,
        group_id,
        music_source,
        track_ref: row.try_get("track_ref")?,
        start_offset_seconds: row.try_get::<f64, _>("start_offset_seconds")?.max(0.0),
        fade_out: FadeOutSpec {
            enabled: row.try_get("fade_out_enabled")?,
            duration_seconds: row.try_get("fade_out_seconds")?,
        },
        voice_over: voice_over.transpose()?,
        is_voice_only: row.try_get("is_voice_only")?,
        is_lineup_announcement: row.try_get("is_lineup_announcement")?,
        artwork_ref: row.try_get("artwork_ref")?,
    };

    if let Err(e) = cue.validate() {
        warn!("{}; voice-only takes precedence", e);
    }

    Ok(cue)
}
