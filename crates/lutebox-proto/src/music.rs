//! The `MusicSequence` data model shared by `play` and inline-mode `engrave`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single note in an `Event`: either a MIDI number or a note-name string
/// (e.g. `"C4"`). The instrument collaborator interprets note names; this
/// type only carries the wire representation through unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Pitch {
    Midi(u8),
    Name(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Event {
    /// Offset in beats from the start of the track. Must be >= 0.
    pub time: f64,
    /// Nonempty set of simultaneous pitches (a chord is a multi-pitch event).
    pub pitches: Vec<Pitch>,
    /// Duration in beats. Must be > 0.
    pub dur: f64,
    /// MIDI velocity, 1..127. Defaults to 100.
    #[serde(default = "default_velocity")]
    pub vel: u8,
}

fn default_velocity() -> u8 {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Track {
    /// Instrument symbol; must be a member of the known GM instrument set.
    pub instrument: String,
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MusicSequence {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Tempo in BPM. Must be > 0.
    pub tempo: f64,
    pub tracks: Vec<Track>,
}

impl MusicSequence {
    /// Total number of events across all tracks, used for the `play` summary.
    pub fn event_count(&self) -> usize {
        self.tracks.iter().map(|t| t.events.len()).sum()
    }

    pub fn title_or_untitled(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled")
    }

    /// Checks the structural invariants lists (tempo, dur, pitches,
    /// vel, time); instrument membership is validated separately against the
    /// instrument collaborator, which this crate has no knowledge of.
    pub fn validate_shape(&self) -> Result<(), String> {
        if !(self.tempo > 0.0) {
            return Err(format!("tempo must be > 0, got {}", self.tempo));
        }
        for track in &self.tracks {
            for event in &track.events {
                if event.time < 0.0 {
                    return Err(format!("event time must be >= 0, got {}", event.time));
                }
                if !(event.dur > 0.0) {
                    return Err(format!("event dur must be > 0, got {}", event.dur));
                }
                if event.pitches.is_empty() {
                    return Err("event pitches must be nonempty".to_string());
                }
                for pitch in &event.pitches {
                    if let Pitch::Midi(n) = pitch {
                        if *n > 127 {
                            return Err(format!("MIDI pitch must be in 0..127, got {n}"));
                        }
                    }
                }
                if !(1..=127).contains(&event.vel) {
                    return Err(format!("event vel must be in 1..127, got {}", event.vel));
                }
            }
        }
        Ok(())
    }
}
