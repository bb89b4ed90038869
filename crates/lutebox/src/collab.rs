//! External collaborator traits: the GUI shell, audio-synthesis
//! engine, engraver, rasterizer, GM instrument table, and activity log are
//! all out of scope for this crate and referenced only through the small
//! capability interfaces below. `StubInstruments`/`StubEngraver`/
//! `StubRasterizer`/`NullAudioEngine` are the default collaborators wired in
//! when nothing richer is supplied, so `play`/`engrave` are exercisable
//! standalone, the same role a stub backend connection plays before a real
//! one comes online.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use lutebox_proto::ActivityEvent;

/// Fire-and-forget playback. The call must return immediately; the engine is
/// free to marshal onto whatever thread actually owns the audio device.
pub trait AudioEngine: Send + Sync {
    fn play_sequence_json(&self, text: String);
}

/// The General MIDI instrument name set `play`/`engrave` validate
/// `track.instrument` against.
pub trait Instruments: Send + Sync {
    fn known_names(&self) -> HashSet<String>;
}

/// Symbolic-music and SVG rendering, kept out of scope 
pub trait Engraver: Send + Sync {
    fn to_symbolic_music(&self, sequence_json: &str) -> anyhow::Result<String>;
    fn to_svg(&self, symbolic_xml: &str) -> Option<String>;
}

/// SVG to PNG rasterization; may suspend.
pub trait Rasterizer: Send + Sync {
    fn svg_to_png<'a>(
        &'a self,
        svg_text: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<u8>>> + Send + 'a>>;
}

/// Best-effort observability sink for the GUI shell. Failures here must
/// never affect protocol behavior.
pub trait ActivityLog: Send + Sync {
    fn add(&self, event: ActivityEvent);
    fn patch_last_response(&self, text: String);
    fn set_server_status(&self, healthy: bool);
}

/// The bundle of collaborators the dispatcher and tool handlers are built
/// against. Swapping in a real GUI-backed `AudioEngine`/`Engraver`/
/// `Rasterizer` is a matter of constructing a different `Collaborators`, not
/// touching the dispatcher.
#[derive(Clone)]
pub struct Collaborators {
    pub audio: Arc<dyn AudioEngine>,
    pub instruments: Arc<dyn Instruments>,
    pub engraver: Arc<dyn Engraver>,
    pub rasterizer: Arc<dyn Rasterizer>,
    pub activity: Arc<dyn ActivityLog>,
}

impl Collaborators {
    /// The default collaborator set: a silent audio sink, the standard GM
    /// instrument names, a trivial engraver/rasterizer that always produce a
    /// well-formed (if minimal) SVG/PNG, and an in-memory activity log.
    pub fn stub() -> Self {
        Self {
            audio: Arc::new(NullAudioEngine),
            instruments: Arc::new(StubInstruments::general_midi()),
            engraver: Arc::new(StubEngraver),
            rasterizer: Arc::new(StubRasterizer),
            activity: Arc::new(crate::activity::MemoryActivityLog::new(256)),
        }
    }
}

/// Discards every sequence handed to it. Useful when no GUI/audio shell is
/// attached (headless testing, CI).
pub struct NullAudioEngine;

impl AudioEngine for NullAudioEngine {
    fn play_sequence_json(&self, text: String) {
        tracing::debug!(bytes = text.len(), "NullAudioEngine discarding sequence");
    }
}

/// The 128 General MIDI program names, snake_cased, standing in for the
/// bundled preset table the original GUI shell ships (out of scope per
/// — this crate only needs membership testing, not full preset
/// metadata).
pub struct StubInstruments {
    names: HashSet<String>,
}

impl StubInstruments {
    pub fn general_midi() -> Self {
        Self {
            names: GENERAL_MIDI_PROGRAM_NAMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    pub fn with_names(names: impl IntoIterator<Item = String>) -> Self {
        Self {
            names: names.into_iter().collect(),
        }
    }
}

impl Instruments for StubInstruments {
    fn known_names(&self) -> HashSet<String> {
        self.names.clone()
    }
}

/// General MIDI program names 1-128, in order, snake_cased.
pub const GENERAL_MIDI_PROGRAM_NAMES: &[&str] = &[
    "grand_piano",
    "bright_acoustic_piano",
    "electric_grand_piano",
    "honky_tonk_piano",
    "electric_piano_1",
    "electric_piano_2",
    "harpsichord",
    "clavinet",
    "celesta",
    "glockenspiel",
    "music_box",
    "vibraphone",
    "marimba",
    "xylophone",
    "tubular_bells",
    "dulcimer",
    "drawbar_organ",
    "percussive_organ",
    "rock_organ",
    "church_organ",
    "reed_organ",
    "accordion",
    "harmonica",
    "tango_accordion",
    "acoustic_guitar_nylon",
    "acoustic_guitar_steel",
    "electric_guitar_jazz",
    "electric_guitar_clean",
    "electric_guitar_muted",
    "overdriven_guitar",
    "distortion_guitar",
    "guitar_harmonics",
    "acoustic_bass",
    "electric_bass_finger",
    "electric_bass_pick",
    "fretless_bass",
    "slap_bass_1",
    "slap_bass_2",
    "synth_bass_1",
    "synth_bass_2",
    "violin",
    "viola",
    "cello",
    "contrabass",
    "tremolo_strings",
    "pizzicato_strings",
    "orchestral_harp",
    "timpani",
    "string_ensemble_1",
    "string_ensemble_2",
    "synth_strings_1",
    "synth_strings_2",
    "choir_aahs",
    "voice_oohs",
    "synth_voice",
    "orchestra_hit",
    "trumpet",
    "trombone",
    "tuba",
    "muted_trumpet",
    "french_horn",
    "brass_section",
    "synth_brass_1",
    "synth_brass_2",
    "soprano_sax",
    "alto_sax",
    "tenor_sax",
    "baritone_sax",
    "oboe",
    "english_horn",
    "bassoon",
    "clarinet",
    "piccolo",
    "flute",
    "recorder",
    "pan_flute",
    "blown_bottle",
    "shakuhachi",
    "whistle",
    "ocarina",
    "lead_1_square",
    "lead_2_sawtooth",
    "lead_3_calliope",
    "lead_4_chiff",
    "lead_5_charang",
    "lead_6_voice",
    "lead_7_fifths",
    "lead_8_bass_and_lead",
    "pad_1_new_age",
    "pad_2_warm",
    "pad_3_polysynth",
    "pad_4_choir",
    "pad_5_bowed",
    "pad_6_metallic",
    "pad_7_halo",
    "pad_8_sweep",
    "fx_1_rain",
    "fx_2_soundtrack",
    "fx_3_crystal",
    "fx_4_atmosphere",
    "fx_5_brightness",
    "fx_6_goblins",
    "fx_7_echoes",
    "fx_8_sci_fi",
    "sitar",
    "banjo",
    "shamisen",
    "koto",
    "kalimba",
    "bagpipe",
    "fiddle",
    "shanai",
    "tinkle_bell",
    "agogo",
    "steel_drums",
    "woodblock",
    "taiko_drum",
    "melodic_tom",
    "synth_drum",
    "reverse_cymbal",
    "guitar_fret_noise",
    "breath_noise",
    "seashore",
    "bird_tweet",
    "telephone_ring",
    "helicopter",
    "applause",
    "gunshot",
];

/// Produces a tiny well-formed placeholder in place of an actual
/// symbolic-music/SVG pipeline. Always succeeds; real implementations swap this out entirely.
pub struct StubEngraver;

impl Engraver for StubEngraver {
    fn to_symbolic_music(&self, sequence_json: &str) -> anyhow::Result<String> {
        Ok(format!(
            "<score-partwise version=\"4.0\"><!-- generated from {} bytes of sequence JSON --></score-partwise>",
            sequence_json.len()
        ))
    }

    fn to_svg(&self, symbolic_xml: &str) -> Option<String> {
        Some(format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"200\" height=\"80\"><!-- {} bytes of symbolic music --><text x=\"10\" y=\"40\">score</text></svg>",
            symbolic_xml.len()
        ))
    }
}

/// Emits a fixed 1x1 transparent PNG regardless of input, standing in for a
/// real SVG rasterizer.
pub struct StubRasterizer;

/// A minimal valid single-pixel transparent PNG (magic bytes + IHDR/IDAT/IEND).
const ONE_PIXEL_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // signature
    0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, // IHDR chunk header
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, // 1x1
    0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4, // bit depth / color type / CRC
    0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, // IDAT chunk header
    0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00,
    0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, // IEND chunk header
    0x42, 0x60, 0x82,
];

impl Rasterizer for StubRasterizer {
    fn svg_to_png<'a>(
        &'a self,
        svg_text: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<u8>>> + Send + 'a>> {
        Box::pin(async move {
            tracing::debug!(bytes = svg_text.len(), "StubRasterizer rendering placeholder PNG");
            Ok(ONE_PIXEL_PNG.to_vec())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn general_midi_table_has_128_entries() {
        assert_eq!(GENERAL_MIDI_PROGRAM_NAMES.len(), 128);
    }

    #[test]
    fn stub_instruments_knows_grand_piano() {
        let instruments = StubInstruments::general_midi();
        assert!(instruments.known_names().contains("grand_piano"));
        assert!(!instruments.known_names().contains("kazoo"));
    }

    #[test]
    fn stub_engraver_always_produces_svg() {
        let engraver = StubEngraver;
        let xml = engraver.to_symbolic_music("{}").unwrap();
        assert!(engraver.to_svg(&xml).is_some());
    }

    #[tokio::test]
    async fn stub_rasterizer_emits_png_magic_bytes() {
        let png = StubRasterizer.svg_to_png("<svg/>").await.unwrap();
        assert_eq!(&png[..8], &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
    }
}
