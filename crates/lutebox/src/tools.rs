//! `ToolHandlers`: the `play` and `engrave` tool implementations
//! `McpDispatcher::handle_tools_call` routes to. Each validates its
//! arguments, talks to exactly the collaborators it needs, and returns the
//! `content` blocks the MCP client sees - no JSON-RPC framing here, that's
//! the dispatcher's job.

use base64::Engine as _;
use serde_json::Value;

use lutebox_proto::{Content, MusicSequence, ToolResult};

use crate::dispatch::McpDispatcher;
use crate::error::BridgeError;

/// `play`: validate and hand a sequence to the audio engine, remembering it
/// in the score store so a later `engrave` call can reference it by id or
/// fall back to "last played".
pub async fn play(dispatcher: &McpDispatcher, arguments: Value) -> Result<ToolResult, BridgeError> {
    let sequence: MusicSequence = serde_json::from_value(arguments)
        .map_err(|e| BridgeError::InvalidParams(e.to_string()))?;
    validate_sequence(dispatcher, &sequence)?;

    let sequence_json = serde_json::to_string(&sequence).map_err(|e| BridgeError::InvalidParams(e.to_string()))?;
    dispatcher.collab.audio.play_sequence_json(sequence_json);

    let event_count = sequence.event_count();
    let noun = if event_count == 1 { "event" } else { "events" };
    let summary = format!(
        "Playing {} at {} BPM with {} {}.",
        sequence.title_or_untitled(),
        format_number(sequence.tempo),
        event_count,
        noun
    );

    let score_id = dispatcher.scores.put(sequence).await;

    Ok(ToolResult::ok(vec![
        Content::text(summary),
        Content::text(format!("Score ID: {score_id}")),
    ]))
}

/// `engrave`: resolve a sequence (inline > `score_id` > most recently played),
/// render it to a PNG through the engraver/rasterizer collaborators, persist
/// the bytes under the process temp directory, and return the single image
/// content block (the URL is reachable separately via `GET /images/<name>`
/// or `resources/read`).
pub async fn engrave(dispatcher: &McpDispatcher, arguments: Value) -> Result<ToolResult, BridgeError> {
    let sequence = resolve_sequence(dispatcher, &arguments).await?;

    let sequence_json = serde_json::to_string(&sequence).map_err(|e| BridgeError::InvalidParams(e.to_string()))?;
    let symbolic = dispatcher
        .collab
        .engraver
        .to_symbolic_music(&sequence_json)
        .map_err(|e| BridgeError::Collaborator(e.to_string()))?;
    let svg = dispatcher
        .collab
        .engraver
        .to_svg(&symbolic)
        .ok_or_else(|| BridgeError::Collaborator("engraver produced no SVG".to_string()))?;
    let png = dispatcher
        .collab
        .rasterizer
        .svg_to_png(&svg)
        .await
        .map_err(|e| BridgeError::Collaborator(e.to_string()))?;

    let filename = format!("{}.png", uuid::Uuid::new_v4());
    let dest_dir = dispatcher.temp_dir();
    tokio::fs::create_dir_all(dest_dir)
        .await
        .map_err(|e| BridgeError::Collaborator(format!("failed to create temp dir: {e}")))?;
    let dest_path = dest_dir.join(&filename);
    tokio::fs::write(&dest_path, &png)
        .await
        .map_err(|e| BridgeError::Collaborator(format!("failed to write {}: {e}", dest_path.display())))?;

    let data = base64::engine::general_purpose::STANDARD.encode(&png);

    Ok(ToolResult::ok(vec![Content::image(data, "image/png")]))
}

fn validate_sequence(dispatcher: &McpDispatcher, sequence: &MusicSequence) -> Result<(), BridgeError> {
    sequence
        .validate_shape()
        .map_err(BridgeError::InvalidParams)?;

    let known = dispatcher.collab.instruments.known_names();
    for track in &sequence.tracks {
        if !known.contains(&track.instrument) {
            return Err(BridgeError::Collaborator(format!(
                "unknown instrument: {}",
                track.instrument
            )));
        }
    }
    Ok(())
}

/// Inline `tempo`/`tracks` beat `score_id`, which beats the "last played"
/// fallback. An inline sequence is validated exactly like
/// `play`'s; a `score_id`/"last" sequence was already validated when it was
/// played, so it is taken as-is.
async fn resolve_sequence(dispatcher: &McpDispatcher, arguments: &Value) -> Result<std::sync::Arc<MusicSequence>, BridgeError> {
    let has_inline = arguments.get("tempo").is_some() && arguments.get("tracks").is_some();

    if has_inline {
        let sequence: MusicSequence = serde_json::from_value(arguments.clone())
            .map_err(|e| BridgeError::InvalidParams(e.to_string()))?;
        validate_sequence(dispatcher, &sequence)?;
        return Ok(std::sync::Arc::new(sequence));
    }

    if let Some(score_id) = arguments.get("score_id").and_then(Value::as_str) {
        return dispatcher
            .scores
            .get(score_id)
            .await
            .ok_or_else(|| BridgeError::Collaborator(format!("no score found for id: {score_id}")));
    }

    dispatcher.scores.last().await.ok_or_else(|| {
        BridgeError::Collaborator(
            "No score available. Either provide notes or play a sequence first.".to_string(),
        )
    })
}

/// Renders a tempo without a trailing ".0" for whole-number BPM values, the
/// common case, while still showing fractional tempos exactly.
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}
