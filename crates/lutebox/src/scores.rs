//! `ScoreStore`: an ephemeral in-memory mapping from opaque ids to
//! the most recently `play`ed `MusicSequence`, plus a distinguished "last"
//! slot `engrave` falls back to. Owned by the dispatcher so that `put`/`get`
//! ordering is linearizable across concurrent tool-call tasks.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use lutebox_proto::MusicSequence;
use tokio::sync::Mutex;

/// Small cap is fine: `engrave` only ever needs the most recent handful
///.
const MAX_ENTRIES: usize = 32;

#[derive(Default)]
struct ScoreState {
    entries: HashMap<String, Arc<MusicSequence>>,
    order: VecDeque<String>,
    last: Option<Arc<MusicSequence>>,
}

pub struct ScoreStore {
    state: Mutex<ScoreState>,
}

impl ScoreStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ScoreState::default()),
        }
    }

    /// Stores `sequence` under a freshly generated id and in the "last"
    /// slot. Returns the new id.
    pub async fn put(&self, sequence: MusicSequence) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let sequence = Arc::new(sequence);

        let mut state = self.state.lock().await;
        state.entries.insert(id.clone(), sequence.clone());
        state.order.push_back(id.clone());
        state.last = Some(sequence);

        while state.order.len() > MAX_ENTRIES {
            if let Some(oldest) = state.order.pop_front() {
                state.entries.remove(&oldest);
            }
        }

        id
    }

    pub async fn get(&self, id: &str) -> Option<Arc<MusicSequence>> {
        self.state.lock().await.entries.get(id).cloned()
    }

    pub async fn last(&self) -> Option<Arc<MusicSequence>> {
        self.state.lock().await.last.clone()
    }
}

impl Default for ScoreStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequence(title: &str) -> MusicSequence {
        serde_json::from_value(serde_json::json!({
            "title": title,
            "tempo": 120.0,
            "tracks": []
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = ScoreStore::new();
        let id = store.put(sequence("T")).await;
        let got = store.get(&id).await.unwrap();
        assert_eq!(got.title.as_deref(), Some("T"));
    }

    #[tokio::test]
    async fn last_reflects_most_recent_put() {
        let store = ScoreStore::new();
        store.put(sequence("first")).await;
        store.put(sequence("second")).await;
        assert_eq!(store.last().await.unwrap().title.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn missing_id_returns_none() {
        let store = ScoreStore::new();
        assert!(store.get("no-such-id").await.is_none());
    }

    #[tokio::test]
    async fn eviction_caps_entry_count() {
        let store = ScoreStore::new();
        let mut first_id = String::new();
        for i in 0..(MAX_ENTRIES + 5) {
            let id = store.put(sequence(&format!("seq-{i}"))).await;
            if i == 0 {
                first_id = id;
            }
        }
        assert!(store.get(&first_id).await.is_none());
        assert!(store.last().await.is_some());
    }
}
