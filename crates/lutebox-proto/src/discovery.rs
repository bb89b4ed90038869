//! The `DiscoveryRecord` wire format: the single fact that
//! coordinates all StdioProxy/BackendSupervisor instances.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryRecord {
    pub host: String,
    pub port: u16,
    pub status: DiscoveryStatus,
    pub pid: u32,
    pub instance: String,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryStatus {
    Running,
}

impl DiscoveryRecord {
    pub fn new(host: impl Into<String>, port: u16, pid: u32, instance: impl Into<String>, timestamp: f64) -> Self {
        Self {
            host: host.into(),
            port,
            status: DiscoveryStatus::Running,
            pid,
            instance: instance.into(),
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_round_trips_through_json() {
        let rec = DiscoveryRecord::new("127.0.0.1", 7737, 1234, "abc-def", 1700000000.5);
        let json = serde_json::to_string(&rec).unwrap();
        let parsed: DiscoveryRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, rec);
    }

    #[test]
    fn status_serializes_as_lowercase_string() {
        let rec = DiscoveryRecord::new("127.0.0.1", 7737, 1, "x", 0.0);
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["status"], "running");
    }
}
