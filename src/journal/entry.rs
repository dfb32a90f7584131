//! Journal entry types.

use serde::Serialize;
use uuid::Uuid;

/// Record of one evaluation pass.
#[derive(Debug, Clone, Serialize)]
pub struct PassEntry {
    /// RFC 3339 timestamp of the start of the pass.
    pub timestamp: String,
    /// Unique identifier of the pass.
    pub pass_id: Uuid,
    /// Hook that triggered the pass.
    pub hook: String,
    /// Charm options in effect (secrets redacted).
    pub options: serde_json::Value,
    /// Transitions fired, in order.
    pub transitions: Vec<String>,
    /// Flags raised once the pass ended.
    pub flags: Vec<String>,
    pub result: PassResult,
    pub duration_ms: u64,
}

impl PassEntry {
    /// Entry for a pass that reached its fixed point.
    pub fn success(
        timestamp: String,
        pass_id: Uuid,
        hook: String,
        options: serde_json::Value,
        transitions: Vec<String>,
        flags: Vec<String>,
        status: String,
        duration_ms: u64,
    ) -> Self {
        Self {
            timestamp,
            pass_id,
            hook,
            options,
            transitions,
            flags,
            result: PassResult::Success { status },
            duration_ms,
        }
    }

    /// Entry for an aborted pass.
    pub fn failure(
        timestamp: String,
        pass_id: Uuid,
        hook: String,
        options: serde_json::Value,
        transitions: Vec<String>,
        flags: Vec<String>,
        error_code: String,
        error_message: String,
        duration_ms: u64,
    ) -> Self {
        Self {
            timestamp,
            pass_id,
            hook,
            options,
            transitions,
            flags,
            result: PassResult::Failure {
                error_code,
                error_message,
            },
            duration_ms,
        }
    }
}

/// Outcome of a pass.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status")]
pub enum PassResult {
    #[serde(rename = "converged")]
    Success {
        /// Workload status reported at the end of the pass.
        #[serde(rename = "workload_status")]
        status: String,
    },
    #[serde(rename = "failed")]
    Failure { error_code: String, error_message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_serialization() {
        let entry = PassEntry::success(
            "2026-01-15T10:30:45.123Z".to_string(),
            Uuid::nil(),
            "config-changed".to_string(),
            serde_json::json!({"port": 9103}),
            vec!["configure".to_string(), "restart".to_string()],
            vec!["installed".to_string(), "configured".to_string()],
            "active: cAdvisor running on port 9103".to_string(),
            42,
        );

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"status\":\"converged\""));
        assert!(json.contains("\"hook\":\"config-changed\""));
        assert!(json.contains("\"transitions\":[\"configure\",\"restart\"]"));
        assert!(json.contains("\"workload_status\":\"active: cAdvisor running on port 9103\""));
        assert!(json.contains("\"duration_ms\":42"));
    }

    #[test]
    fn test_failure_serialization() {
        let entry = PassEntry::failure(
            "2026-01-15T10:30:45.123Z".to_string(),
            Uuid::nil(),
            "install".to_string(),
            serde_json::json!({}),
            vec![],
            vec![],
            "INSTALL".to_string(),
            "apt-get exited with status 100".to_string(),
            5,
        );

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"status\":\"failed\""));
        assert!(json.contains("\"error_code\":\"INSTALL\""));
        assert!(json.contains("\"error_message\":\"apt-get exited with status 100\""));
    }
}
