use serde::Serialize;

/// Events emitted by the URL-decode stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DecodeEvent {
    Progress { decoded: usize, failed: usize, total: usize },
    Complete { decoded: usize, failed: usize, total: usize },
    Error { message: String },
}

/// Events emitted by the analyzer stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnalyzeEvent {
    Progress { analyzed: usize, failed: usize, total: usize },
    Complete { analyzed: usize, failed: usize, total: usize },
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let ev = DecodeEvent::Progress { decoded: 2, failed: 1, total: 5 };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["decoded"], 2);
        assert_eq!(json["failed"], 1);
        assert_eq!(json["total"], 5);

        let done = AnalyzeEvent::Complete { analyzed: 3, failed: 0, total: 3 };
        let json = serde_json::to_value(&done).unwrap();
        assert_eq!(json["type"], "complete");
    }
}
