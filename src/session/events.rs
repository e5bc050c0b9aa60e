//! Session status and outward events

use serde::Serialize;

use crate::layout::LayoutConfig;

/// Load status of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Error,
}

/// Events broadcast to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    StatusChanged {
        status: LoadStatus,
        message: Option<String>,
    },
    /// A book finished loading and its pages can be shown
    #[serde(rename_all = "camelCase")]
    ContentReady {
        book_id: String,
        title: String,
        author: String,
        language: String,
        page_count: usize,
    },
    /// The visible page changed (after navigation or re-pagination)
    #[serde(rename_all = "camelCase")]
    PageChanged {
        index: usize,
        total: usize,
        chapter_title: String,
        /// Plain text of the page, for assistive readers
        text: String,
    },
    LayoutChanged { layout: LayoutConfig },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event = SessionEvent::PageChanged {
            index: 2,
            total: 10,
            chapter_title: "One".to_string(),
            text: "Hello".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "pageChanged");
        assert_eq!(json["chapterTitle"], "One");
        assert_eq!(json["total"], 10);

        let status = serde_json::to_value(SessionEvent::StatusChanged {
            status: LoadStatus::Ready,
            message: None,
        })
        .unwrap();
        assert_eq!(status["status"], "ready");
    }
}
