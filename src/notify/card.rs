//! Feishu interactive card for a bug.

use serde_json::{json, Value};

use crate::api::Bug;

/// Longest title shown in a card header, in characters.
const MAX_TITLE_CHARS: usize = 80;

/// Header colour template used for bug cards.
pub const DEFAULT_HEADER_TEMPLATE: &str = "blue";

/// Build the card for one bug.
///
/// The card has a header with the id and (truncated) title, a markdown body
/// with severity, status, product/module, author and creation time, and a
/// button linking to the bug in ZenTao.
pub fn bug_card(bug: &Bug, bug_url: &str, header_template: &str) -> Value {
    let title = if bug.title.is_empty() {
        "(untitled)".to_string()
    } else {
        bug.title.chars().take(MAX_TITLE_CHARS).collect()
    };

    let content = format!(
        concat!(
            "**Severity**: {}\n",
            "**Status**: {}\n",
            "**Product / Module**: {} / {}\n",
            "**Opened by**: {}\n",
            "**Opened at**: {}",
        ),
        or_dash(&bug.severity),
        or_dash(&bug.status),
        or_dash(&bug.product),
        or_dash(&bug.module),
        or_dash(&bug.opened_by),
        or_dash(&bug.opened_date),
    );

    json!({
        "config": {"wide_screen_mode": true},
        "header": {
            "title": {"tag": "plain_text", "content": format!("Bug #{} - {}", bug.id, title)},
            "template": header_template,
        },
        "elements": [
            {"tag": "div", "text": {"tag": "lark_md", "content": content}},
            {
                "tag": "action",
                "actions": [{
                    "tag": "button",
                    "text": {"tag": "plain_text", "content": "View bug"},
                    "type": "primary",
                    "url": bug_url,
                }],
            },
        ],
    })
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bug_card_layout() {
        let bug = Bug {
            id: "42".to_string(),
            title: "Crash on save".to_string(),
            severity: "2".to_string(),
            status: "active".to_string(),
            product: "Web".to_string(),
            ..Default::default()
        };

        let card = bug_card(&bug, "http://z/bug-view-42.html", DEFAULT_HEADER_TEMPLATE);

        assert_eq!(card["header"]["title"]["content"], "Bug #42 - Crash on save");
        assert_eq!(card["header"]["template"], "blue");
        let content = card["elements"][0]["text"]["content"].as_str().unwrap();
        assert!(content.contains("**Severity**: 2"));
        assert!(content.contains("Web / -"));
        assert!(content.contains("**Opened by**: -"));
        assert_eq!(
            card["elements"][1]["actions"][0]["url"],
            "http://z/bug-view-42.html"
        );
    }

    #[test]
    fn test_bug_card_truncates_title_by_chars() {
        let bug = Bug {
            id: "1".to_string(),
            title: "界".repeat(100),
            ..Default::default()
        };
        let card = bug_card(&bug, "u", DEFAULT_HEADER_TEMPLATE);
        let header = card["header"]["title"]["content"].as_str().unwrap();
        assert_eq!(header.chars().count(), "Bug #1 - ".len() + MAX_TITLE_CHARS);
    }

    #[test]
    fn test_bug_card_untitled() {
        let card = bug_card(&Bug::default(), "u", DEFAULT_HEADER_TEMPLATE);
        assert_eq!(card["header"]["title"]["content"], "Bug # - (untitled)");
    }
}
