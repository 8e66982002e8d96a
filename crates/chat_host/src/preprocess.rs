//! Cleans chat history before it is sent to a model.

use regex::{Captures, Regex};
use shared::agent_api::{ChatMessage, Role};
use std::sync::LazyLock;

static MODEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[Model: (.*?)\]\n\n").expect("valid model directive regex"));
static PROVIDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[Provider: (.*?)\]\n\n").expect("valid provider directive regex")
});
static THOUGHT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<div class="__codesmithThought__">.*?</div>|<think>.*?</think>"#)
        .expect("valid thought regex")
});
static ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<codesmithAction\b([^>]*)>.*?</codesmithAction>").expect("valid action regex")
});
static FILE_TYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?:^|\s)type="file""#).expect("valid action type regex"));
static LOCKFILE_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|\s)filePath="(?:[^"]*/)?(package-lock\.json|yarn\.lock|pnpm-lock\.yaml)""#)
        .expect("valid lockfile regex")
});

/// Directives embedded at the top of a user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageProperties {
    pub model: Option<String>,
    pub provider: Option<String>,
    pub content: String,
}

pub fn extract_properties_from_message(content: &str) -> MessageProperties {
    let model = MODEL_RE
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());
    let provider = PROVIDER_RE
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    let cleaned = MODEL_RE.replace(content, "");
    let cleaned = PROVIDER_RE.replace(&cleaned, "");

    MessageProperties {
        model,
        provider,
        content: cleaned.into_owned(),
    }
}

/// Drop thought blocks, collapse lockfile dumps, trim.
pub fn clean_assistant_content(content: &str) -> String {
    let cleaned = THOUGHT_RE.replace_all(content, "");
    let cleaned = ACTION_RE.replace_all(&cleaned, |caps: &Captures| {
        let attrs = &caps[1];
        match LOCKFILE_PATH_RE.captures(attrs) {
            Some(path) if FILE_TYPE_RE.is_match(attrs) => format!("[{} content removed]", &path[1]),
            _ => caps[0].to_string(),
        }
    });
    cleaned.trim().to_string()
}

#[derive(Debug, Clone, Default)]
pub struct Preprocessed {
    pub messages: Vec<ChatMessage>,
    /// Provider named by the most recent user directive.
    pub provider: Option<String>,
    /// Model named by the most recent user directive.
    pub model: Option<String>,
}

/// Map each message by role; order and count are preserved.
pub fn preprocess_messages(messages: Vec<ChatMessage>) -> Preprocessed {
    let mut out = Preprocessed {
        messages: Vec::with_capacity(messages.len()),
        ..Default::default()
    };

    for mut message in messages {
        match message.role {
            Role::User => {
                let props = extract_properties_from_message(&message.content);
                if props.model.is_some() {
                    out.model = props.model;
                }
                if props.provider.is_some() {
                    out.provider = props.provider;
                }
                message.content = props.content;
            }
            Role::Assistant => {
                message.content = clean_assistant_content(&message.content);
            }
            Role::System => {}
        }
        out.messages.push(message);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_and_strips_directives() {
        let props =
            extract_properties_from_message("[Model: gpt-4o]\n\n[Provider: OpenAI]\n\nfix the bug");
        assert_eq!(props.model.as_deref(), Some("gpt-4o"));
        assert_eq!(props.provider.as_deref(), Some("OpenAI"));
        assert_eq!(props.content, "fix the bug");
    }

    #[test]
    fn test_model_directive_must_lead() {
        let props = extract_properties_from_message("hello [Model: gpt-4o]\n\nthere");
        assert!(props.model.is_none());
        assert_eq!(props.content, "hello [Model: gpt-4o]\n\nthere");
    }

    #[test]
    fn test_assistant_cleanup() {
        let raw = "  <think>plan\nsteps</think>Sure.\n<div class=\"__codesmithThought__\">hidden</div>\n\
                   <codesmithAction type=\"file\" filePath=\"package-lock.json\">{\"lockfileVersion\": 3}</codesmithAction>\n ";
        let cleaned = clean_assistant_content(raw);
        assert_eq!(cleaned, "Sure.\n\n[package-lock.json content removed]");
    }

    #[test]
    fn test_lockfile_actions_match_any_attribute_order() {
        let raw = "<codesmithAction filePath=\"web/yarn.lock\" type=\"file\">a</codesmithAction>\n\
                   <codesmithAction type=\"file\" contentType=\"text\" filePath=\"pnpm-lock.yaml\">b</codesmithAction>\n\
                   <codesmithAction type=\"shell\" filePath=\"package-lock.json\">npm i</codesmithAction>\n\
                   <codesmithAction type=\"file\" filePath=\"src/yarn.lock.ts\">c</codesmithAction>";
        let cleaned = clean_assistant_content(raw);
        assert_eq!(
            cleaned,
            "[yarn.lock content removed]\n\
             [pnpm-lock.yaml content removed]\n\
             <codesmithAction type=\"shell\" filePath=\"package-lock.json\">npm i</codesmithAction>\n\
             <codesmithAction type=\"file\" filePath=\"src/yarn.lock.ts\">c</codesmithAction>"
        );
    }

    #[test]
    fn test_assistant_cleanup_is_idempotent() {
        for raw in [
            "Here is the change.\n\n[package-lock.json content removed]",
            "plain answer",
            "",
            "<codesmithAction type=\"file\" filePath=\"src/a.ts\">x</codesmithAction>",
        ] {
            let once = clean_assistant_content(raw);
            assert_eq!(clean_assistant_content(&once), once);
        }
        assert_eq!(clean_assistant_content("plain answer"), "plain answer");
    }

    #[test]
    fn test_preprocess_preserves_order_and_last_directive_wins() {
        let messages = vec![
            ChatMessage::new(Role::System, "  sys  "),
            ChatMessage::user("[Model: a]\n\n[Provider: P1]\n\nfirst").with_id("1"),
            ChatMessage::assistant(" <think>x</think>ok "),
            ChatMessage::user("[Model: b]\n\nsecond"),
        ];
        let out = preprocess_messages(messages);

        assert_eq!(out.messages.len(), 4);
        assert_eq!(out.messages[0].content, "  sys  ");
        assert_eq!(out.messages[1].content, "first");
        assert_eq!(out.messages[1].id.as_deref(), Some("1"));
        assert_eq!(out.messages[2].content, "ok");
        assert_eq!(out.messages[3].content, "second");
        assert_eq!(out.model.as_deref(), Some("b"));
        assert_eq!(out.provider.as_deref(), Some("P1"));
    }
}
