//! Locating the user-visible text inside request and response bodies.
//!
//! Request text: `prompt`, `input`, `instruction` (string or array of
//! strings) and `messages[].content` (string or `{type: "text"}` parts).
//! Response text: `choices[].text` and `choices[].message.content`.

use serde_json::Value;

/// Read-only view of every request text field.
pub fn request_texts(request: &Value) -> Vec<&str> {
    let mut texts = Vec::new();
    let Some(obj) = request.as_object() else {
        return texts;
    };
    for (key, value) in obj {
        match key.as_str() {
            "prompt" | "input" | "instruction" => push_strings(value, &mut texts),
            "messages" => {
                for message in value.as_array().into_iter().flatten() {
                    if let Some(content) = message.get("content") {
                        push_content(content, &mut texts);
                    }
                }
            },
            _ => {},
        }
    }
    texts
}

/// Mutable slots for every request text field.
pub fn request_texts_mut(request: &mut Value) -> Vec<&mut String> {
    let mut slots = Vec::new();
    let Some(obj) = request.as_object_mut() else {
        return slots;
    };
    for (key, value) in obj.iter_mut() {
        match key.as_str() {
            "prompt" | "input" | "instruction" => push_strings_mut(value, &mut slots),
            "messages" => {
                if let Value::Array(messages) = value {
                    for message in messages {
                        if let Some(content) = message.get_mut("content") {
                            push_content_mut(content, &mut slots);
                        }
                    }
                }
            },
            _ => {},
        }
    }
    slots
}

/// Request text as one string, fields separated by newlines.
pub fn request_text(request: &Value) -> String {
    request_texts(request).join("\n")
}

pub fn response_texts(response: &Value) -> Vec<&str> {
    let mut texts = Vec::new();
    for choice in response.get("choices").and_then(Value::as_array).into_iter().flatten() {
        if let Some(text) = choice.get("text").and_then(Value::as_str) {
            texts.push(text);
        }
        if let Some(text) = choice.pointer("/message/content").and_then(Value::as_str) {
            texts.push(text);
        }
    }
    texts
}

pub fn response_texts_mut(response: &mut Value) -> Vec<&mut String> {
    let mut slots = Vec::new();
    let Some(Value::Array(choices)) = response.get_mut("choices") else {
        return slots;
    };
    for choice in choices {
        let Value::Object(choice) = choice else {
            continue;
        };
        for (key, value) in choice.iter_mut() {
            match (key.as_str(), value) {
                ("text", Value::String(text)) => slots.push(text),
                ("message", Value::Object(message)) => {
                    if let Some(Value::String(content)) = message.get_mut("content") {
                        slots.push(content);
                    }
                },
                _ => {},
            }
        }
    }
    slots
}

pub fn response_text(response: &Value) -> String {
    response_texts(response).join("\n")
}

/// Content of the last `user` message in a chat request.
pub fn last_user_message(request: &Value) -> Option<String> {
    let messages = request.get("messages")?.as_array()?;
    let message = messages
        .iter()
        .rev()
        .find(|m| m.get("role").and_then(Value::as_str) == Some("user"))?;
    let mut texts = Vec::new();
    push_content(message.get("content")?, &mut texts);
    Some(texts.join("\n"))
}

/// First prompt of a completion request.
pub fn first_prompt(request: &Value) -> Option<&str> {
    match request.get("prompt")? {
        Value::String(s) => Some(s.as_str()),
        Value::Array(items) => items.first().and_then(Value::as_str),
        _ => None,
    }
}

fn push_strings<'a>(value: &'a Value, texts: &mut Vec<&'a str>) {
    match value {
        Value::String(s) => texts.push(s),
        Value::Array(items) => texts.extend(items.iter().filter_map(Value::as_str)),
        _ => {},
    }
}

fn push_content<'a>(content: &'a Value, texts: &mut Vec<&'a str>) {
    match content {
        Value::String(s) => texts.push(s),
        Value::Array(parts) => {
            for part in parts {
                if part.get("type").and_then(Value::as_str) == Some("text") {
                    if let Some(text) = part.get("text").and_then(Value::as_str) {
                        texts.push(text);
                    }
                }
            }
        },
        _ => {},
    }
}

fn push_strings_mut<'a>(value: &'a mut Value, slots: &mut Vec<&'a mut String>) {
    match value {
        Value::String(s) => slots.push(s),
        Value::Array(items) => {
            for item in items {
                if let Value::String(s) = item {
                    slots.push(s);
                }
            }
        },
        _ => {},
    }
}

fn push_content_mut<'a>(content: &'a mut Value, slots: &mut Vec<&'a mut String>) {
    match content {
        Value::String(s) => slots.push(s),
        Value::Array(parts) => {
            for part in parts {
                let Value::Object(part) = part else {
                    continue;
                };
                if part.get("type").and_then(Value::as_str) != Some("text") {
                    continue;
                }
                if let Some(Value::String(text)) = part.get_mut("text") {
                    slots.push(text);
                }
            }
        },
        _ => {},
    }
}
