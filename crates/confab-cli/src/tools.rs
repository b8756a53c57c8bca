use anyhow::Result;
use rand::Rng;
use serde_json::{json, Value};

use confab::models::tool::Tool;
use confab::registry::ToolRegistry;

/// Build the demo tools the chat session exposes to the model
pub fn build_registry() -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();

    registry.register(
        Tool::new(
            "transform_text",
            "Reverse the characters in the text, then capitalize the first letter of each reversed word",
            json!({
                "type": "object",
                "properties": {
                    "text": {
                        "type": "string",
                        "description": "The text to transform"
                    }
                },
                "required": ["text"]
            }),
        ),
        |args: Value| async move {
            let text = args.get("text").and_then(|v| v.as_str()).unwrap_or_default();
            Ok(Value::String(transform_text(text)))
        },
    )?;

    registry.register(
        Tool::new(
            "count_words",
            "Count the number of words in text",
            json!({
                "type": "object",
                "properties": {
                    "text": {
                        "type": "string",
                        "description": "The text to count words in"
                    }
                },
                "required": ["text"]
            }),
        ),
        |args: Value| async move {
            let text = args.get("text").and_then(|v| v.as_str()).unwrap_or_default();
            Ok(json!({ "count": text.split_whitespace().count() }))
        },
    )?;

    registry.register(
        Tool::new(
            "roll_dice",
            "Roll a die and return the result",
            json!({
                "type": "object",
                "properties": {
                    "sides": {
                        "type": "integer",
                        "description": "Number of sides on the die, defaults to 6"
                    }
                },
                "required": []
            }),
        ),
        |args: Value| async move {
            let sides = args
                .get("sides")
                .and_then(|v| v.as_u64())
                .unwrap_or(6)
                .max(1);
            let roll = rand::thread_rng().gen_range(1..=sides);
            Ok(json!({ "roll": roll, "sides": sides }))
        },
    )?;

    Ok(registry)
}

fn transform_text(text: &str) -> String {
    let reversed: String = text.chars().rev().collect();
    reversed
        .split_whitespace()
        .map(capitalize_word)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Uppercase the first letter of the word, lowercase the rest. Leading
/// non-letters stay put, words without letters come back unchanged.
fn capitalize_word(word: &str) -> String {
    match word.find(|c: char| c.is_alphabetic()) {
        Some(position) => {
            let mut result = String::with_capacity(word.len());
            result.push_str(&word[..position]);

            let mut chars = word[position..].chars();
            if let Some(first) = chars.next() {
                result.extend(first.to_uppercase());
            }
            result.extend(chars.flat_map(|c| c.to_lowercase()));
            result
        }
        None => word.to_string(),
    }
}
