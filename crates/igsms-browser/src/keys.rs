//! Key names to `Input.dispatchKeyEvent` parameters.

use serde_json::{json, Value};

/// Everything CDP needs to synthesize one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDefinition {
    pub key: String,
    pub code: String,
    pub key_code: u32,
    /// Text produced by the key, if any.
    pub text: Option<String>,
}

impl KeyDefinition {
    fn named(key: &str, code: &str, key_code: u32, text: Option<&str>) -> Self {
        Self {
            key: key.to_string(),
            code: code.to_string(),
            key_code,
            text: text.map(str::to_string),
        }
    }

    /// Parameters for the `keyDown` half of a press.
    pub fn down_params(&self) -> Value {
        let mut params = json!({
            "type": if self.text.is_some() { "keyDown" } else { "rawKeyDown" },
            "key": self.key,
            "code": self.code,
            "windowsVirtualKeyCode": self.key_code,
            "nativeVirtualKeyCode": self.key_code,
        });
        if let Some(text) = &self.text {
            params["text"] = json!(text);
            params["unmodifiedText"] = json!(text);
        }
        params
    }

    /// Parameters for the `keyUp` half of a press.
    pub fn up_params(&self) -> Value {
        json!({
            "type": "keyUp",
            "key": self.key,
            "code": self.code,
            "windowsVirtualKeyCode": self.key_code,
            "nativeVirtualKeyCode": self.key_code,
        })
    }
}

/// Resolve a key name. Named keys are matched case-insensitively; any other
/// single character is typed as itself.
pub fn lookup(name: &str) -> Option<KeyDefinition> {
    let def = match name.to_ascii_lowercase().as_str() {
        "enter" | "return" => KeyDefinition::named("Enter", "Enter", 13, Some("\r")),
        "tab" => KeyDefinition::named("Tab", "Tab", 9, None),
        "backspace" => KeyDefinition::named("Backspace", "Backspace", 8, None),
        "escape" | "esc" => KeyDefinition::named("Escape", "Escape", 27, None),
        "delete" => KeyDefinition::named("Delete", "Delete", 46, None),
        "space" => KeyDefinition::named(" ", "Space", 32, Some(" ")),
        "arrowup" => KeyDefinition::named("ArrowUp", "ArrowUp", 38, None),
        "arrowdown" => KeyDefinition::named("ArrowDown", "ArrowDown", 40, None),
        "arrowleft" => KeyDefinition::named("ArrowLeft", "ArrowLeft", 37, None),
        "arrowright" => KeyDefinition::named("ArrowRight", "ArrowRight", 39, None),
        _ => return single_char(name),
    };
    Some(def)
}

fn single_char(name: &str) -> Option<KeyDefinition> {
    let mut chars = name.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }

    let upper = c.to_ascii_uppercase();
    let (code, key_code) = if c.is_ascii_alphabetic() {
        (format!("Key{upper}"), upper as u32)
    } else if c.is_ascii_digit() {
        (format!("Digit{c}"), c as u32)
    } else {
        (String::new(), 0)
    };

    Some(KeyDefinition {
        key: c.to_string(),
        code,
        key_code,
        text: Some(c.to_string()),
    })
}
