//! Translation of raw lircd command names into button names and labels.
//!
//! lircd knows commands by names such as `KEY_POWER` or `SRC_HDMI1`. The hub
//! wants a button name that is unique within a device plus a label for its
//! UI. Translation applies, in order:
//!
//! 1. an explicit [`MappingRule`] for the raw command, if configured;
//! 2. the `KEY_` convention: `KEY_CHANNEL_UP` becomes `CHANNEL UP`;
//! 3. the `SRC_` convention: `SRC_HDMI1` becomes `INPUT HDMI1`.
//!
//! Anything else is unmappable and [`map_raw_command`] returns `None`. A raw
//! command is never published under its own name unless a rule says so.
//!
//! Labels default to the title-cased name (`INPUT HDMI1` → `Input Hdmi1`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Prefix of lircd's standard key names (`KEY_POWER`).
pub const KEY_PREFIX: &str = "KEY_";
/// Prefix this gateway's remotes use for input-source commands (`SRC_HDMI1`).
pub const SRC_PREFIX: &str = "SRC_";
/// Name prefix given to `SRC_` commands.
pub const INPUT_PREFIX: &str = "INPUT ";

/// Optional override for one raw command.
///
/// Either field may be omitted; a missing name falls back to the raw command
/// itself and a missing label to the title-cased name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MappingRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Override table keyed by raw command name.
///
/// A `BTreeMap` keeps serialized output stable.
pub type KeyMap = BTreeMap<String, MappingRule>;

/// Which rule produced a [`ButtonMapping`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingSource {
    Rule,
    KeyPrefix,
    SourcePrefix,
}

/// Result of translating one raw command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonMapping {
    pub name: String,
    pub label: String,
    pub source: MappingSource,
}

/// Translates `raw` into a button name and label.
///
/// Returns `None` when neither an override nor a naming convention applies.
///
/// # Examples
///
/// ```rust
/// use lirc_core::domain::naming::{map_raw_command, KeyMap};
///
/// let keys = KeyMap::new();
/// let mapping = map_raw_command("SRC_HDMI1", &keys).unwrap();
/// assert_eq!(mapping.name, "INPUT HDMI1");
/// assert_eq!(mapping.label, "Input Hdmi1");
/// assert!(map_raw_command("VOL_UP", &keys).is_none());
/// ```
pub fn map_raw_command(raw: &str, keys: &KeyMap) -> Option<ButtonMapping> {
    if let Some(rule) = keys.get(raw) {
        let name = rule.name.clone().unwrap_or_else(|| raw.to_string());
        let label = rule.label.clone().unwrap_or_else(|| title_case(&name));
        return Some(ButtonMapping {
            name,
            label,
            source: MappingSource::Rule,
        });
    }

    let (name, source) = if let Some(rest) = raw.strip_prefix(KEY_PREFIX) {
        (spaced(rest), MappingSource::KeyPrefix)
    } else if let Some(rest) = raw.strip_prefix(SRC_PREFIX) {
        (
            format!("{INPUT_PREFIX}{}", spaced(rest)),
            MappingSource::SourcePrefix,
        )
    } else {
        return None;
    };

    Some(ButtonMapping {
        label: title_case(&name),
        name,
        source,
    })
}

/// Title-cases each whitespace-delimited token.
///
/// The first word character (ASCII alphanumeric or `_`) of a token is upper-cased
/// and everything after it lower-cased; leading punctuation is kept as is.
/// Whitespace between tokens is preserved.
///
/// ```rust
/// use lirc_core::domain::naming::title_case;
///
/// assert_eq!(title_case("CHANNEL UP"), "Channel Up");
/// assert_eq!(title_case("(NEXT) track"), "(Next) Track");
/// ```
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    // `seen_word_char` is reset at every whitespace boundary.
    let mut seen_word_char = false;
    for c in text.chars() {
        if c.is_whitespace() {
            seen_word_char = false;
            out.push(c);
        } else if seen_word_char {
            out.extend(c.to_lowercase());
        } else if c.is_ascii_alphanumeric() || c == '_' {
            seen_word_char = true;
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn spaced(rest: &str) -> String {
    rest.replace('_', " ")
}
