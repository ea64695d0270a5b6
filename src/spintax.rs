//! Spintax expansion and merge-field rendering.
//!
//! A spintax group is `{option1|option2|...}`. Groups nest; the innermost
//! group is always resolved first, so `{A|{B|C}}` expands to one of `A`, `B`,
//! `C`. Unbalanced braces are left in the output untouched.
//!
//! Merge fields (`{FirstName}`, `{{company}}`) are substituted after spin
//! resolution. [`render`] shields them from the spinner so a one-option group
//! never swallows a field name, and values are never themselves spun.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::trace;

use crate::error::TemplateError;
use crate::random::{RandomSource, ThreadRandom};

/// An innermost group: a `{`, one or more non-brace characters, a `}`.
static GROUP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{([^{}]+)\}").unwrap());

/// A double-brace merge tag such as `{{firstName}}`.
static DOUBLE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap());

/// A single-brace tag such as `{FirstName}`; only a field if the name is known.
static SINGLE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// Expand every spintax group in `text` using the thread RNG.
pub fn spin(text: &str) -> String {
    spin_with(text, &ThreadRandom)
}

/// Expand every spintax group in `text`, drawing choices from `rng`.
///
/// Each pass replaces the first innermost group with one of its options, so
/// the number of brace pairs strictly decreases and the loop terminates.
pub fn spin_with(text: &str, rng: &dyn RandomSource) -> String {
    let mut current = text.to_string();
    loop {
        let Some(caps) = GROUP.captures(&current) else {
            break;
        };
        let (Some(whole), Some(content)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let options: Vec<&str> = content.as_str().split('|').collect();
        let chosen = options[rng.index(options.len())].to_string();
        let range = whole.range();
        current.replace_range(range, &chosen);
    }
    current
}

/// Report the first unbalanced brace in `text`, if any.
///
/// Diagnostic only: [`spin`] accepts unbalanced input and leaves the
/// unresolved braces in place.
pub fn check_balanced(text: &str) -> Result<(), TemplateError> {
    let mut open: Vec<usize> = Vec::new();
    for (pos, ch) in text.char_indices() {
        match ch {
            '{' => open.push(pos),
            '}' => {
                if open.pop().is_none() {
                    return Err(TemplateError::StrayClose(pos));
                }
            }
            _ => {}
        }
    }
    match open.first() {
        Some(&pos) => Err(TemplateError::UnclosedGroup(pos)),
        None => Ok(()),
    }
}

/// Named values substituted into a template after spinning.
#[derive(Debug, Clone, Default)]
pub struct MergeFields {
    fields: Vec<(String, String)>,
}

impl MergeFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a field.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
        self
    }

    /// Look up a field, ignoring ASCII case (`{{firstName}}` finds `FirstName`).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn slot_marker(index: usize) -> String {
    format!("\u{1}{index}\u{2}")
}

/// Spin `template` and substitute merge fields.
///
/// Field names match ignoring ASCII case in both forms, so `{firstname}`
/// and `{{FIRSTNAME}}` both find `FirstName`.
///
/// Every `{{name}}` tag is protected from the spinner; tags with no matching
/// field come back literally. A single-brace `{Name}` is treated as a field
/// only when `Name` matches a supplied field, otherwise it is an ordinary
/// one-option group. All occurrences are replaced.
pub fn render(template: &str, fields: &MergeFields, rng: &dyn RandomSource) -> String {
    let mut slots: Vec<String> = Vec::new();

    let shielded = DOUBLE_TAG.replace_all(template, |caps: &Captures| {
        let value = fields
            .get(&caps[1])
            .map(str::to_string)
            .unwrap_or_else(|| caps[0].to_string());
        slots.push(value);
        slot_marker(slots.len() - 1)
    });
    let shielded = SINGLE_TAG
        .replace_all(&shielded, |caps: &Captures| match fields.get(&caps[1]) {
            Some(value) => {
                slots.push(value.to_string());
                slot_marker(slots.len() - 1)
            }
            None => caps[0].to_string(),
        })
        .into_owned();

    let mut out = spin_with(&shielded, rng);
    for (index, value) in slots.iter().enumerate() {
        out = out.replace(&slot_marker(index), value);
    }

    trace!(fields = slots.len(), "Rendered template");
    out
}
