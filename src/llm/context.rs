//! Dialogue context for reference resolution and prompts
//!
//! Keeps a fixed window of recent turns so later commands can say "it" or
//! "that one". The interpreter owns the store exclusively; nothing else
//! mutates it.

use crate::backend::ExecutionResult;
use crate::core::types::{Timestamp, TurnId};
use crate::llm::keyword::names_object;
use crate::schema::{ActionName, Plan};
use chrono::Utc;
use serde::Serialize;
use std::collections::VecDeque;

/// One completed turn
#[derive(Debug, Clone, Serialize)]
pub struct ContextEntry {
    pub turn: TurnId,
    /// The command that was planned, with references already rewritten
    /// ("put it in bin_a" is stored as "put red cube in bin_a")
    pub command: String,
    /// Last validated plan of the turn, if any attempt validated
    pub plan: Option<Plan>,
    pub result: ExecutionResult,
    pub timestamp: Timestamp,
}

impl ContextEntry {
    pub fn new(command: impl Into<String>, plan: Option<Plan>, result: ExecutionResult) -> Self {
        Self {
            turn: TurnId::new(),
            command: command.into(),
            plan,
            result,
            timestamp: Utc::now(),
        }
    }

    /// The object this turn was about: the last picked object, else the last
    /// thing any step referred to
    pub fn referent(&self) -> Option<&str> {
        let steps = self.plan.as_ref()?.steps();
        steps
            .iter()
            .rev()
            .find(|s| s.name() == ActionName::Pick)
            .and_then(|s| s.referent())
            .or_else(|| steps.iter().rev().find_map(|s| s.referent()))
    }
}

/// How a command's references relate to the context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Nothing to resolve
    None,
    /// Dangling references rewritten to the referent
    Resolved { text: String, referent: String },
    /// Dangling reference with nothing in context to point at
    Unresolved,
}

/// Fixed-capacity history of turns, oldest evicted first
#[derive(Debug, Clone)]
pub struct ContextStore {
    entries: VecDeque<ContextEntry>,
    capacity: usize,
    scene_objects: Vec<String>,
}

impl ContextStore {
    /// Capacity is clamped to at least one entry
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            scene_objects: Vec::new(),
        }
    }

    pub fn with_scene_objects(mut self, objects: Vec<String>) -> Self {
        self.scene_objects = objects;
        self
    }

    pub fn set_scene_objects(&mut self, objects: Vec<String>) {
        self.scene_objects = objects;
    }

    /// Append a turn, returning the evicted entry when full
    pub fn record(&mut self, entry: ContextEntry) -> Option<ContextEntry> {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    /// Oldest first
    pub fn entries(&self) -> impl Iterator<Item = &ContextEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&ContextEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Most recent thing the dialogue was about
    pub fn last_referent(&self) -> Option<&str> {
        self.entries.iter().rev().find_map(|e| e.referent())
    }

    /// Scene objects followed by any referents not already listed
    pub fn known_objects(&self) -> Vec<String> {
        let mut objects = self.scene_objects.clone();
        for entry in self.entries.iter().rev() {
            if let Some(r) = entry.referent() {
                if !objects.iter().any(|o| o == r) {
                    objects.push(r.to_string());
                }
            }
        }
        objects
    }

    /// Text summary of the window for prompts
    pub fn summary(&self) -> String {
        let mut s = String::new();
        for entry in &self.entries {
            let status = if entry.result.is_success() {
                "ok".to_string()
            } else {
                format!("failed: {}", entry.result.reason())
            };
            s.push_str(&format!("- \"{}\" [{}]", entry.command, status));
            if let Some(plan) = &entry.plan {
                s.push_str(&format!(" {}", plan.describe()));
            }
            s.push('\n');
        }
        if let Some(referent) = self.last_referent() {
            s.push_str(&format!("Last object: {}\n", referent));
        }
        s
    }

    /// Rewrite references that do not point inside the command itself
    ///
    /// "pick the red cube and place it on the box" and "grab the green ball
    /// and drop it" are left alone because a verb names an object before
    /// "it"; "now put it in the bin" is rewritten with the last referent.
    pub fn resolve_references(&self, text: &str) -> Reference {
        let spans = anaphora(text);
        let Some(&(first, _)) = spans.first() else {
            return Reference::None;
        };

        let before = text[..first].to_lowercase();
        let named_earlier = names_object(&before)
            || self
                .known_objects()
                .iter()
                .any(|o| before.contains(&o.to_lowercase()) || before.contains(&display_name(o)));
        if named_earlier {
            return Reference::None;
        }

        let Some(referent) = self.last_referent() else {
            return Reference::Unresolved;
        };

        Reference::Resolved {
            text: substitute_references(text, &display_name(referent)),
            referent: referent.to_string(),
        }
    }

    /// Whether the command contains a reference that needs context
    pub fn has_dangling_reference(&self, text: &str) -> bool {
        !matches!(self.resolve_references(text), Reference::None)
    }
}

/// Replace every anaphoric reference in `text` with `replacement`
pub fn substitute_references(text: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len() + replacement.len());
    let mut cursor = 0;
    for (start, end) in anaphora(text) {
        out.push_str(&text[cursor..start]);
        out.push_str(replacement);
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// "red_cube" -> "red cube"
fn display_name(frame: &str) -> String {
    frame.replace('_', " ").to_lowercase()
}

/// Byte spans of words, split on anything that is not alphanumeric
fn words(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        if c.is_alphanumeric() || c == '_' || c == '\'' {
            if start.is_none() {
                start = Some(i);
            }
        } else if let Some(s) = start.take() {
            spans.push((s, i));
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}

/// Spans of anaphoric references: "it", "them", "that/this/same one"
fn anaphora(text: &str) -> Vec<(usize, usize)> {
    let spans = words(text);
    let lower: Vec<String> = spans
        .iter()
        .map(|&(s, e)| text[s..e].to_lowercase())
        .collect();

    let mut found = Vec::new();
    let mut i = 0;
    while i < spans.len() {
        let w = lower[i].as_str();
        if w == "it" || w == "them" {
            found.push(spans[i]);
        } else if matches!(w, "that" | "this" | "same")
            && lower.get(i + 1).map(String::as_str) == Some("one")
        {
            found.push((spans[i].0, spans[i + 1].1));
            i += 1;
        }
        i += 1;
    }
    found
}
