//! Offline, deterministic command model
//!
//! Matches verbs and known object names instead of calling an LLM. Good for
//! demos, tests and running without network access. The output still goes
//! through the schema validator, so anything it gets wrong is refused the
//! same way a bad LLM reply would be.

use crate::core::error::Result;
use crate::llm::{ActionModel, ModelRequest};
use crate::schema::{CandidateAction, CandidatePlan, Grasp, MotionGlobals};
use async_trait::async_trait;
use serde_json::json;

const PICK_VERBS: [&str; 4] = ["pick", "grab", "grasp", "take"];
const PLACE_VERBS: [&str; 6] = ["place", "put", "drop", "set", "release", "stack"];
const MOVE_VERBS: [&str; 6] = ["move", "go", "reach", "bring", "carry", "transfer"];
const PREPOSITIONS: [&str; 9] = ["on", "onto", "in", "into", "inside", "at", "over", "to", "above"];
const STOP_WORDS: [&str; 14] = [
    "and", "then", "on", "onto", "in", "into", "at", "to", "with", "keep", "keeping", "please",
    "it", "them",
];
const ARTICLES: [&str; 5] = ["the", "a", "an", "up", "that"];
/// Words that qualify a verb without naming anything
const MODIFIERS: [&str; 9] = [
    "now", "again", "also", "slow", "slowly", "carefully", "gently", "fast", "quickly",
];
/// Longest noun phrase used for objects the scene does not know
const MAX_PHRASE_WORDS: usize = 3;
const PLACE_OFFSET: [f64; 3] = [0.0, 0.0, 0.10];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verb {
    Pick,
    Place,
    Move,
}

impl Verb {
    fn classify(word: &str) -> Option<Self> {
        if PICK_VERBS.contains(&word) {
            Some(Verb::Pick)
        } else if PLACE_VERBS.contains(&word) {
            Some(Verb::Place)
        } else if MOVE_VERBS.contains(&word) {
            Some(Verb::Move)
        } else {
            None
        }
    }
}

/// Keyword matcher standing in for a language model
#[derive(Debug, Clone, Default)]
pub struct KeywordActionModel;

impl KeywordActionModel {
    pub fn new() -> Self {
        Self
    }

    /// Draft a plan from the command text alone
    pub fn draft(&self, request: &ModelRequest) -> CandidatePlan {
        let text = request.command.to_lowercase();
        let words = tokenize(&text);
        let objects = ObjectMatcher::new(&request.known_objects);

        let keep_vertical = words.iter().any(|w| w == "vertical" || w == "upright");
        let mut steps: Vec<CandidateAction> = Vec::new();
        // The arm told us what it is holding; don't pick that again
        let mut holding = request
            .failure_reason
            .as_deref()
            .and_then(held_object);

        for (verb, segment) in segments(&words) {
            match verb {
                Verb::Pick => {
                    let object = objects
                        .mentions(segment)
                        .into_iter()
                        .next()
                        .or_else(|| noun_phrase(segment));
                    // "grab it" right after a pick refers to what is already held
                    if object.is_none() && holding.is_some() {
                        continue;
                    }
                    steps.push(pick_step(object.as_deref()));
                    holding = object;
                }
                Verb::Place => {
                    let (carried, target) = split_on_preposition(segment, &objects);
                    if let Some(obj) = carried.filter(|o| holding.as_deref() != Some(o.as_str())) {
                        steps.push(pick_step(Some(obj.as_str())));
                    }
                    steps.push(place_step(target.as_deref()));
                    holding = None;
                }
                Verb::Move => {
                    if let Some(pose) = coordinates(segment) {
                        steps.push(
                            CandidateAction::new("move_ee")
                                .with("pose_xyzrpy", json!([pose[0], pose[1], pose[2], 0.0, 0.0, 0.0])),
                        );
                        continue;
                    }
                    let mentioned = objects.mentions(segment);
                    match mentioned.as_slice() {
                        [] => steps.push(CandidateAction::new("move_ee")),
                        [frame] => steps.push(
                            CandidateAction::new("move_ee")
                                .with("frame", frame.as_str())
                                .with("offset_xyz", json!(PLACE_OFFSET)),
                        ),
                        [object, .., target] => {
                            if holding.as_deref() != Some(object.as_str()) {
                                steps.push(pick_step(Some(object.as_str())));
                            }
                            steps.push(place_step(Some(target.as_str())));
                            holding = None;
                        }
                    }
                }
            }
        }

        if keep_vertical {
            for step in &mut steps {
                step.arguments.insert(
                    "constraints".into(),
                    json!({"keep_vertical": true, "clearance_m": 0.03}),
                );
            }
        }

        CandidatePlan {
            steps,
            globals: globals_for(&words),
        }
    }
}

#[async_trait]
impl ActionModel for KeywordActionModel {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn propose(&self, request: &ModelRequest) -> Result<CandidatePlan> {
        Ok(self.draft(request))
    }
}

/// Whether some verb in `text` is followed by an object phrase of its own
///
/// "grab the green ball and drop" names one; "now put" does not.
pub(crate) fn names_object(text: &str) -> bool {
    let words: Vec<String> = tokenize(&text.to_lowercase())
        .into_iter()
        .filter(|w| !MODIFIERS.contains(&w.as_str()))
        .collect();
    segments(&words)
        .into_iter()
        .any(|(_, segment)| noun_phrase(segment).is_some())
}

/// "step_0:gripper_occupied:red_cube" -> "red_cube"
fn held_object(reason: &str) -> Option<String> {
    let (_, held) = reason.split_once("gripper_occupied:")?;
    let held = held.split_whitespace().next()?;
    Some(held.to_string())
}

fn pick_step(object: Option<&str>) -> CandidateAction {
    let mut step = CandidateAction::new("pick");
    if let Some(object) = object {
        step = step.with("object", object);
    }
    let grasp = Grasp::top_down();
    step.with(
        "grasp",
        json!({"approach_axis": grasp.approach_axis, "pregrasp_m": grasp.pregrasp_m}),
    )
}

fn place_step(target: Option<&str>) -> CandidateAction {
    let mut step = CandidateAction::new("place");
    if let Some(target) = target {
        step = step.with("target", target);
    }
    step.with("offset_xyz", json!(PLACE_OFFSET))
}

fn globals_for(words: &[String]) -> MotionGlobals {
    let has = |w: &str| words.iter().any(|x| x == w);
    if has("slow") || has("slowly") || has("carefully") || has("gently") {
        MotionGlobals {
            vel_scale: 0.25,
            accel_scale: 0.2,
        }
    } else if has("fast") || has("quickly") {
        MotionGlobals {
            vel_scale: 0.6,
            accel_scale: 0.5,
        }
    } else {
        MotionGlobals::default()
    }
}

/// Lowercase words; numbers keep their sign and decimal point
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '(' | ')' | '[' | ']'))
        .map(|w| w.trim_matches(|c: char| matches!(c, '.' | '!' | '?' | ':' | '"' | '\'')))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split the word list at every verb; words before the first verb are dropped
fn segments(words: &[String]) -> Vec<(Verb, &[String])> {
    let starts: Vec<(usize, Verb)> = words
        .iter()
        .enumerate()
        .filter_map(|(i, w)| Verb::classify(w).map(|v| (i, v)))
        .collect();

    starts
        .iter()
        .enumerate()
        .map(|(n, &(i, verb))| {
            let end = starts.get(n + 1).map_or(words.len(), |&(j, _)| j);
            (verb, &words[i + 1..end])
        })
        .collect()
}

/// Best-effort frame name for an object the scene does not list
fn noun_phrase(segment: &[String]) -> Option<String> {
    let phrase: Vec<&str> = segment
        .iter()
        .map(String::as_str)
        .skip_while(|w| ARTICLES.contains(w))
        .take_while(|w| !STOP_WORDS.contains(w) && w.parse::<f64>().is_err())
        .take(MAX_PHRASE_WORDS)
        .collect();
    if phrase.is_empty() {
        None
    } else {
        Some(phrase.join("_"))
    }
}

/// (object being carried, destination) for a place segment
fn split_on_preposition(
    segment: &[String],
    objects: &ObjectMatcher,
) -> (Option<String>, Option<String>) {
    match segment.iter().position(|w| PREPOSITIONS.contains(&w.as_str())) {
        Some(p) => {
            let carried = objects.mentions(&segment[..p]).into_iter().next();
            let target = objects
                .mentions(&segment[p + 1..])
                .into_iter()
                .next()
                .or_else(|| noun_phrase(&segment[p + 1..]));
            (carried, target)
        }
        None => (None, objects.mentions(segment).into_iter().last()),
    }
}

/// "to 0.3 0.1 0.2" -> [0.3, 0.1, 0.2]
fn coordinates(segment: &[String]) -> Option<[f64; 3]> {
    let numbers: Vec<f64> = segment.iter().filter_map(|w| w.parse().ok()).collect();
    match numbers.as_slice() {
        [x, y, z, ..] => Some([*x, *y, *z]),
        _ => None,
    }
}

/// Finds known object names in word sequences
struct ObjectMatcher {
    /// (frame name, its words) longest first so "red cube" beats "cube"
    names: Vec<(String, Vec<String>)>,
}

impl ObjectMatcher {
    fn new(known: &[String]) -> Self {
        let mut names: Vec<(String, Vec<String>)> = known
            .iter()
            .map(|k| {
                let words = k
                    .to_lowercase()
                    .split(|c: char| c == '_' || c.is_whitespace())
                    .filter(|w| !w.is_empty())
                    .map(str::to_string)
                    .collect();
                (k.clone(), words)
            })
            .collect();
        names.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
        Self { names }
    }

    /// Frame names mentioned in the segment, in order of appearance
    fn mentions(&self, segment: &[String]) -> Vec<String> {
        let mut found: Vec<(usize, String)> = Vec::new();
        let mut covered = vec![false; segment.len()];

        for (frame, words) in &self.names {
            let frame_lower = frame.to_lowercase();
            for start in 0..segment.len() {
                if covered[start] {
                    continue;
                }
                let span = if segment[start] == frame_lower {
                    1
                } else if !words.is_empty() && segment[start..].starts_with(words) {
                    words.len()
                } else {
                    continue;
                };
                covered[start..start + span].iter_mut().for_each(|c| *c = true);
                found.push((start, frame.clone()));
            }
        }

        found.sort_by_key(|(pos, _)| *pos);
        found.into_iter().map(|(_, frame)| frame).collect()
    }
}
