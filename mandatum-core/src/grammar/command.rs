//! Command definitions: requirement list, action reference, argument and
//! output templates, and the derived recognizer vocabularies.
//!
//! Commands are built once at startup and validated when collected into a
//! [`CommandSet`]; everything after registration treats them as read-only.

use std::fmt;
use std::sync::Arc;

use crate::error::{MandatumError, Result};
use crate::grammar::{
    evaluate, tokenize::number_word_lexicon, Requirement, SlotValue, Token, TokenPool,
};

/// An action invocation: resolved slot values in, rendered result text out.
///
/// Resolved from a closed set of builtin actions at configuration load —
/// never looked up by name at match time.
pub type ActionFn = Arc<dyn Fn(&[SlotValue]) -> anyhow::Result<String> + Send + Sync>;

/// One positional argument of an action: a fixed literal, or the value of
/// the requirement at `Slot(index)`.
#[derive(Debug, Clone)]
pub enum ArgTemplate {
    Literal(SlotValue),
    Slot(usize),
}

/// Parsed output template. Marker syntax in the raw string:
/// `[FUNC]` — the action's result text; `[2]` — the value of slot 2.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputSeg {
    Literal(String),
    Slot(usize),
    ActionResult,
}

#[derive(Debug, Clone, Default)]
pub struct OutputTemplate {
    segments: Vec<OutputSeg>,
}

impl OutputTemplate {
    pub fn parse(raw: &str) -> Self {
        let mut segments = Vec::new();
        let mut rest = raw;

        while let Some(open) = rest.find('[') {
            let (before, tail) = rest.split_at(open);
            let Some(close) = tail.find(']') else {
                break;
            };
            let inner = &tail[1..close];
            let seg = if inner == "FUNC" {
                Some(OutputSeg::ActionResult)
            } else {
                inner.parse::<usize>().ok().map(OutputSeg::Slot)
            };

            match seg {
                Some(seg) => {
                    if !before.is_empty() {
                        segments.push(OutputSeg::Literal(before.to_string()));
                    }
                    segments.push(seg);
                    rest = &tail[close + 1..];
                }
                None => {
                    // Not a marker — keep the bracket as literal text.
                    segments.push(OutputSeg::Literal(rest[..open + 1].to_string()));
                    rest = &rest[open + 1..];
                }
            }
        }
        if !rest.is_empty() {
            segments.push(OutputSeg::Literal(rest.to_string()));
        }

        Self { segments }
    }

    pub fn render(&self, values: &[SlotValue], action_result: &str) -> String {
        let mut out = String::new();
        for seg in &self.segments {
            match seg {
                OutputSeg::Literal(s) => out.push_str(s),
                OutputSeg::ActionResult => out.push_str(action_result),
                OutputSeg::Slot(i) => {
                    if let Some(v) = values.get(*i) {
                        out.push_str(&v.to_string());
                    }
                }
            }
        }
        out
    }

    fn max_slot(&self) -> Option<usize> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                OutputSeg::Slot(i) => Some(*i),
                _ => None,
            })
            .max()
    }
}

/// A registered voice command.
pub struct Command {
    name: String,
    requirements: Vec<Requirement>,
    action: ActionFn,
    args: Vec<ArgTemplate>,
    output: OutputTemplate,
    // Derived at construction:
    keyword_vocabulary: Vec<String>,
    full_vocabulary: Vec<String>,
    has_open_slot: bool,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("requirements", &self.requirements.len())
            .field("has_open_slot", &self.has_open_slot)
            .finish_non_exhaustive()
    }
}

impl Command {
    pub fn new(
        name: impl Into<String>,
        requirements: Vec<Requirement>,
        action: ActionFn,
        args: Vec<ArgTemplate>,
        output_template: &str,
    ) -> Self {
        let keyword_vocabulary = requirements
            .first()
            .map(|req| {
                let mut words = Vec::new();
                req.collect_literals(&mut words);
                dedup_preserving_order(words)
            })
            .unwrap_or_default();

        let mut full = Vec::new();
        for req in &requirements {
            req.collect_literals(&mut full);
        }
        // A Number slot widens the recognizer lexicon to the number words.
        if requirements.iter().any(Requirement::contains_number) {
            full.extend(number_word_lexicon());
        }
        let full_vocabulary = dedup_preserving_order(full);

        let has_open_slot = requirements.iter().any(Requirement::contains_open);

        Self {
            name: name.into(),
            requirements,
            action,
            args,
            output: OutputTemplate::parse(output_template),
            keyword_vocabulary,
            full_vocabulary,
            has_open_slot,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn action(&self) -> ActionFn {
        Arc::clone(&self.action)
    }

    pub fn args(&self) -> &[ArgTemplate] {
        &self.args
    }

    pub fn output(&self) -> &OutputTemplate {
        &self.output
    }

    /// Flattened literal words of the keyword (first) requirement.
    pub fn keyword_vocabulary(&self) -> &[String] {
        &self.keyword_vocabulary
    }

    /// Flattened literal words of all requirements, number words included
    /// when a `Number` slot is present.
    pub fn full_vocabulary(&self) -> &[String] {
        &self.full_vocabulary
    }

    /// True when any requirement is open-ended — full-language transcription
    /// is required for the free-text remainder.
    pub fn has_open_slot(&self) -> bool {
        self.has_open_slot
    }

    /// Cheap first-pass filter: is the keyword requirement satisfied?
    pub fn keyword_satisfied(&self, tokens: &[Token]) -> bool {
        let Some(keyword) = self.requirements.first() else {
            return false;
        };
        let mut pool = TokenPool::new(tokens.to_vec());
        evaluate(keyword, &mut pool).is_some()
    }

    /// Full greedy left-to-right evaluation. `Some(values)` iff every
    /// requirement resolved; the open slot (if any) receives the remaining
    /// token span.
    pub fn evaluate(&self, tokens: &[Token]) -> Option<Vec<SlotValue>> {
        let mut pool = TokenPool::new(tokens.to_vec());
        let mut values = Vec::with_capacity(self.requirements.len());
        let mut open_slot = None;

        for (i, req) in self.requirements.iter().enumerate() {
            let value = evaluate(req, &mut pool)?;
            if value == SlotValue::Open {
                open_slot = Some(i);
            }
            values.push(value);
        }

        if let Some(i) = open_slot {
            values[i] = SlotValue::Word(pool.remaining_text());
        }
        Some(values)
    }

    fn validate(&self) -> Result<()> {
        let command = self.name.clone();

        let Some(keyword) = self.requirements.first() else {
            return Err(MandatumError::EmptyCommand { command });
        };
        if keyword.contains_open() {
            return Err(MandatumError::OpenEndedKeyword { command });
        }

        let open_count = self
            .requirements
            .iter()
            .filter(|r| r.contains_open())
            .count();
        if open_count > 1 {
            return Err(MandatumError::DuplicateOpenEnded { command });
        }
        if self.requirements.iter().any(Requirement::has_nested_open) {
            return Err(MandatumError::NestedOpenEnded { command });
        }

        let slots = self.requirements.len();
        let arg_max = self.args.iter().filter_map(|a| match a {
            ArgTemplate::Slot(i) => Some(*i),
            ArgTemplate::Literal(_) => None,
        });
        let template_max = self.output.max_slot();
        if let Some(index) = arg_max.chain(template_max).max() {
            if index >= slots {
                return Err(MandatumError::SlotIndexOutOfRange {
                    command,
                    index,
                    slots,
                });
            }
        }
        Ok(())
    }
}

/// Immutable, validated, ordered command collection. Registration order is
/// match-precedence order.
pub struct CommandSet {
    commands: Vec<Command>,
}

impl std::fmt::Debug for CommandSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSet")
            .field(
                "commands",
                &self.commands.iter().map(|c| &c.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl CommandSet {
    /// Validate and seal the command list. Grammar errors are fatal here —
    /// never deferred to match time.
    pub fn new(commands: Vec<Command>) -> Result<Self> {
        for command in &commands {
            command.validate()?;
        }
        Ok(Self { commands })
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn get(&self, index: usize) -> Option<&Command> {
        self.commands.get(index)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Union of every command's keyword vocabulary plus `extra_words`
    /// (typically the wake words), deduplicated, registration order.
    pub fn keyword_union_vocabulary(&self, extra_words: &[String]) -> Vec<String> {
        let mut words: Vec<String> = extra_words.iter().map(|w| w.to_lowercase()).collect();
        for command in &self.commands {
            words.extend(command.keyword_vocabulary().iter().cloned());
        }
        dedup_preserving_order(words)
    }
}

fn dedup_preserving_order(words: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    words
        .into_iter()
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::tokenize;

    fn noop_action() -> ActionFn {
        Arc::new(|_values| Ok(String::new()))
    }

    fn command(name: &str, requirements: Vec<Requirement>) -> Command {
        Command::new(name, requirements, noop_action(), vec![], "")
    }

    #[test]
    fn keyword_vocabulary_is_first_requirement_only() {
        let cmd = command(
            "New Note",
            vec![
                Requirement::all(vec![
                    Requirement::any_word(&["create", "make", "new"]),
                    Requirement::any_word(&["note", "text", "entry"]),
                ]),
                Requirement::open_ended(),
            ],
        );
        assert_eq!(
            cmd.keyword_vocabulary(),
            &["create", "make", "new", "note", "text", "entry"]
        );
        assert!(cmd.has_open_slot());
    }

    #[test]
    fn number_slot_expands_full_vocabulary_with_number_words() {
        let cmd = command(
            "Set Timer",
            vec![Requirement::word("timer"), Requirement::number()],
        );
        assert!(cmd.full_vocabulary().iter().any(|w| w == "seventeen"));
        assert!(!cmd.keyword_vocabulary().iter().any(|w| w == "seventeen"));
    }

    #[test]
    fn evaluate_resolves_open_slot_to_remaining_text() {
        let cmd = command(
            "Weather",
            vec![Requirement::word("weather"), Requirement::open_ended()],
        );
        let values = cmd
            .evaluate(&tokenize("weather in boston tomorrow"))
            .expect("matched");
        assert_eq!(
            values,
            vec![
                SlotValue::Word("weather".into()),
                SlotValue::Word("in boston tomorrow".into()),
            ]
        );
    }

    #[test]
    fn evaluate_fails_when_any_requirement_unsatisfied() {
        let cmd = command(
            "Set Timer",
            vec![Requirement::word("timer"), Requirement::number()],
        );
        assert!(cmd.evaluate(&tokenize("timer please")).is_none());
        assert!(cmd.evaluate(&tokenize("timer for 15")).is_some());
    }

    #[test]
    fn keyword_satisfied_checks_only_the_first_requirement() {
        let cmd = command(
            "Set Timer",
            vec![Requirement::word("timer"), Requirement::number()],
        );
        assert!(cmd.keyword_satisfied(&tokenize("timer")));
        assert!(!cmd.keyword_satisfied(&tokenize("15 minutes")));
    }

    #[test]
    fn registration_rejects_open_ended_keyword() {
        let err = CommandSet::new(vec![command(
            "Bad",
            vec![Requirement::open_ended(), Requirement::word("go")],
        )])
        .unwrap_err();
        assert!(matches!(err, MandatumError::OpenEndedKeyword { .. }));
    }

    #[test]
    fn registration_rejects_two_open_ended_requirements() {
        let err = CommandSet::new(vec![command(
            "Bad",
            vec![
                Requirement::word("dictate"),
                Requirement::open_ended(),
                Requirement::open_ended(),
            ],
        )])
        .unwrap_err();
        assert!(matches!(err, MandatumError::DuplicateOpenEnded { .. }));
    }

    #[test]
    fn registration_rejects_nested_open_ended() {
        let err = CommandSet::new(vec![command(
            "Bad",
            vec![
                Requirement::word("say"),
                Requirement::all(vec![Requirement::word("loudly"), Requirement::open_ended()]),
            ],
        )])
        .unwrap_err();
        assert!(matches!(err, MandatumError::NestedOpenEnded { .. }));
    }

    #[test]
    fn registration_rejects_out_of_range_slot_index() {
        let cmd = Command::new(
            "Bad",
            vec![Requirement::word("time")],
            noop_action(),
            vec![ArgTemplate::Slot(3)],
            "",
        );
        let err = CommandSet::new(vec![cmd]).unwrap_err();
        assert!(matches!(
            err,
            MandatumError::SlotIndexOutOfRange { index: 3, slots: 1, .. }
        ));
    }

    #[test]
    fn registration_rejects_empty_requirement_list() {
        let err = CommandSet::new(vec![command("Bad", vec![])]).unwrap_err();
        assert!(matches!(err, MandatumError::EmptyCommand { .. }));
    }

    #[test]
    fn output_template_parses_func_and_slot_markers() {
        let tpl = OutputTemplate::parse("the current time is [FUNC]");
        assert_eq!(
            tpl.render(&[], "4:15 PM"),
            "the current time is 4:15 PM"
        );

        let tpl = OutputTemplate::parse("timer set for [1] minutes");
        assert_eq!(
            tpl.render(&[SlotValue::Word("timer".into()), SlotValue::Int(15)], ""),
            "timer set for 15 minutes"
        );
    }

    #[test]
    fn output_template_keeps_unknown_brackets_literal() {
        let tpl = OutputTemplate::parse("result [ok] is [FUNC]");
        assert_eq!(tpl.render(&[], "fine"), "result [ok] is fine");
    }

    #[test]
    fn keyword_union_merges_wake_words_and_dedups() {
        let set = CommandSet::new(vec![
            command("A", vec![Requirement::any_word(&["time", "clock"])]),
            command("B", vec![Requirement::any_word(&["date", "time"])]),
        ])
        .unwrap();
        let union = set.keyword_union_vocabulary(&["computer".into()]);
        assert_eq!(union, ["computer", "time", "clock", "date"]);
    }
}
