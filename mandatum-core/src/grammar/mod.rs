//! Command grammar: the declarative requirement tree a phrase stream must
//! satisfy, and its evaluation against a token pool.
//!
//! ## Evaluation policy
//!
//! - `Word(w)` — satisfied iff `w` is present; consumes that one occurrence.
//! - `Number` — satisfied iff any numeric token is present; consumes the
//!   first (left-to-right).
//! - `OpenEnded` — always satisfied with the `Open` sentinel; resolved to the
//!   remaining token span at command level, after every sibling has consumed
//!   its tokens.
//! - `Any(children)` — first satisfied child wins, declaration order.
//! - `All(children)` — every child must be satisfied; value is the list of
//!   child values in declaration order. A failed child rolls the pool back.
//! - An override value replaces the computed value; token consumption is
//!   unchanged.
//!
//! Command-level evaluation is greedy left-to-right: tokens consumed by an
//! earlier requirement are gone before the next one runs. Requirement order
//! is therefore significant — it decides which tokens an `OpenEnded` or an
//! ambiguous combinator child claims.

pub mod command;
pub mod tokenize;

pub use command::{ActionFn, ArgTemplate, Command, CommandSet, OutputTemplate};
pub use tokenize::{tokenize, MISS_PLACEHOLDER};

use std::fmt;

/// A typed input token produced by [`tokenize`].
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Word(String),
    Int(i64),
    Float(f64),
}

impl Token {
    pub fn as_word(&self) -> Option<&str> {
        match self {
            Token::Word(w) => Some(w),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Token::Int(_) | Token::Float(_))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(w) => f.write_str(w),
            Token::Int(n) => write!(f, "{n}"),
            Token::Float(x) => write!(f, "{x}"),
        }
    }
}

/// A resolved requirement value, handed to the dispatcher for argument and
/// output-template substitution.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotValue {
    Word(String),
    Int(i64),
    Float(f64),
    List(Vec<SlotValue>),
    /// Sentinel for an open-ended slot awaiting remainder resolution.
    Open,
}

impl fmt::Display for SlotValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotValue::Word(w) => f.write_str(w),
            SlotValue::Int(n) => write!(f, "{n}"),
            SlotValue::Float(x) => write!(f, "{x}"),
            SlotValue::List(items) => {
                let mut first = true;
                for item in items {
                    if !first {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                    first = false;
                }
                Ok(())
            }
            SlotValue::Open => Ok(()),
        }
    }
}

/// One node of a command's requirement tree.
#[derive(Debug, Clone)]
pub struct Requirement {
    pub kind: ReqKind,
    /// Replaces the computed value when this node is satisfied, so
    /// syntactically varied inputs map to one canonical symbol.
    pub override_value: Option<SlotValue>,
}

#[derive(Debug, Clone)]
pub enum ReqKind {
    Word(String),
    Number,
    OpenEnded,
    Any(Vec<Requirement>),
    All(Vec<Requirement>),
}

impl Requirement {
    pub fn word(literal: impl Into<String>) -> Self {
        Self {
            kind: ReqKind::Word(literal.into().to_lowercase()),
            override_value: None,
        }
    }

    pub fn number() -> Self {
        Self {
            kind: ReqKind::Number,
            override_value: None,
        }
    }

    pub fn open_ended() -> Self {
        Self {
            kind: ReqKind::OpenEnded,
            override_value: None,
        }
    }

    pub fn any(children: Vec<Requirement>) -> Self {
        Self {
            kind: ReqKind::Any(children),
            override_value: None,
        }
    }

    pub fn all(children: Vec<Requirement>) -> Self {
        Self {
            kind: ReqKind::All(children),
            override_value: None,
        }
    }

    /// A synonym group: any of `literals`, reported as the canonical first one.
    pub fn any_word(literals: &[&str]) -> Self {
        let canonical = literals.first().map(|w| w.to_lowercase());
        let mut req = Self::any(literals.iter().map(|w| Self::word(*w)).collect());
        if let Some(c) = canonical {
            req.override_value = Some(SlotValue::Word(c));
        }
        req
    }

    pub fn with_override(mut self, value: SlotValue) -> Self {
        self.override_value = Some(value);
        self
    }

    /// Does this subtree contain an open-ended node?
    pub fn contains_open(&self) -> bool {
        match &self.kind {
            ReqKind::OpenEnded => true,
            ReqKind::Any(children) | ReqKind::All(children) => {
                children.iter().any(Requirement::contains_open)
            }
            _ => false,
        }
    }

    /// Is an open-ended node nested below a combinator in this subtree?
    pub(crate) fn has_nested_open(&self) -> bool {
        match &self.kind {
            ReqKind::Any(children) | ReqKind::All(children) => {
                children.iter().any(Requirement::contains_open)
            }
            _ => false,
        }
    }

    /// Does this subtree contain a `Number` slot?
    pub fn contains_number(&self) -> bool {
        match &self.kind {
            ReqKind::Number => true,
            ReqKind::Any(children) | ReqKind::All(children) => {
                children.iter().any(Requirement::contains_number)
            }
            _ => false,
        }
    }

    /// Collect every literal word in this subtree, declaration order.
    pub fn collect_literals(&self, out: &mut Vec<String>) {
        match &self.kind {
            ReqKind::Word(w) => out.push(w.clone()),
            ReqKind::Any(children) | ReqKind::All(children) => {
                for child in children {
                    child.collect_literals(out);
                }
            }
            ReqKind::Number | ReqKind::OpenEnded => {}
        }
    }
}

/// A consume-tracking view over the tokenized input of one cycle.
#[derive(Debug, Clone)]
pub struct TokenPool {
    tokens: Vec<Token>,
    consumed: Vec<bool>,
}

impl TokenPool {
    pub fn new(tokens: Vec<Token>) -> Self {
        let consumed = vec![false; tokens.len()];
        Self { tokens, consumed }
    }

    fn consume_word(&mut self, literal: &str) -> bool {
        for (i, token) in self.tokens.iter().enumerate() {
            if !self.consumed[i] && token.as_word() == Some(literal) {
                self.consumed[i] = true;
                return true;
            }
        }
        false
    }

    fn consume_first_number(&mut self) -> Option<SlotValue> {
        for (i, token) in self.tokens.iter().enumerate() {
            if self.consumed[i] {
                continue;
            }
            match token {
                Token::Int(n) => {
                    self.consumed[i] = true;
                    return Some(SlotValue::Int(*n));
                }
                Token::Float(x) => {
                    self.consumed[i] = true;
                    return Some(SlotValue::Float(*x));
                }
                Token::Word(_) => {}
            }
        }
        None
    }

    fn snapshot(&self) -> Vec<bool> {
        self.consumed.clone()
    }

    fn restore(&mut self, snapshot: Vec<bool>) {
        self.consumed = snapshot;
    }

    /// Remaining unconsumed tokens, order preserved, joined with single
    /// spaces. Miss placeholders are dropped — they mark timeline position,
    /// not content.
    pub fn remaining_text(&self) -> String {
        let mut out = String::new();
        for (i, token) in self.tokens.iter().enumerate() {
            if self.consumed[i] {
                continue;
            }
            if token.as_word() == Some(MISS_PLACEHOLDER) {
                continue;
            }
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&token.to_string());
        }
        out
    }

    #[cfg(test)]
    fn remaining_tokens(&self) -> Vec<&Token> {
        self.tokens
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.consumed[*i])
            .map(|(_, t)| t)
            .collect()
    }
}

/// Evaluate one requirement against the pool. `None` = not satisfied; the
/// pool is left unchanged on failure.
pub fn evaluate(req: &Requirement, pool: &mut TokenPool) -> Option<SlotValue> {
    let computed = match &req.kind {
        ReqKind::Word(literal) => pool
            .consume_word(literal)
            .then(|| SlotValue::Word(literal.clone())),
        ReqKind::Number => pool.consume_first_number(),
        ReqKind::OpenEnded => Some(SlotValue::Open),
        ReqKind::Any(children) => {
            let mut value = None;
            for child in children {
                let snapshot = pool.snapshot();
                if let Some(v) = evaluate(child, pool) {
                    value = Some(v);
                    break;
                }
                pool.restore(snapshot);
            }
            value
        }
        ReqKind::All(children) => {
            let snapshot = pool.snapshot();
            let mut values = Vec::with_capacity(children.len());
            let mut satisfied = true;
            for child in children {
                match evaluate(child, pool) {
                    Some(v) => values.push(v),
                    None => {
                        satisfied = false;
                        break;
                    }
                }
            }
            if satisfied {
                Some(SlotValue::List(values))
            } else {
                pool.restore(snapshot);
                None
            }
        }
    };

    match (computed, &req.override_value) {
        (Some(_), Some(replacement)) => Some(replacement.clone()),
        (computed, _) => computed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(text: &str) -> TokenPool {
        TokenPool::new(tokenize(text))
    }

    #[test]
    fn word_consumes_one_occurrence() {
        let mut p = pool("make a note note");
        let req = Requirement::word("note");
        assert_eq!(evaluate(&req, &mut p), Some(SlotValue::Word("note".into())));
        // Second occurrence still available.
        assert_eq!(evaluate(&req, &mut p), Some(SlotValue::Word("note".into())));
        assert_eq!(evaluate(&req, &mut p), None);
    }

    #[test]
    fn number_takes_first_numeric_token() {
        let mut p = pool("set timer 15 then 30");
        assert_eq!(
            evaluate(&Requirement::number(), &mut p),
            Some(SlotValue::Int(15))
        );
        assert_eq!(
            evaluate(&Requirement::number(), &mut p),
            Some(SlotValue::Int(30))
        );
        assert_eq!(evaluate(&Requirement::number(), &mut p), None);
    }

    #[test]
    fn all_consumes_in_any_input_order() {
        // Both literals present, in a different order than declared.
        let mut p = pool("please create a note");
        let req = Requirement::all(vec![Requirement::word("note"), Requirement::word("create")]);
        let value = evaluate(&req, &mut p).expect("satisfied");
        assert_eq!(
            value,
            SlotValue::List(vec![
                SlotValue::Word("note".into()),
                SlotValue::Word("create".into()),
            ])
        );
        // Both matched tokens consumed; filler remains for an open slot.
        assert_eq!(p.remaining_text(), "please a");
    }

    #[test]
    fn failed_all_rolls_the_pool_back() {
        let mut p = pool("create something");
        let req = Requirement::all(vec![Requirement::word("create"), Requirement::word("note")]);
        assert_eq!(evaluate(&req, &mut p), None);
        // "create" must not stay consumed after the failed composite.
        assert_eq!(p.remaining_tokens().len(), 2);
        assert!(evaluate(&Requirement::word("create"), &mut p).is_some());
    }

    #[test]
    fn any_takes_first_satisfied_child_in_declaration_order() {
        let mut p = pool("halt everything");
        let req = Requirement::any(vec![Requirement::word("stop"), Requirement::word("halt")]);
        assert_eq!(evaluate(&req, &mut p), Some(SlotValue::Word("halt".into())));

        let mut p2 = pool("stop and halt");
        let req2 = Requirement::any(vec![Requirement::word("stop"), Requirement::word("halt")]);
        // "stop" wins by declaration order; "halt" stays unconsumed.
        assert_eq!(evaluate(&req2, &mut p2), Some(SlotValue::Word("stop".into())));
        assert!(p2.remaining_text().contains("halt"));
    }

    #[test]
    fn any_matches_neither_word_fails() {
        let mut p = pool("keep going");
        let req = Requirement::any(vec![Requirement::word("stop"), Requirement::word("halt")]);
        assert_eq!(evaluate(&req, &mut p), None);
    }

    #[test]
    fn override_replaces_value_but_not_consumption() {
        let mut p = pool("terminate the app");
        let req = Requirement::any_word(&["exit", "terminate", "stop"]);
        assert_eq!(evaluate(&req, &mut p), Some(SlotValue::Word("exit".into())));
        // The matched token itself is consumed even though the value was
        // replaced by the canonical synonym.
        assert!(!p.remaining_text().contains("terminate"));
    }

    #[test]
    fn open_ended_is_always_satisfied_with_sentinel() {
        let mut p = pool("");
        assert_eq!(
            evaluate(&Requirement::open_ended(), &mut p),
            Some(SlotValue::Open)
        );
    }

    #[test]
    fn remaining_text_skips_miss_placeholders() {
        let mut p = pool("weather _ in boston _ tomorrow");
        assert!(evaluate(&Requirement::word("weather"), &mut p).is_some());
        assert_eq!(p.remaining_text(), "in boston tomorrow");
    }

    #[test]
    fn remaining_text_renders_numeric_tokens() {
        let p = pool("twenty one items");
        assert_eq!(p.remaining_text(), "21 items");
    }
}
