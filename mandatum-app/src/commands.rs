//! The startup command table — an ordered, declarative grammar handed to the
//! engine once and immutable afterwards. Registration order is match
//! precedence.
//!
//! Synonym groups mirror the spoken lexicon ("create/make/new",
//! "note/text/entry/page", …) as `Any` combinators with canonical override
//! values, so varied phrasings resolve to one symbol downstream.

use tokio::sync::mpsc::UnboundedSender;

use mandatum_core::{ArgTemplate, Command, Requirement};

use crate::actions::BuiltinAction;

pub fn command_table(shutdown_tx: &UnboundedSender<()>) -> Vec<Command> {
    vec![
        Command::new(
            "Shutdown",
            vec![Requirement::all(vec![
                Requirement::any_word(&["exit", "shutdown", "terminate", "stop", "goodbye"]),
                Requirement::any_word(&["app", "application", "system", "computer"]),
            ])],
            BuiltinAction::Shutdown.resolve(shutdown_tx),
            vec![],
            "shutting down",
        ),
        Command::new(
            "Get Time",
            vec![Requirement::word("time")],
            BuiltinAction::CurrentTime.resolve(shutdown_tx),
            vec![],
            "the current time is [FUNC]",
        ),
        Command::new(
            "Get Date",
            vec![Requirement::word("date")],
            BuiltinAction::CurrentDate.resolve(shutdown_tx),
            vec![],
            "today's date is [FUNC]",
        ),
        Command::new(
            "Set Timer",
            vec![Requirement::word("timer"), Requirement::number()],
            BuiltinAction::StartTimer.resolve(shutdown_tx),
            vec![ArgTemplate::Slot(1)],
            "timer set for [1] minutes",
        ),
        Command::new(
            "New Note",
            vec![
                Requirement::all(vec![
                    Requirement::any_word(&["create", "make", "new", "take"]),
                    Requirement::any_word(&["note", "text", "entry", "page"]),
                ]),
                Requirement::open_ended(),
            ],
            BuiltinAction::EchoNote.resolve(shutdown_tx),
            vec![ArgTemplate::Slot(1)],
            "noted: [FUNC]",
        ),
    ]
}
