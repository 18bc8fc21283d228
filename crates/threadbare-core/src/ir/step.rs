use serde::{Deserialize, Serialize};

use super::expr::Expression;
use super::node::Label;
use super::tag::Tag;

/// One unit of compiled node behavior, in emission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Step {
    /// Display a line, then suspend until the runner resumes at `resume`.
    Line(LineStep),
    Command(Command),
    Set {
        variable: String,
        operation: String,
        expression: String,
    },
    /// Fall through when `condition` holds, otherwise continue at `skip`.
    If {
        condition: String,
        skip: Label,
    },
    GoTo {
        target: Label,
    },
    Label(Label),
    /// Tail transfer to another node. `safe` is used by group wrappers.
    Jump {
        target: String,
        safe: bool,
    },
    /// Call-like transfer; the current node resumes at `resume` when the
    /// callee ends.
    Detour {
        target: String,
        resume: Label,
    },
    Option(OptionStep),
    StartOptions,
    /// Hand the option list to the player. Resumes at the chosen option's
    /// target label.
    SendOptions,
    /// Let the runner pick among eligible options; resumes at `fallback`
    /// when none is eligible.
    SendLineGroup {
        fallback: Label,
    },
    OnceIsSeen {
        key: String,
    },
    FinishNode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineStep {
    pub line_id: String,
    pub content: Vec<Expression>,
    pub tags: Vec<Tag>,
    pub condition: Option<String>,
    /// Once key when the line carries `<<once>>`.
    pub once: Option<String>,
    pub resume: Label,
}

impl LineStep {
    pub fn has_markup(&self) -> bool {
        self.content.iter().any(|e| matches!(e, Expression::Markup(_)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Stop,
    Wait { duration: String, resume: Label },
    /// Generic command dispatched to the user-function table.
    Call { name: String, args: Vec<String> },
    /// Already-lowered call expression from `<<call ...>>`.
    Expression(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionStep {
    pub index: usize,
    pub line_id: String,
    /// Label the runner resumes at when this option is chosen.
    pub target: Label,
    pub content: Vec<Expression>,
    pub tags: Vec<Tag>,
    pub conditions: Vec<String>,
    pub once: Option<String>,
    /// Weight for line-group picks: 1 per guard expression plus its boolean
    /// connectives, and 1 for a once qualifier. A bare `<<once>>` item
    /// weighs 1, not 0.
    pub complexity: usize,
    /// Line-group item or node-group member rather than a player choice.
    pub line_group: bool,
}

impl OptionStep {
    pub fn condition_count(&self) -> usize {
        self.conditions.len() + usize::from(self.once.is_some())
    }

    pub fn has_markup(&self) -> bool {
        !self.tags.is_empty() || self.content.iter().any(|e| matches!(e, Expression::Markup(_)))
    }
}

impl Step {
    /// The label whose `case` this step opens, if any.
    pub fn case_label(&self) -> Option<&Label> {
        match self {
            Step::Line(line) => Some(&line.resume),
            Step::Command(Command::Wait { resume, .. }) => Some(resume),
            Step::Detour { resume, .. } => Some(resume),
            Step::Label(label) => Some(label),
            _ => None,
        }
    }
}
