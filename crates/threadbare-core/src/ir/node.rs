use std::fmt;

use serde::{Deserialize, Serialize};

use super::step::Step;
use super::tag::Tag;

/// A resume point inside a node function.
///
/// Ids start at 1; 0 is the implicit `nodestart` entry case. The name is the
/// enumerator emitted into the node's `NodeLabel` enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label {
    pub id: u32,
    pub name: String,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Node-group membership recorded from `when:` headers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupMembership {
    /// Lowered guard expressions, AND-ed at runtime.
    pub conditions: Vec<String>,
    pub complexity: usize,
    /// `when: once` members are eligible only until first visited.
    pub once: bool,
}

/// One compiled dialogue unit, emitted as one resumable function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Title as written in the source; the group key for group members.
    pub title: String,
    /// Unique compile name, mangled for group members.
    pub name: String,
    pub filename: String,
    pub offset: usize,
    pub steps: Vec<Step>,
    pub tags: Vec<Tag>,
    pub group: Option<GroupMembership>,
    pub visited: bool,
    pub visit_counted: bool,
    labels: Vec<Label>,
    next_label: u32,
    once_count: usize,
}

impl Node {
    pub fn new(title: &str, name: &str, filename: &str, offset: usize) -> Self {
        Self {
            title: title.to_string(),
            name: name.to_string(),
            filename: filename.to_string(),
            offset,
            steps: Vec::new(),
            tags: Vec::new(),
            group: None,
            visited: false,
            visit_counted: false,
            labels: Vec::new(),
            next_label: 1,
            once_count: 0,
        }
    }

    /// Allocate the next resume label. `hint` is appended to the name for
    /// readability of the generated code.
    pub fn register_label(&mut self, hint: &str) -> Label {
        let id = self.next_label;
        self.next_label += 1;
        let label = Label {
            id,
            name: format!("L{id}{hint}"),
        };
        self.labels.push(label.clone());
        label
    }

    /// Labels in allocation order.
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Next per-node once key, e.g. `Start_once_0`.
    pub fn next_once_key(&mut self) -> String {
        let key = format!("{}_once_{}", self.name, self.once_count);
        self.once_count += 1;
        key
    }

    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn is_group_member(&self) -> bool {
        self.group.is_some()
    }

    pub fn has_lines(&self) -> bool {
        self.steps.iter().any(|s| matches!(s, Step::Line(_)))
    }

    pub fn has_line_markup(&self) -> bool {
        self.steps.iter().any(|s| match s {
            Step::Line(line) => line.has_markup(),
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_increase_from_one() {
        let mut node = Node::new("Start", "Start", "a.yarn", 0);
        let a = node.register_label("");
        let b = node.register_label("group_end");
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(b.name, "L2group_end");
        assert_eq!(node.labels().len(), 2);
    }

    #[test]
    fn once_keys_are_per_node() {
        let mut node = Node::new("Start", "Start", "a.yarn", 0);
        assert_eq!(node.next_once_key(), "Start_once_0");
        assert_eq!(node.next_once_key(), "Start_once_1");
    }
}
