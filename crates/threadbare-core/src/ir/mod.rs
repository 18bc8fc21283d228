pub mod enums;
pub mod expr;
pub mod node;
pub mod printer;
pub mod step;
pub mod tag;

pub use enums::{EnumCase, EnumDecl, EnumKind};
pub use expr::{
    Expression, Markup, MarkupParam, MarkupValue, Plural, PluralCase, PluralKind, PluralPiece,
    Select,
};
pub use node::{GroupMembership, Label, Node};
pub use step::{Command, LineStep, OptionStep, Step};
pub use tag::{Tag, TagLocation};
