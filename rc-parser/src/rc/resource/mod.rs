//! Resource statement grammar.
//!
//! [`parse_resources`] turns a preprocessed resource script into an ordered list of
//! [`Resource`] records. Statements are tried in a fixed order at each position; input
//! that none of them accepts fails the whole parse.

mod dialog;
mod menu;
mod tables;
mod version;

use chumsky::prelude::*;
use serde::Serialize;

use super::error::GrammarError;
use super::expression::{expression, Expression};
use super::syntax::{finish, keyword, noise, token, ParserError};

pub(crate) type ExprParser = BoxedParser<'static, char, Expression, ParserError>;

/// One top-level resource record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Resource {
    FileResource {
        kind: FileResourceKind,
        id: String,
        filename: String,
    },
    Dialog {
        id: String,
        controls: Vec<ControlIdentity>,
        menu: Option<String>,
    },
    Accelerators {
        id: String,
        entries: Vec<Accelerator>,
    },
    StringResource {
        id: String,
        text: String,
    },
    Toolbar {
        id: String,
        buttons: Vec<String>,
    },
    TextInclude {
        id: Expression,
        lines: Vec<String>,
    },
    Language {
        language: Expression,
        sublanguage: Expression,
    },
    Menu {
        id: String,
        items: Vec<MenuItem>,
    },
    /// Fixed-info fields and string blocks are validated, not retained.
    VersionInfo {
        id: String,
    },
    AfxDialogLayout {
        id: String,
        values: Vec<i32>,
    },
    /// Body is validated, not retained.
    DlgInit {
        id: String,
    },
}

impl Resource {
    /// The resource identifier, for records that have a textual one.
    pub fn id(&self) -> Option<&str> {
        match self {
            Resource::FileResource { id, .. }
            | Resource::Dialog { id, .. }
            | Resource::Accelerators { id, .. }
            | Resource::StringResource { id, .. }
            | Resource::Toolbar { id, .. }
            | Resource::Menu { id, .. }
            | Resource::VersionInfo { id }
            | Resource::AfxDialogLayout { id, .. }
            | Resource::DlgInit { id } => Some(id),
            Resource::TextInclude { .. } | Resource::Language { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Accelerator {
    pub event: Expression,
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileResourceKind {
    Bitmap,
    Cursor,
    Font,
    Html,
    Icon,
    MessageTable,
    Config,
}

impl FileResourceKind {
    pub const ALL: [FileResourceKind; 7] = [
        FileResourceKind::Bitmap,
        FileResourceKind::Cursor,
        FileResourceKind::Font,
        FileResourceKind::Html,
        FileResourceKind::Icon,
        FileResourceKind::MessageTable,
        FileResourceKind::Config,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            FileResourceKind::Bitmap => "BITMAP",
            FileResourceKind::Cursor => "CURSOR",
            FileResourceKind::Font => "FONT",
            FileResourceKind::Html => "HTML",
            FileResourceKind::Icon => "ICON",
            FileResourceKind::MessageTable => "MESSAGETABLE",
            FileResourceKind::Config => "CONFIG",
        }
    }
}

/// How a dialog control is declared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum ControlIdentity {
    /// One of the dedicated control statements (`LTEXT`, `EDITTEXT`, ...).
    Typed { kind: ControlKind, id: String },
    /// The generic `CONTROL` statement.
    Named { class_name: String, id: String },
}

impl ControlIdentity {
    pub fn id(&self) -> &str {
        match self {
            ControlIdentity::Typed { id, .. } | ControlIdentity::Named { id, .. } => id,
        }
    }
}

/// The dedicated control statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ControlKind {
    Auto3State,
    AutoCheckBox,
    AutoRadioButton,
    CheckBox,
    ComboBox,
    CText,
    DefPushButton,
    EditText,
    GroupBox,
    Icon,
    ListBox,
    LText,
    PushBox,
    PushButton,
    RadioButton,
    RText,
    ScrollBar,
    State3,
}

impl ControlKind {
    pub const ALL: [ControlKind; 18] = [
        ControlKind::Auto3State,
        ControlKind::AutoCheckBox,
        ControlKind::AutoRadioButton,
        ControlKind::CheckBox,
        ControlKind::ComboBox,
        ControlKind::CText,
        ControlKind::DefPushButton,
        ControlKind::EditText,
        ControlKind::GroupBox,
        ControlKind::Icon,
        ControlKind::ListBox,
        ControlKind::LText,
        ControlKind::PushBox,
        ControlKind::PushButton,
        ControlKind::RadioButton,
        ControlKind::RText,
        ControlKind::ScrollBar,
        ControlKind::State3,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            ControlKind::Auto3State => "AUTO3STATE",
            ControlKind::AutoCheckBox => "AUTOCHECKBOX",
            ControlKind::AutoRadioButton => "AUTORADIOBUTTON",
            ControlKind::CheckBox => "CHECKBOX",
            ControlKind::ComboBox => "COMBOBOX",
            ControlKind::CText => "CTEXT",
            ControlKind::DefPushButton => "DEFPUSHBUTTON",
            ControlKind::EditText => "EDITTEXT",
            ControlKind::GroupBox => "GROUPBOX",
            ControlKind::Icon => "ICON",
            ControlKind::ListBox => "LISTBOX",
            ControlKind::LText => "LTEXT",
            ControlKind::PushBox => "PUSHBOX",
            ControlKind::PushButton => "PUSHBUTTON",
            ControlKind::RadioButton => "RADIOBUTTON",
            ControlKind::RText => "RTEXT",
            ControlKind::ScrollBar => "SCROLLBAR",
            ControlKind::State3 => "STATE3",
        }
    }

    /// Whether the statement starts with a caption (`LTEXT "text", id, ...`).
    pub fn requires_caption(&self) -> bool {
        !matches!(
            self,
            ControlKind::EditText | ControlKind::ListBox | ControlKind::ScrollBar | ControlKind::ComboBox
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "item", rename_all = "snake_case")]
pub enum MenuItem {
    Popup {
        caption: String,
        children: Vec<MenuItem>,
    },
    Leaf {
        id: Expression,
        caption: String,
    },
    Separator,
}

/// Parse a resource script into its records.
pub fn parse_resources(text: &str) -> Result<Vec<Resource>, GrammarError> {
    document()
        .parse(text)
        .map_err(|errors| GrammarError::from_simple("resource", text, errors))
}

fn document() -> impl Parser<char, Vec<Resource>, Error = ParserError> + Clone {
    let expr: ExprParser = expression().boxed();

    let single = choice((
        dialog::dialog("DIALOGEX", 4, expr.clone()).boxed(),
        dialog::dialog("DIALOG", 3, expr.clone()).boxed(),
        tables::dlg_init().boxed(),
        tables::file_resource().boxed(),
        tables::accelerators(expr.clone()).boxed(),
        tables::toolbar(expr.clone()).boxed(),
        tables::text_include().boxed(),
        tables::language(expr.clone()).boxed(),
        menu::menu(expr.clone()).boxed(),
        version::version_info(expr.clone()).boxed(),
        tables::afx_dialog_layout().boxed(),
    ))
    .map(|resource| vec![resource]);
    let statement = single.or(tables::string_table(expr));

    noise()
        .ignore_then(statement.repeated())
        .then_ignore(finish())
        .map(|groups| groups.into_iter().flatten().collect())
}

/// `BEGIN body END`, with `{ }` accepted as well.
pub(crate) fn block<P, O>(body: P) -> impl Parser<char, O, Error = ParserError> + Clone
where
    P: Parser<char, O, Error = ParserError> + Clone,
{
    body.delimited_by(
        keyword("BEGIN").or(token("{")),
        keyword("END").or(token("}")),
    )
}

/// Legacy 16-bit memory flags that may follow a resource type keyword.
pub(crate) fn memory_flags() -> impl Parser<char, (), Error = ParserError> + Clone {
    choice((
        keyword("DISCARDABLE"),
        keyword("PRELOAD"),
        keyword("LOADONCALL"),
        keyword("MOVEABLE"),
        keyword("FIXED"),
        keyword("PURE"),
        keyword("IMPURE"),
        keyword("SHARED"),
        keyword("NONSHARED"),
    ))
    .repeated()
    .ignored()
}

/// `LANGUAGE`, `CHARACTERISTICS` and `VERSION` clauses ahead of a resource body.
pub(crate) fn common_options(expr: ExprParser) -> impl Parser<char, (), Error = ParserError> + Clone {
    choice((
        keyword("LANGUAGE")
            .ignore_then(expr.clone())
            .then_ignore(token(","))
            .then_ignore(expr.clone())
            .ignored(),
        keyword("CHARACTERISTICS").ignore_then(expr.clone()).ignored(),
        keyword("VERSION").ignore_then(expr).ignored(),
    ))
    .repeated()
    .ignored()
}

/// `, expr` repeated any number of times.
pub(crate) fn trailing_flags(expr: ExprParser) -> impl Parser<char, (), Error = ParserError> + Clone {
    token(",").ignore_then(expr).repeated().ignored()
}
