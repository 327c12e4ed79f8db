//! Numeric values for the symbolic ids left in precompiled text.

use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use super::directive::Directive;
use super::expression::parse_integer_literal;
use super::resource::{ControlIdentity, Resource};

/// A dialog with the controls whose ids resolved to a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DialogSymbols {
    pub id: String,
    pub controls: Vec<ResolvedControl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedControl {
    pub name: String,
    pub value: i32,
    pub control: ControlIdentity,
}

/// Collect `#define NAME <integer literal>` values.
///
/// Conditional compilation is not evaluated, so a name defined twice with different
/// values is ambiguous and left out. Defines whose value is not a plain integer literal
/// are ignored.
pub fn integer_defines<'a, I>(directives: I) -> BTreeMap<String, i32>
where
    I: IntoIterator<Item = &'a Directive>,
{
    let mut values: BTreeMap<String, Option<i32>> = BTreeMap::new();
    for directive in directives {
        let Directive::Define { name, value } = directive else {
            continue;
        };
        let Some(number) = parse_integer_literal(value) else {
            continue;
        };
        match values.entry(name.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(Some(number));
            }
            Entry::Occupied(mut slot) => {
                if *slot.get() != Some(number) {
                    slot.insert(None);
                }
            }
        }
    }
    values
        .into_iter()
        .filter_map(|(name, value)| value.map(|value| (name, value)))
        .collect()
}

/// Pair each dialog's control ids with their values from `defines`. Controls with
/// unresolved ids are skipped; order and duplicates are kept.
pub fn resolve_dialogs(resources: &[Resource], defines: &BTreeMap<String, i32>) -> Vec<DialogSymbols> {
    resources
        .iter()
        .filter_map(|resource| match resource {
            Resource::Dialog { id, controls, .. } => Some(DialogSymbols {
                id: id.clone(),
                controls: controls
                    .iter()
                    .filter_map(|control| {
                        defines.get(control.id()).map(|value| ResolvedControl {
                            name: control.id().to_string(),
                            value: *value,
                            control: control.clone(),
                        })
                    })
                    .collect(),
            }),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rc::directive::parse_directives;
    use crate::rc::resource::{parse_resources, ControlKind};

    #[test]
    fn keeps_unambiguous_integer_defines() {
        let directives = parse_directives(
            "#define IDD_MAIN 100\n\
             #define IDC_OK 0x10L\n\
             #define IDC_TWICE 5\n\
             #define IDC_TWICE 5\n\
             #define IDC_CLASH 1\n\
             #define IDC_CLASH 2\n\
             #define IDC_EXPR (WM_USER + 1)\n\
             #define IDC_COMMENTED 7 // seven\n",
        )
        .unwrap();

        let defines = integer_defines(&directives);

        let expected: BTreeMap<String, i32> = [
            ("IDC_COMMENTED", 7),
            ("IDC_OK", 16),
            ("IDC_TWICE", 5),
            ("IDD_MAIN", 100),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();
        assert_eq!(defines, expected);
    }

    #[test]
    fn resolves_dialog_controls() {
        let resources = parse_resources(
            "IDD_MAIN DIALOGEX 0, 0, 100, 50\n\
             BEGIN\n\
             \x20 PUSHBUTTON \"OK\", IDC_OK, 1, 1, 10, 10\n\
             \x20 LTEXT \"x\", IDC_STATIC, 1, 1, 10, 10\n\
             \x20 CONTROL \"\", IDC_LIST, \"SysListView32\", 0, 1, 1, 10, 10\n\
             END\n\
             IDS_HELLO ICON \"a.ico\"\n",
        )
        .unwrap();
        let defines: BTreeMap<String, i32> = [("IDC_OK".to_string(), 1), ("IDC_LIST".to_string(), 1001)]
            .into_iter()
            .collect();

        let dialogs = resolve_dialogs(&resources, &defines);

        assert_eq!(dialogs.len(), 1);
        assert_eq!(dialogs[0].id, "IDD_MAIN");
        let resolved: Vec<(&str, i32)> = dialogs[0]
            .controls
            .iter()
            .map(|c| (c.name.as_str(), c.value))
            .collect();
        assert_eq!(resolved, vec![("IDC_OK", 1), ("IDC_LIST", 1001)]);
        assert_eq!(
            dialogs[0].controls[0].control,
            ControlIdentity::Typed {
                kind: ControlKind::PushButton,
                id: "IDC_OK".to_string()
            }
        );
    }
}
