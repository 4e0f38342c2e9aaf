//! Kptfile loading and in-place inventory patching
//!
//! The parsed document is only used for reading. Patching the inventory edits
//! the file text line by line inside the `inventory` block, so comments,
//! quoting and indentation everywhere else are written back byte for byte.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::path::Path;

use crate::error::{CoreError, Result};
use crate::package::InventoryIntent;

/// File name of the package descriptor
pub const KPTFILE_NAME: &str = "Kptfile";

const INVENTORY_KEY: &str = "inventory";
const NAMESPACE_KEY: &str = "namespace";
const NAME_KEY: &str = "name";
const INVENTORY_ID_KEY: &str = "inventoryID";
const DEFAULT_INDENT: usize = 2;

/// Typed view of the `inventory` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryMetadata {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(rename = "inventoryID", default, skip_serializing_if = "String::is_empty")]
    pub inventory_id: String,
}

impl From<&InventoryIntent> for InventoryMetadata {
    fn from(intent: &InventoryIntent) -> Self {
        Self {
            namespace: intent.namespace.clone(),
            name: intent.name.clone(),
            inventory_id: intent.id.clone(),
        }
    }
}

/// A Kptfile: its text as read and the parsed document
#[derive(Debug, Clone, PartialEq)]
pub struct Kptfile {
    content: String,
    doc: Mapping,
}

impl Kptfile {
    /// Parse a Kptfile from YAML text
    pub fn parse(content: &str) -> Result<Self> {
        match serde_yaml::from_str::<Value>(content)? {
            Value::Mapping(doc) => Ok(Self {
                content: content.to_string(),
                doc,
            }),
            Value::Null => Err(CoreError::InvalidDescriptor {
                message: "document is empty".to_string(),
            }),
            other => Err(CoreError::InvalidDescriptor {
                message: format!("expected a mapping at the top level, found {}", kind_of(&other)),
            }),
        }
    }

    /// Load a Kptfile from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CoreError::DescriptorNotFound {
                    path: path.display().to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        Self::parse(&content)
    }

    /// The inventory section, if the package has one
    ///
    /// Only a missing key or a null value mean the package has not been
    /// registered. An empty section is still a section.
    pub fn inventory(&self) -> Result<Option<InventoryMetadata>> {
        match self.doc.get(INVENTORY_KEY) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_yaml::from_value(value.clone())?)),
        }
    }

    /// Overwrite the inventory fields with the caller's intent
    ///
    /// Only the `namespace`, `name` and `inventoryID` lines whose value
    /// differs are replaced, inserted or removed (empty ID or name remove
    /// the key). Returns whether the file text changed.
    pub fn apply_intent(&mut self, intent: &InventoryIntent) -> Result<bool> {
        let current = self.inventory()?.unwrap_or_default();
        let wanted = InventoryMetadata::from(intent);
        if current == wanted && self.doc.contains_key(INVENTORY_KEY) {
            return Ok(false);
        }

        let patched = Self::parse(&patch_inventory(&self.content, &current, &wanted)?)?;
        if patched.inventory()?.as_ref() != Some(&wanted) {
            return Err(CoreError::InvalidDescriptor {
                message: "inventory section could not be patched in place".to_string(),
            });
        }
        let changed = patched.content != self.content;
        *self = patched;
        Ok(changed)
    }

    /// The Kptfile text, including any patch applied so far
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Write the Kptfile to `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, &self.content)?;
        Ok(())
    }

    /// Read-only access to a top-level field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.doc.get(key)
    }
}

/// Rewrite the lines of the inventory block that must change
fn patch_inventory(
    content: &str,
    current: &InventoryMetadata,
    wanted: &InventoryMetadata,
) -> Result<String> {
    let newline = if content.contains("\r\n") { "\r\n" } else { "\n" };
    let mut lines: Vec<String> = content.split_inclusive('\n').map(str::to_string).collect();

    let header = match lines.iter().position(|l| is_key_line(l, 0, INVENTORY_KEY)) {
        Some(header) => header,
        None => {
            let len = lines.len();
            terminate_last(&mut lines, len, newline);
            lines.push(format!("{}:{}", INVENTORY_KEY, newline));
            lines.len() - 1
        }
    };

    let inline = lines[header][INVENTORY_KEY.len() + 1..].trim();
    if !inline.is_empty() && !inline.starts_with('#') {
        if !matches!(inline, "{}" | "null" | "~") {
            return Err(CoreError::InvalidDescriptor {
                message: format!("cannot patch flow-style inventory section `{}`", inline),
            });
        }
        let ending = line_ending(&lines[header], newline);
        lines[header] = format!("{}:{}", INVENTORY_KEY, ending);
    }

    let end = block_end(&lines, header);
    let indent = lines[header + 1..end]
        .iter()
        .find(|l| is_content(l))
        .map(|l| indent_of(l))
        .unwrap_or_else(|| document_indent(&lines));

    let fields = [
        (NAMESPACE_KEY, &current.namespace, &wanted.namespace),
        (NAME_KEY, &current.name, &wanted.name),
        (INVENTORY_ID_KEY, &current.inventory_id, &wanted.inventory_id),
    ];
    for (key, old, new) in fields {
        if old == new {
            continue;
        }
        let start = header + 1;
        let end = block_end(&lines, header);
        match (start..end).find(|&i| is_key_line(&lines[i], indent, key)) {
            Some(at) => {
                let span_end = (at + 1..end)
                    .find(|&i| !is_continuation(&lines[i], indent))
                    .unwrap_or(end);
                let replacement = if new.is_empty() {
                    Vec::new()
                } else {
                    let ending = line_ending(&lines[span_end - 1], newline);
                    vec![format!("{}{}: {}{}", " ".repeat(indent), key, scalar(new)?, ending)]
                };
                lines.splice(at..span_end, replacement);
            }
            None if new.is_empty() => {}
            None => {
                let at = (start..end)
                    .rev()
                    .find(|&i| is_content(&lines[i]) && indent_of(&lines[i]) >= indent)
                    .map_or(start, |i| i + 1);
                terminate_last(&mut lines, at, newline);
                lines.insert(
                    at,
                    format!("{}{}: {}{}", " ".repeat(indent), key, scalar(new)?, newline),
                );
            }
        }
    }

    Ok(lines.concat())
}

/// `key:` at exactly `indent` columns, followed by a value, a comment or nothing
fn is_key_line(line: &str, indent: usize, key: &str) -> bool {
    indent_of(line) == indent
        && line[indent..]
            .strip_prefix(key)
            .and_then(|rest| rest.strip_prefix(':'))
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn is_content(line: &str) -> bool {
    !is_blank(line) && !line.trim_start().starts_with('#')
}

fn is_continuation(line: &str, indent: usize) -> bool {
    !is_blank(line) && indent_of(line) > indent
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

/// First line after `header` that starts a new top-level entry
fn block_end(lines: &[String], header: usize) -> usize {
    (header + 1..lines.len())
        .find(|&i| !is_blank(&lines[i]) && indent_of(&lines[i]) == 0)
        .unwrap_or(lines.len())
}

/// Indentation used by the rest of the document
fn document_indent(lines: &[String]) -> usize {
    lines
        .iter()
        .filter(|l| is_content(l))
        .map(|l| indent_of(l))
        .find(|&n| n > 0)
        .unwrap_or(DEFAULT_INDENT)
}

fn line_ending<'a>(line: &str, newline: &'a str) -> &'a str {
    if line.ends_with('\n') { newline } else { "" }
}

/// Make sure the line before `at` ends with a newline
fn terminate_last(lines: &mut [String], at: usize, newline: &str) {
    if let Some(prev) = at.checked_sub(1).and_then(|i| lines.get_mut(i)) {
        if !prev.ends_with('\n') {
            prev.push_str(newline);
        }
    }
}

/// Render a plain string as a single-line YAML scalar
fn scalar(value: &str) -> Result<String> {
    let rendered = serde_yaml::to_string(&Value::String(value.to_string()))?;
    let rendered = rendered.trim_end();
    if rendered.contains('\n') {
        return Err(CoreError::InvalidDescriptor {
            message: format!("inventory value {:?} does not fit on one line", value),
        });
    }
    Ok(rendered.to_string())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const REGISTERED: &str = r#"apiVersion: kpt.dev/v1
kind: Kptfile
metadata:
  name: app
  annotations:
    config.kubernetes.io/local-config: "true"
info:
  description: sample app
# pipeline owned by the platform team
pipeline:
  mutators:
    - image: gcr.io/kpt-fn/set-labels:v0.1
      configMap:
        app: web
inventory:
  namespace: old-ns # set by hand
  name: old-name
  inventoryID: old-id
  labels:
    team: web
"#;

    fn patched(content: &str, intent: &InventoryIntent) -> String {
        let mut kf = Kptfile::parse(content).unwrap();
        assert!(kf.apply_intent(intent).unwrap());
        kf.content().to_string()
    }

    #[test]
    fn test_parse_without_inventory() {
        let kf = Kptfile::parse("apiVersion: kpt.dev/v1\nkind: Kptfile\nmetadata:\n  name: app\n")
            .unwrap();
        assert!(kf.inventory().unwrap().is_none());
    }

    #[test]
    fn test_null_inventory_counts_as_missing() {
        let kf = Kptfile::parse("kind: Kptfile\ninventory:\n").unwrap();
        assert!(kf.inventory().unwrap().is_none());
    }

    #[test]
    fn test_empty_inventory_section_is_present() {
        let kf = Kptfile::parse("kind: Kptfile\ninventory: {}\n").unwrap();
        assert_eq!(kf.inventory().unwrap(), Some(InventoryMetadata::default()));

        let kf = Kptfile::parse("kind: Kptfile\ninventory:\n  name: \"\"\n").unwrap();
        assert_eq!(kf.inventory().unwrap(), Some(InventoryMetadata::default()));
    }

    #[test]
    fn test_parse_inventory() {
        let kf = Kptfile::parse(REGISTERED).unwrap();
        let inv = kf.inventory().unwrap().unwrap();
        assert_eq!(inv.namespace, "old-ns");
        assert_eq!(inv.name, "old-name");
        assert_eq!(inv.inventory_id, "old-id");
    }

    #[test]
    fn test_parse_rejects_non_mapping() {
        assert!(matches!(
            Kptfile::parse("- a\n- b\n"),
            Err(CoreError::InvalidDescriptor { .. })
        ));
        assert!(matches!(
            Kptfile::parse(""),
            Err(CoreError::InvalidDescriptor { .. })
        ));
        assert!(matches!(
            Kptfile::parse("inventory: [unclosed"),
            Err(CoreError::YamlParse(_))
        ));
    }

    #[test]
    fn test_patch_only_touches_inventory_lines() {
        let intent = InventoryIntent::new("custom-ns").with_id("abc").with_name("foo");

        let expected = REGISTERED
            .replace("  namespace: old-ns # set by hand\n", "  namespace: custom-ns\n")
            .replace("  name: old-name\n", "  name: foo\n")
            .replace("  inventoryID: old-id\n", "  inventoryID: abc\n");
        assert_eq!(patched(REGISTERED, &intent), expected);
    }

    #[test]
    fn test_patch_keeps_unchanged_lines() {
        let intent = InventoryIntent::new("old-ns").with_id("new-id").with_name("old-name");

        let expected = REGISTERED.replace("  inventoryID: old-id\n", "  inventoryID: new-id\n");
        assert_eq!(patched(REGISTERED, &intent), expected);
    }

    #[test]
    fn test_apply_intent_is_idempotent() {
        let mut kf = Kptfile::parse(REGISTERED).unwrap();
        let intent = InventoryIntent::new("custom-ns").with_id("abc").with_name("foo");

        assert!(kf.apply_intent(&intent).unwrap());
        let first = kf.content().to_string();
        assert!(!kf.apply_intent(&intent).unwrap());
        assert_eq!(kf.content(), first);
    }

    #[test]
    fn test_apply_intent_drops_empty_fields() {
        let out = patched(REGISTERED, &InventoryIntent::default());

        let expected = REGISTERED
            .replace("  namespace: old-ns # set by hand\n", "  namespace: default\n")
            .replace("  name: old-name\n", "")
            .replace("  inventoryID: old-id\n", "");
        assert_eq!(out, expected);
    }

    #[test]
    fn test_missing_fields_are_appended_to_the_section() {
        let content = "apiVersion: kpt.dev/v1\nkind: Kptfile\ninventory:\n    namespace: old-ns\n    labels:\n        team: web\n\n# trailing comment\nupstream:\n  type: git\n";

        let out = patched(content, &InventoryIntent::new("old-ns").with_name("foo"));

        assert_eq!(
            out,
            "apiVersion: kpt.dev/v1\nkind: Kptfile\ninventory:\n    namespace: old-ns\n    labels:\n        team: web\n    name: foo\n\n# trailing comment\nupstream:\n  type: git\n"
        );
    }

    #[test]
    fn test_empty_flow_section_becomes_a_block() {
        let content = "apiVersion: kpt.dev/v1\nkind: Kptfile\nmetadata:\n  name: app\ninventory: {}\n";

        let out = patched(content, &InventoryIntent::new("apps").with_id("abc"));

        assert_eq!(
            out,
            "apiVersion: kpt.dev/v1\nkind: Kptfile\nmetadata:\n  name: app\ninventory:\n  namespace: apps\n  inventoryID: abc\n"
        );
    }

    #[test]
    fn test_values_are_quoted_when_needed() {
        let content = "kind: Kptfile\ninventory:\n  namespace: old\n";

        let out = patched(content, &InventoryIntent::new("true").with_name("a: b"));

        let kf = Kptfile::parse(&out).unwrap();
        let inv = kf.inventory().unwrap().unwrap();
        assert_eq!(inv.namespace, "true");
        assert_eq!(inv.name, "a: b");
    }

    #[test]
    fn test_crlf_line_endings_are_kept() {
        let content = "kind: Kptfile\r\ninventory:\r\n  namespace: old\r\n";

        let out = patched(content, &InventoryIntent::new("apps").with_id("abc"));

        assert_eq!(out, "kind: Kptfile\r\ninventory:\r\n  namespace: apps\r\n  inventoryID: abc\r\n");
    }

    #[test]
    fn test_flow_section_with_values_is_rejected() {
        let mut kf = Kptfile::parse("kind: Kptfile\ninventory: {namespace: old}\n").unwrap();

        let err = kf.apply_intent(&InventoryIntent::new("apps")).unwrap_err();

        assert!(matches!(err, CoreError::InvalidDescriptor { .. }));
        assert_eq!(kf.content(), "kind: Kptfile\ninventory: {namespace: old}\n");
    }

    #[test]
    fn test_rewritten_document() {
        let mut kf = Kptfile::parse(
            "apiVersion: kpt.dev/v1\nkind: Kptfile\nmetadata:\n  name: app\ninventory:\n  namespace: old-ns\n  inventoryID: old-id\n",
        )
        .unwrap();
        kf.apply_intent(&InventoryIntent::new("custom-ns").with_id("abc").with_name("foo"))
            .unwrap();

        insta::assert_snapshot!(kf.content(), @r"
        apiVersion: kpt.dev/v1
        kind: Kptfile
        metadata:
          name: app
        inventory:
          namespace: custom-ns
          inventoryID: abc
          name: foo
        ");
    }

    #[test]
    fn test_load_and_save() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(KPTFILE_NAME);

        assert!(matches!(
            Kptfile::load(&path),
            Err(CoreError::DescriptorNotFound { .. })
        ));

        std::fs::write(&path, REGISTERED).unwrap();
        let mut kf = Kptfile::load(&path).unwrap();
        kf.apply_intent(&InventoryIntent::new("custom-ns")).unwrap();
        kf.save(&path).unwrap();

        let reloaded = Kptfile::load(&path).unwrap();
        assert_eq!(reloaded, kf);
        assert_eq!(reloaded.inventory().unwrap().unwrap().namespace, "custom-ns");
    }
}
