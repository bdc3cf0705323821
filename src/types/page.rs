//! Rendered page snapshot and a small class-selector query engine.
//!
//! The rendering sidecar serializes the live DOM into a JSON element tree.
//! Only what extraction needs is modelled: tag, classes, own text, children.
//!
//! Selectors are compound class/tag steps joined by the descendant
//! combinator, e.g. `.entries.main .entry` or `div.number`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// One element of the rendered page.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct PageNode {
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    /// Text directly owned by this element (not its children).
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub children: Vec<PageNode>,
}

impl PageNode {
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Own text followed by all descendant text, trimmed.
    pub fn text_content(&self) -> String {
        let mut buf = String::new();
        self.collect_text(&mut buf);
        buf.trim().to_string()
    }

    fn collect_text(&self, buf: &mut String) {
        if let Some(text) = &self.text {
            buf.push_str(text);
        }
        for child in &self.children {
            child.collect_text(buf);
        }
    }

    /// All descendants matching `selector`, in document order.
    ///
    /// The node itself is never returned but may satisfy ancestor steps.
    pub fn select<'a>(&'a self, selector: &Selector) -> Vec<&'a PageNode> {
        let mut out = Vec::new();
        let mut ancestors = vec![self];
        for child in &self.children {
            walk(child, &mut ancestors, selector, &mut out);
        }
        out
    }

    /// First descendant matching `selector`.
    pub fn select_first<'a>(&'a self, selector: &Selector) -> Option<&'a PageNode> {
        self.select(selector).into_iter().next()
    }
}

fn walk<'a>(
    node: &'a PageNode,
    ancestors: &mut Vec<&'a PageNode>,
    selector: &Selector,
    out: &mut Vec<&'a PageNode>,
) {
    if selector.matches(node, ancestors) {
        out.push(node);
    }
    ancestors.push(node);
    for child in &node.children {
        walk(child, ancestors, selector, out);
    }
    ancestors.pop();
}

/// One compound step of a selector: optional tag plus required classes.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Step {
    tag: Option<String>,
    classes: Vec<String>,
}

impl Step {
    fn matches(&self, node: &PageNode) -> bool {
        if let Some(tag) = &self.tag {
            if node.tag.as_deref() != Some(tag.as_str()) {
                return false;
            }
        }
        self.classes.iter().all(|c| node.has_class(c))
    }
}

/// Parsed descendant selector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selector {
    source: String,
    steps: Vec<Step>,
}

impl Selector {
    fn matches(&self, node: &PageNode, ancestors: &[&PageNode]) -> bool {
        let Some((last, rest)) = self.steps.split_last() else {
            return false;
        };
        if !last.matches(node) {
            return false;
        }
        // Greedy right-to-left match against the nearest ancestors.
        let mut pending = rest.iter().rev().peekable();
        for ancestor in ancestors.iter().rev() {
            match pending.peek() {
                Some(step) if step.matches(ancestor) => {
                    pending.next();
                }
                Some(_) => {}
                None => break,
            }
        }
        pending.peek().is_none()
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl FromStr for Selector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut steps = Vec::new();
        for part in s.split_whitespace() {
            let mut pieces = part.split('.');
            let tag = match pieces.next() {
                Some("") | None => None,
                Some(t) if t.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') => {
                    Some(t.to_ascii_lowercase())
                }
                Some(t) => {
                    return Err(Error::config(format!(
                        "unsupported selector step '{t}' in '{s}'"
                    )))
                }
            };
            let classes: Vec<String> = pieces.map(str::to_string).collect();
            if classes.iter().any(String::is_empty) {
                return Err(Error::config(format!("empty class name in selector '{s}'")));
            }
            if tag.is_none() && classes.is_empty() {
                return Err(Error::config(format!("empty step in selector '{s}'")));
            }
            steps.push(Step { tag, classes });
        }
        if steps.is_empty() {
            return Err(Error::config("selector must not be empty"));
        }
        Ok(Self {
            source: s.trim().to_string(),
            steps,
        })
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// A captured rendering of the page.
///
/// Owned outright: dropping it releases everything the acquisition held.
#[derive(Clone, Debug, PartialEq)]
pub struct PageSnapshot {
    root: PageNode,
    captured_at: DateTime<Utc>,
}

impl PageSnapshot {
    pub fn new(root: PageNode) -> Self {
        Self {
            root,
            captured_at: Utc::now(),
        }
    }

    /// Decode the sidecar's JSON element tree.
    pub fn from_json(body: &str) -> crate::prelude::Result<Self> {
        let root: PageNode = serde_json::from_str(body)
            .map_err(|e| crate::SnapshotError::Decode(e.to_string()))?;
        if root.children.is_empty() && root.text.is_none() {
            return Err(crate::SnapshotError::MissingStructure("empty page".to_string()).into());
        }
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &PageNode {
        &self.root
    }

    /// When the snapshot was decoded.
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// All matching elements, the root included as a candidate.
    pub fn query(&self, selector: &Selector) -> Vec<&PageNode> {
        let mut out = Vec::new();
        let mut ancestors = Vec::new();
        walk(&self.root, &mut ancestors, selector, &mut out);
        out
    }

    pub fn query_first(&self, selector: &Selector) -> Option<&PageNode> {
        self.query(selector).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(classes: &[&str], text: Option<&str>, children: Vec<PageNode>) -> PageNode {
        PageNode {
            tag: Some("div".to_string()),
            classes: classes.iter().map(|c| c.to_string()).collect(),
            text: text.map(str::to_string),
            children,
        }
    }

    fn sel(s: &str) -> Selector {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_selector() {
        let s = sel(".entries.main  .entry");
        assert_eq!(s.steps.len(), 2);
        assert_eq!(s.steps[0].classes, vec!["entries", "main"]);
        assert_eq!(s.as_str(), ".entries.main  .entry");

        let s = sel("div.number");
        assert_eq!(s.steps[0].tag.as_deref(), Some("div"));

        assert!("".parse::<Selector>().is_err());
        assert!(".a..b".parse::<Selector>().is_err());
        assert!("#id".parse::<Selector>().is_err());
    }

    #[test]
    fn test_descendant_query() {
        let page = PageSnapshot::new(node(
            &["body"],
            None,
            vec![
                node(
                    &["entries", "main"],
                    None,
                    vec![
                        node(&["entry"], Some("a"), vec![]),
                        node(&["wrapper"], None, vec![node(&["entry"], Some("b"), vec![])]),
                    ],
                ),
                node(&["entries"], None, vec![node(&["entry"], Some("c"), vec![])]),
            ],
        ));

        let found = page.query(&sel(".entries.main .entry"));
        let texts: Vec<_> = found.iter().map(|n| n.text_content()).collect();
        assert_eq!(texts, vec!["a", "b"]);

        // Compound step must match a single element
        assert!(page.query(&sel(".entries.missing .entry")).is_empty());
    }

    #[test]
    fn test_node_select_excludes_self() {
        let tile = node(&["tile"], None, vec![node(&["tile"], Some("inner"), vec![])]);
        let found = tile.select(&sel(".tile"));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text_content(), "inner");
    }

    #[test]
    fn test_text_content_concatenates() {
        let n = node(
            &[],
            Some("  Blaze "),
            vec![node(&[], Some("Girou 7!  "), vec![])],
        );
        assert_eq!(n.text_content(), "Blaze Girou 7!");
    }

    #[test]
    fn test_from_json_defaults() {
        let json = r#"{"classes":["root"],"children":[{"text":"hi"}]}"#;
        let snapshot = PageSnapshot::from_json(json).unwrap();
        assert!(snapshot.root().has_class("root"));
        assert_eq!(snapshot.root().children[0].text.as_deref(), Some("hi"));
        assert!(snapshot.root().tag.is_none());
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        let err = PageSnapshot::from_json("<html>").unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_from_json_rejects_empty_page() {
        let err = PageSnapshot::from_json(r#"{"tag":"body"}"#).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Snapshot(crate::SnapshotError::MissingStructure(_))
        ));
    }
}
