//! Generic key-value block tree parsing and writing
//!
//! VMF files are built from a single lexical unit: a named block containing
//! quoted key/value properties and nested child blocks.
//!
//! ```text
//! versioninfo
//! {
//!     "editorversion" "400"
//!     "mapversion" "1"
//! }
//! ```
//!
//! This module handles that grammar with no knowledge of what the blocks
//! mean. Property keys may repeat; repeated keys are preserved in order.
//! Writing renders properties and children in insertion order, so a tree
//! that is parsed and written back without modification reproduces its
//! text byte for byte.
//!
//! Malformed input is a hard failure: an unmatched brace, an unterminated
//! quoted string or a block body with no name yields [`Error::Parse`] and
//! no partial tree. Callers that want best-effort recovery must split the
//! input themselves.

use crate::error::{Error, Result};
use std::fmt;
use std::io::Read;

/// A generic named block: ordered properties plus ordered child blocks
///
/// This is the lexical unit of the VMF format, before any domain meaning
/// is applied. Names, keys and values are opaque strings.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureNode {
    /// The block name (the bare token preceding the opening brace)
    pub name: String,
    /// Ordered key/value properties; a key may appear more than once
    pub properties: Vec<(String, String)>,
    /// Ordered child blocks
    pub children: Vec<StructureNode>,
}

impl StructureNode {
    /// Create an empty node with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Append a property, keeping any existing occurrences of the key
    pub fn add_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.push((key.into(), value.into()));
    }

    /// Set a property: replaces the first occurrence of the key, or appends
    pub fn set_property(&mut self, key: &str, value: impl Into<String>) {
        match self.properties.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.into(),
            None => self.properties.push((key.to_string(), value.into())),
        }
    }

    /// Get the first value for a key
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Get the first value for a key, or a default when absent
    pub fn property_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.property(key).unwrap_or(default)
    }

    /// All values for a key, in order of appearance
    pub fn all_values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> {
        self.properties
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All distinct property keys, in order of first appearance
    pub fn property_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for (k, _) in &self.properties {
            if !keys.contains(&k.as_str()) {
                keys.push(k);
            }
        }
        keys
    }

    /// The first value for a key parsed as an integer, or a default
    ///
    /// Unparseable values fall back to the default, matching the lenient
    /// behavior editors expect from hand-edited map files.
    pub fn property_i64(&self, key: &str, default: i64) -> i64 {
        self.property(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// The first value for a key parsed as a float, or a default
    pub fn property_f64(&self, key: &str, default: f64) -> f64 {
        self.property(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Child blocks with the given name, in order
    pub fn children_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a StructureNode> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// The first child block with the given name
    pub fn first_child(&self, name: &str) -> Option<&StructureNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Parse zero or more top-level blocks from a reader
    pub fn parse_from<R: Read>(mut reader: R) -> Result<Vec<StructureNode>> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Self::parse(&text)
    }

    /// Parse zero or more top-level blocks from a string
    pub fn parse(text: &str) -> Result<Vec<StructureNode>> {
        let mut lexer = Lexer::new(text);
        let mut nodes = Vec::new();
        while let Some(token) = lexer.next_token()? {
            match token {
                Token::Bare(name) => match lexer.next_token()? {
                    Some(Token::Open) => nodes.push(Self::parse_body(name, &mut lexer)?),
                    _ => {
                        return Err(Error::parse(
                            lexer.line,
                            format!("expected '{{' after block name '{}'", name),
                        ));
                    }
                },
                Token::Quoted(name) => {
                    return Err(Error::parse(
                        lexer.line,
                        format!("expected a block name, found quoted string \"{}\"", name),
                    ));
                }
                Token::Open => {
                    return Err(Error::parse(lexer.line, "block body with no name"));
                }
                Token::Close => {
                    return Err(Error::parse(lexer.line, "unmatched '}'"));
                }
            }
        }
        Ok(nodes)
    }

    fn parse_body(name: String, lexer: &mut Lexer<'_>) -> Result<StructureNode> {
        let mut node = StructureNode::new(name);
        loop {
            match lexer.next_token()? {
                Some(Token::Close) => return Ok(node),
                Some(Token::Quoted(key)) => match lexer.next_token()? {
                    Some(Token::Quoted(value)) => node.properties.push((key, value)),
                    _ => {
                        return Err(Error::parse(
                            lexer.line,
                            format!("expected quoted value after key \"{}\"", key),
                        ));
                    }
                },
                Some(Token::Bare(child_name)) => match lexer.next_token()? {
                    Some(Token::Open) => {
                        node.children.push(Self::parse_body(child_name, lexer)?)
                    }
                    _ => {
                        return Err(Error::parse(
                            lexer.line,
                            format!("expected '{{' after block name '{}'", child_name),
                        ));
                    }
                },
                Some(Token::Open) => {
                    return Err(Error::parse(lexer.line, "block body with no name"));
                }
                None => {
                    return Err(Error::parse(
                        lexer.line,
                        format!("unmatched '{{' in block '{}'", node.name),
                    ));
                }
            }
        }
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "\t".repeat(depth);
        writeln!(f, "{}{}", indent, self.name)?;
        writeln!(f, "{}{{", indent)?;
        for (key, value) in &self.properties {
            writeln!(f, "{}\t\"{}\" \"{}\"", indent, escape(key), escape(value))?;
        }
        for child in &self.children {
            child.write_indented(f, depth + 1)?;
        }
        writeln!(f, "{}}}", indent)
    }
}

impl fmt::Display for StructureNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

fn escape(s: &str) -> String {
    if s.contains('"') || s.contains('\\') {
        s.replace('\\', "\\\\").replace('"', "\\\"")
    } else {
        s.to_string()
    }
}

#[derive(Debug)]
enum Token {
    Bare(String),
    Quoted(String),
    Open,
    Close,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
            line: 1,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        loop {
            match self.chars.peek() {
                None => return Ok(None),
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                // VMF tools write "//"-style comments between top-level blocks
                Some('/') => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                Some('{') => {
                    self.bump();
                    return Ok(Some(Token::Open));
                }
                Some('}') => {
                    self.bump();
                    return Ok(Some(Token::Close));
                }
                Some('"') => {
                    self.bump();
                    return Ok(Some(Token::Quoted(self.read_quoted()?)));
                }
                Some(_) => return Ok(Some(Token::Bare(self.read_bare()))),
            }
        }
    }

    fn read_quoted(&mut self) -> Result<String> {
        let start_line = self.line;
        let mut value = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(Error::parse(start_line, "unterminated quoted string"));
                }
                Some('"') => return Ok(value),
                Some('\\') => match self.bump() {
                    Some('"') => value.push('"'),
                    Some('\\') => value.push('\\'),
                    Some(other) => {
                        value.push('\\');
                        value.push(other);
                    }
                    None => {
                        return Err(Error::parse(start_line, "unterminated quoted string"));
                    }
                },
                Some(c) => value.push(c),
            }
        }
    }

    fn read_bare(&mut self) -> String {
        let mut word = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() || c == '{' || c == '}' || c == '"' {
                break;
            }
            word.push(c);
            self.bump();
        }
        word
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_block() {
        let text = "versioninfo\n{\n\t\"editorversion\" \"400\"\n\t\"mapversion\" \"7\"\n}\n";
        let nodes = StructureNode::parse(text).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name, "versioninfo");
        assert_eq!(nodes[0].property("editorversion"), Some("400"));
        assert_eq!(nodes[0].property_i64("mapversion", 0), 7);
    }

    #[test]
    fn test_parse_nested_blocks() {
        let text = r#"
world
{
    "id" "1"
    solid
    {
        "id" "2"
        side
        {
            "id" "3"
        }
    }
}
"#;
        let nodes = StructureNode::parse(text).unwrap();
        assert_eq!(nodes.len(), 1);
        let solid = nodes[0].first_child("solid").unwrap();
        let side = solid.first_child("side").unwrap();
        assert_eq!(side.property("id"), Some("3"));
    }

    #[test]
    fn test_repeated_keys_preserved_in_order() {
        let text = "editor\n{\n\t\"visgroupid\" \"2\"\n\t\"visgroupid\" \"5\"\n\t\"visgroupid\" \"3\"\n}\n";
        let nodes = StructureNode::parse(text).unwrap();
        let values: Vec<&str> = nodes[0].all_values("visgroupid").collect();
        assert_eq!(values, vec!["2", "5", "3"]);
    }

    #[test]
    fn test_multiple_top_level_blocks() {
        let text = "a\n{\n}\nb\n{\n}\nc\n{\n}\n";
        let nodes = StructureNode::parse(text).unwrap();
        let names: Vec<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unmatched_open_brace_is_fatal() {
        let text = "world\n{\n\t\"id\" \"1\"\n";
        let err = StructureNode::parse(text).unwrap_err();
        assert!(err.to_string().contains("[E2001]"));
        assert!(err.to_string().contains("unmatched '{'"));
    }

    #[test]
    fn test_unterminated_quote_is_fatal() {
        let text = "world\n{\n\t\"id\" \"1\n}\n";
        let err = StructureNode::parse(text).unwrap_err();
        assert!(err.to_string().contains("unterminated"));
    }

    #[test]
    fn test_missing_block_name_is_fatal() {
        let text = "{\n}\n";
        assert!(StructureNode::parse(text).is_err());
    }

    #[test]
    fn test_escaped_quotes_round_trip() {
        let mut node = StructureNode::new("entity");
        node.add_property("message", "say \"hello\"");
        let text = node.to_string();
        let reparsed = StructureNode::parse(&text).unwrap();
        assert_eq!(reparsed[0].property("message"), Some("say \"hello\""));
    }

    #[test]
    fn test_write_is_stable() {
        let text = "entity\n{\n\t\"classname\" \"info_player_start\"\n\t\"angles\" \"0 0 0\"\n\teditor\n\t{\n\t\t\"color\" \"220 30 220\"\n\t}\n}\n";
        let nodes = StructureNode::parse(text).unwrap();
        assert_eq!(nodes[0].to_string(), text);
    }

    #[test]
    fn test_comment_lines_skipped() {
        let text = "// exported by hand\nworld\n{\n}\n";
        let nodes = StructureNode::parse(text).unwrap();
        assert_eq!(nodes[0].name, "world");
    }

    #[test]
    fn test_set_property_replaces_first() {
        let mut node = StructureNode::new("editor");
        node.add_property("color", "0 0 0");
        node.set_property("color", "255 0 0");
        assert_eq!(node.property("color"), Some("255 0 0"));
        assert_eq!(node.properties.len(), 1);
    }
}
