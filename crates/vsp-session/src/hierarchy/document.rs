//! Hierarchy document parsing
//!
//! ```xml
//! <hierarchy>
//!   <object name="system" kind="vcml::system" version="2024.01">
//!     <attribute name="clock" type="u64" count="1"/>
//!     <command name="dump" argc="0" desc="dump state"/>
//!     <object name="cpu" kind="..." version="...">...</object>
//!   </object>
//!   <target>system.cpu</target>
//! </hierarchy>
//! ```
//!
//! Parsing is strict: every element must be one the schema allows at its
//! position, and every required XML attribute must be present and valid.

use roxmltree::Node;

use vsp_core::{VspError, VspResult};

pub const TAG_HIERARCHY: &str = "hierarchy";
pub const TAG_OBJECT: &str = "object";
pub const TAG_ATTRIBUTE: &str = "attribute";
pub const TAG_COMMAND: &str = "command";
pub const TAG_TARGET: &str = "target";

/// Validated hierarchy document
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HierarchyDocument {
    pub modules: Vec<ModuleSpec>,
    pub targets: Vec<String>,
}

/// `<object>` node
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModuleSpec {
    pub name: String,
    pub kind: String,
    pub version: String,
    pub modules: Vec<ModuleSpec>,
    pub attributes: Vec<AttributeSpec>,
    pub commands: Vec<CommandSpec>,
}

/// `<attribute>` node
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeSpec {
    pub name: String,
    pub type_tag: String,
    pub count: usize,
}

/// `<command>` node
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: String,
    pub argc: usize,
    pub desc: String,
}

impl HierarchyDocument {
    pub fn parse(xml: &str) -> VspResult<Self> {
        let doc = roxmltree::Document::parse(xml)
            .map_err(|e| VspError::InvalidDocument(e.to_string()))?;

        let root = doc.root_element();
        if root.tag_name().name() != TAG_HIERARCHY {
            return Err(VspError::InvalidDocument(format!(
                "invalid hierarchy root node: {}",
                root.tag_name().name()
            )));
        }

        let mut document = HierarchyDocument::default();
        for node in root.children().filter(Node::is_element) {
            match node.tag_name().name() {
                TAG_OBJECT => document.modules.push(parse_module(node)?),
                TAG_TARGET => document.targets.push(parse_target(node)?),
                other => return Err(VspError::UnexpectedNode(other.to_string())),
            }
        }

        Ok(document)
    }
}

fn parse_module(node: Node<'_, '_>) -> VspResult<ModuleSpec> {
    let mut module = ModuleSpec {
        name: required(node, "name")?.to_string(),
        kind: required(node, "kind")?.to_string(),
        version: required(node, "version")?.to_string(),
        ..Default::default()
    };

    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            TAG_OBJECT => module.modules.push(parse_module(child)?),
            TAG_ATTRIBUTE => module.attributes.push(AttributeSpec {
                name: required(child, "name")?.to_string(),
                type_tag: required(child, "type")?.to_string(),
                count: number(child, "count")?,
            }),
            TAG_COMMAND => module.commands.push(CommandSpec {
                name: required(child, "name")?.to_string(),
                argc: number(child, "argc")?,
                desc: required(child, "desc")?.to_string(),
            }),
            other => return Err(VspError::UnexpectedNode(other.to_string())),
        }
    }

    Ok(module)
}

fn parse_target(node: Node<'_, '_>) -> VspResult<String> {
    let name = node.text().map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(VspError::InvalidDocument("target without a name".into()));
    }
    Ok(name.to_string())
}

fn required<'a>(node: Node<'a, '_>, attr: &str) -> VspResult<&'a str> {
    node.attribute(attr).ok_or_else(|| {
        VspError::InvalidDocument(format!(
            "<{}> is missing attribute '{}'",
            node.tag_name().name(),
            attr
        ))
    })
}

fn number(node: Node<'_, '_>, attr: &str) -> VspResult<usize> {
    let raw = required(node, attr)?;
    raw.trim().parse().map_err(|_| {
        VspError::InvalidDocument(format!(
            "<{}> attribute '{}' is not a count: '{}'",
            node.tag_name().name(),
            attr,
            raw
        ))
    })
}
