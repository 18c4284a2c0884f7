//! Attribute nodes and reads

use std::fmt;
use std::sync::{Arc, Weak};

use tracing::debug;

use vsp_core::{VspError, VspResult};
use vsp_transport::Link;
use vsp_wire::compose;

use crate::hierarchy::binding::Binding;
use crate::hierarchy::path::PATH_SEPARATOR;
use crate::hierarchy::{AttributeSpec, Module};

/// Value of an attribute read, shaped by its element count
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributeValue {
    /// Count 0, nothing to read
    Empty,
    Scalar(String),
    List(Vec<String>),
}

impl AttributeValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, AttributeValue::Empty)
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            AttributeValue::Scalar(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            AttributeValue::List(v) => Some(v.as_slice()),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Empty => Ok(()),
            AttributeValue::Scalar(v) => f.write_str(v),
            AttributeValue::List(values) => write!(f, "[{}]", values.join(", ")),
        }
    }
}

/// A readable property of a module
#[derive(Debug)]
pub struct Attribute {
    name: String,
    type_tag: String,
    count: usize,
    path: String,
    binding: Binding,
}

impl Attribute {
    pub(crate) fn new(spec: &AttributeSpec, module_path: &str, parent: Weak<Module>, link: &Link) -> Self {
        Attribute {
            name: spec.name.clone(),
            type_tag: spec.type_tag.clone(),
            count: spec.count,
            path: format!("{}{}{}", module_path, PATH_SEPARATOR, spec.name),
            binding: Binding::new(link, parent),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Number of elements
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn hierarchy_name(&self) -> &str {
        &self.path
    }

    pub fn parent(&self) -> Option<Arc<Module>> {
        self.binding.parent()
    }

    pub fn is_connected(&self) -> bool {
        self.binding.is_connected()
    }

    /// Read the current value; zero-element attributes never hit the wire
    pub async fn read(&self) -> VspResult<AttributeValue> {
        let link = self.binding.link(&self.path)?;
        if self.count == 0 {
            return Ok(AttributeValue::Empty);
        }

        let mut values = link.command(&compose(&["geta", self.path.as_str()])).await?;
        debug!(attribute = %self.path, ?values, "read attribute");

        if values.len() != self.count {
            return Err(VspError::UnexpectedResponse {
                command: format!("geta,{}", self.path),
                response: values,
            });
        }

        if self.count == 1 {
            Ok(AttributeValue::Scalar(values.remove(0)))
        } else {
            Ok(AttributeValue::List(values))
        }
    }

    pub(crate) fn disconnect(&self) {
        self.binding.clear();
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_display() {
        assert_eq!(AttributeValue::Empty.to_string(), "");
        assert_eq!(AttributeValue::Scalar("42".into()).to_string(), "42");
        assert_eq!(
            AttributeValue::List(vec!["1".into(), "2".into()]).to_string(),
            "[1, 2]"
        );
    }

    #[test]
    fn test_value_accessors() {
        assert!(AttributeValue::Empty.is_empty());
        assert_eq!(AttributeValue::Scalar("x".into()).as_scalar(), Some("x"));
        assert!(AttributeValue::Scalar("x".into()).as_list().is_none());
    }
}
