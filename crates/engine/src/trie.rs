use serde::Deserialize;

use crate::error::RegisterError;
use crate::types::{TypeCode, TypeLevel};

/// Locally modeled entity class, resolved from the wire type code.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TypeMapping {
    pub code: TypeCode,
    pub name: String,
    #[serde(default)]
    pub model: Option<String>,
}

impl TypeMapping {
    pub fn new(code: TypeCode, name: impl Into<String>) -> Self {
        Self {
            code,
            name: name.into(),
            model: None,
        }
    }
}

#[derive(Debug)]
struct Node<T> {
    level: TypeLevel,
    code: u16,
    mapping: Option<T>,
    children: Vec<Node<T>>,
}

impl<T> Node<T> {
    fn new(level: TypeLevel, code: u16) -> Self {
        Self {
            level,
            code,
            mapping: None,
            children: Vec::new(),
        }
    }

    fn child_mut(&mut self, code: u16) -> &mut Node<T> {
        let level = self
            .level
            .next()
            .unwrap_or(TypeLevel::Extra);
        let index = match self.children.iter().position(|c| c.code == code) {
            Some(index) => index,
            None => {
                self.children.push(Node::new(level, code));
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }

    fn search(&self, code: &TypeCode) -> Option<&T> {
        if let Some(next) = self.level.next() {
            let wanted = code.component(next);
            let exact = self.children.iter().filter(|c| c.code == wanted);
            // A zero below the domain level registers "any value" for that component.
            let wildcard = self
                .children
                .iter()
                .filter(|c| c.code == 0 && wanted != 0 && next >= TypeLevel::Country);

            for child in exact.chain(wildcard) {
                if let Some(found) = child.search(code) {
                    return Some(found);
                }
            }
        }

        if self.level >= TypeLevel::Category {
            self.mapping.as_ref()
        } else {
            None
        }
    }
}

/// Seven-level trie from type codes to registered records.
///
/// Records whose trailing components are zero terminate at the deepest nonzero level
/// (never above category) and then match any value for the unspecified components.
/// Deeper registrations always win over a wildcard ancestor.
#[derive(Debug)]
pub struct TypeTrie<T> {
    root: Node<T>,
    len: usize,
}

impl<T> Default for TypeTrie<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TypeTrie<T> {
    pub fn new() -> Self {
        Self {
            root: Node::new(TypeLevel::Root, 0),
            len: 0,
        }
    }

    pub fn register(&mut self, code: TypeCode, record: T) -> Result<(), RegisterError> {
        let terminal = code.specified_depth().max(TypeLevel::Category);

        let mut node = &mut self.root;
        for level in TypeLevel::COMPONENTS {
            if level > terminal {
                break;
            }
            node = node.child_mut(code.component(level));
        }

        if node.mapping.is_some() {
            log::warn!("type {} already registered, keeping first mapping", code);
            return Err(RegisterError::Duplicate(code));
        }
        node.mapping = Some(record);
        self.len += 1;
        Ok(())
    }

    pub fn lookup(&self, code: &TypeCode) -> Option<&T> {
        self.root.search(code)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl TypeTrie<TypeMapping> {
    pub fn register_mapping(&mut self, mapping: TypeMapping) -> Result<(), RegisterError> {
        self.register(mapping.code, mapping)
    }
}
