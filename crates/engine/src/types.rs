use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId {
    pub site: u16,
    pub application: u16,
    pub entity: u16,
}

impl EntityId {
    pub const fn new(site: u16, application: u16, entity: u16) -> Self {
        Self {
            site,
            application,
            entity,
        }
    }

    pub fn originator(&self) -> (u16, u16) {
        (self.site, self.application)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.site, self.application, self.entity)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EventId {
    pub site: u16,
    pub application: u16,
    pub event: u16,
}

impl EventId {
    pub const fn new(site: u16, application: u16, event: u16) -> Self {
        Self {
            site,
            application,
            event,
        }
    }
}

/// Seven-level entity type descriptor, coarsest component first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeCode {
    pub kind: u8,
    pub domain: u8,
    pub country: u16,
    pub category: u8,
    #[serde(default)]
    pub subcategory: u8,
    #[serde(default)]
    pub specific: u8,
    #[serde(default)]
    pub extra: u8,
}

impl TypeCode {
    pub const fn new(
        kind: u8,
        domain: u8,
        country: u16,
        category: u8,
        subcategory: u8,
        specific: u8,
        extra: u8,
    ) -> Self {
        Self {
            kind,
            domain,
            country,
            category,
            subcategory,
            specific,
            extra,
        }
    }

    /// Component at `level`, widened so every level compares the same way.
    pub fn component(&self, level: TypeLevel) -> u16 {
        match level {
            TypeLevel::Root => 0,
            TypeLevel::Kind => self.kind as u16,
            TypeLevel::Domain => self.domain as u16,
            TypeLevel::Country => self.country,
            TypeLevel::Category => self.category as u16,
            TypeLevel::Subcategory => self.subcategory as u16,
            TypeLevel::Specific => self.specific as u16,
            TypeLevel::Extra => self.extra as u16,
        }
    }

    /// Deepest level whose component is nonzero, or `Root` for the all-zero code.
    pub fn specified_depth(&self) -> TypeLevel {
        TypeLevel::COMPONENTS
            .iter()
            .rev()
            .copied()
            .find(|&level| self.component(level) != 0)
            .unwrap_or(TypeLevel::Root)
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}.{}.{}.{}",
            self.kind,
            self.domain,
            self.country,
            self.category,
            self.subcategory,
            self.specific,
            self.extra
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeLevel {
    Root,
    Kind,
    Domain,
    Country,
    Category,
    Subcategory,
    Specific,
    Extra,
}

impl TypeLevel {
    pub const COMPONENTS: [TypeLevel; 7] = [
        TypeLevel::Kind,
        TypeLevel::Domain,
        TypeLevel::Country,
        TypeLevel::Category,
        TypeLevel::Subcategory,
        TypeLevel::Specific,
        TypeLevel::Extra,
    ];

    pub fn next(self) -> Option<TypeLevel> {
        match self {
            TypeLevel::Root => Some(TypeLevel::Kind),
            TypeLevel::Kind => Some(TypeLevel::Domain),
            TypeLevel::Domain => Some(TypeLevel::Country),
            TypeLevel::Country => Some(TypeLevel::Category),
            TypeLevel::Category => Some(TypeLevel::Subcategory),
            TypeLevel::Subcategory => Some(TypeLevel::Specific),
            TypeLevel::Specific => Some(TypeLevel::Extra),
            TypeLevel::Extra => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ForceId {
    Other = 0,
    Friendly = 1,
    Opposing = 2,
    Neutral = 3,
}

impl From<u8> for ForceId {
    fn from(value: u8) -> Self {
        match value {
            1 => ForceId::Friendly,
            2 => ForceId::Opposing,
            3 => ForceId::Neutral,
            _ => ForceId::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specified_depth_ignores_trailing_zeros() {
        assert_eq!(
            TypeCode::new(1, 2, 0, 5, 0, 0, 0).specified_depth(),
            TypeLevel::Category
        );
        assert_eq!(
            TypeCode::new(1, 2, 225, 1, 3, 0, 7).specified_depth(),
            TypeLevel::Extra
        );
        assert_eq!(TypeCode::default().specified_depth(), TypeLevel::Root);
        assert_eq!(
            TypeCode::new(1, 0, 0, 0, 0, 0, 0).specified_depth(),
            TypeLevel::Kind
        );
    }

    #[test]
    fn type_code_display() {
        let code = TypeCode::new(1, 2, 225, 1, 3, 0, 7);
        assert_eq!(code.to_string(), "1.2.225.1.3.0.7");
    }
}
