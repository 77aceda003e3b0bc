//! Stable, non-owning references to state nodes.
//!
//! A `Reference` names a node by id, variant and owning collection. It
//! never holds a pointer to its target, so it survives the target being
//! replaced, and resolving it after removal yields `None`.
//!
//! The string form is `id` for free-standing nodes and
//! `id|variant|collection` for collection members. Renderer features
//! derived from a member's sub-geometry append `[index]` to the token.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::collection::CollectionItem;

/// Reserved token separator
pub const SEPARATOR: char = '|';

/// Structured reference to a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub id: String,
    pub variant: Option<String>,
    pub collection: Option<String>,
}

impl Reference {
    /// Reference to a node that is not a collection member
    pub fn free(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            variant: None,
            collection: None,
        }
    }

    /// Reference to a member of `collection`
    pub fn member(
        id: impl Into<String>,
        variant: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            variant: Some(variant.into()),
            collection: Some(collection.into()),
        }
    }

    /// Reference to `item` as it is placed right now
    pub fn of<T: CollectionItem + ?Sized>(item: &T) -> Self {
        match item.owner().get() {
            Some(collection) => Self::member(item.id(), item.variant(), collection),
            None => Self::free(item.id()),
        }
    }

    /// Encode as a string token
    pub fn to_token(&self) -> String {
        match (&self.variant, &self.collection) {
            (Some(variant), Some(collection)) => {
                format!("{}{SEPARATOR}{}{SEPARATOR}{}", self.id, variant, collection)
            }
            (Some(variant), None) => format!("{}{SEPARATOR}{}", self.id, variant),
            _ => self.id.clone(),
        }
    }

    /// Decode a string token. Never fails; a token without separators is
    /// a free reference.
    pub fn parse(token: &str) -> Self {
        let mut parts = token.splitn(3, SEPARATOR);
        let id = parts.next().unwrap_or_default().to_string();
        let variant = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
        let collection = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
        Self {
            id,
            variant,
            collection,
        }
    }

    /// Token of the renderer feature for sub-geometry `index`
    pub fn member_token(&self, index: usize) -> String {
        format!("{}[{}]", self.to_token(), index)
    }

    /// Split a renderer feature id into the reference token and the
    /// sub-geometry index, if it has one.
    pub fn split_feature_id(feature_id: &str) -> (&str, Option<usize>) {
        if let Some(open) = feature_id.rfind('[') {
            if let Some(inner) = feature_id[open + 1..].strip_suffix(']') {
                if let Ok(index) = inner.parse() {
                    return (&feature_id[..open], Some(index));
                }
            }
        }
        (feature_id, None)
    }

    /// Reference behind a renderer feature id, ignoring any sub-geometry
    /// suffix
    pub fn from_feature_id(feature_id: &str) -> Self {
        Self::parse(Self::split_feature_id(feature_id).0)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_token())
    }
}

impl FromStr for Reference {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_reference_is_bare_id() {
        let r = Reference::free("abc");
        assert_eq!(r.to_token(), "abc");
        assert_eq!(Reference::parse("abc"), r);
    }

    #[test]
    fn test_member_token() {
        let r = Reference::member("p1", "polygon", "drawings");
        assert_eq!(r.to_token(), "p1|polygon|drawings");
        assert_eq!(Reference::parse("p1|polygon|drawings"), r);
        assert_eq!(r.member_token(2), "p1|polygon|drawings[2]");
        assert_eq!(r.to_string(), r.to_token());
    }

    #[test]
    fn test_feature_id_suffix() {
        assert_eq!(
            Reference::split_feature_id("p1|polygon|drawings[12]"),
            ("p1|polygon|drawings", Some(12))
        );
        assert_eq!(Reference::split_feature_id("odd[x]"), ("odd[x]", None));
        assert_eq!(
            Reference::from_feature_id("p1|polygon|drawings[0]"),
            Reference::member("p1", "polygon", "drawings")
        );
    }

    #[test]
    fn test_structural_equality() {
        let a: Reference = "x|point|c".parse().unwrap();
        let b = Reference::member("x", "point", "c");
        let c = Reference::member("x", "point", "other");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
