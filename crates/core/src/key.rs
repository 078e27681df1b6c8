//! Hierarchical entity keys
//!
//! A [`Key`] identifies one stored entity: a kind, an id-or-name, the chain
//! of ancestor path elements above it, and an optional namespace.
//!
//! ## Ordering
//!
//! Keys sort by namespace first (absent before any named namespace, then
//! lexically) and then by full path, element by element. Within an element the
//! kind sorts lexically, then ids: incomplete < numeric < named. A path that is
//! a proper prefix of another sorts first.
//!
//! No kind or name validation happens here; the backend rejects what it
//! cannot store.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{Error, Result};

/// Identifier component of a path element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyId {
    /// Not yet assigned; the backend allocates a numeric id on put
    Incomplete,
    /// Numeric id
    Id(i64),
    /// String name
    Name(String),
}

impl KeyId {
    fn rank(&self) -> u8 {
        match self {
            KeyId::Incomplete => 0,
            KeyId::Id(_) => 1,
            KeyId::Name(_) => 2,
        }
    }
}

impl Ord for KeyId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (KeyId::Id(a), KeyId::Id(b)) => a.cmp(b),
            (KeyId::Name(a), KeyId::Name(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for KeyId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyId::Incomplete => write!(f, "?"),
            KeyId::Id(id) => write!(f, "{}", id),
            KeyId::Name(name) => write!(f, "'{}'", name),
        }
    }
}

/// One `(kind, id-or-name)` step of a key path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathElement {
    /// Kind name
    pub kind: String,
    /// Id or name
    pub id: KeyId,
}

impl PathElement {
    /// Create a path element
    pub fn new(kind: impl Into<String>, id: KeyId) -> Self {
        Self {
            kind: kind.into(),
            id,
        }
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Typed hierarchical entity key
///
/// Immutable value object. Equality is structural over namespace, ancestor
/// path, kind and id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    namespace: Option<String>,
    parent: Vec<PathElement>,
    kind: String,
    id: KeyId,
}

impl Key {
    /// Key with a numeric id
    pub fn with_id(kind: impl Into<String>, id: i64) -> Self {
        Self::from_parts(None, Vec::new(), kind.into(), KeyId::Id(id))
    }

    /// Key with a string name
    pub fn with_name(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::from_parts(None, Vec::new(), kind.into(), KeyId::Name(name.into()))
    }

    /// Key whose id will be allocated by the backend
    pub fn incomplete(kind: impl Into<String>) -> Self {
        Self::from_parts(None, Vec::new(), kind.into(), KeyId::Incomplete)
    }

    fn from_parts(
        namespace: Option<String>,
        parent: Vec<PathElement>,
        kind: String,
        id: KeyId,
    ) -> Self {
        Self {
            namespace: namespace.filter(|ns| !ns.is_empty()),
            parent,
            kind,
            id,
        }
    }

    /// Place this key under `parent`, inheriting the parent's namespace
    pub fn with_parent(mut self, parent: &Key) -> Self {
        self.parent = parent.path();
        self.namespace = parent.namespace.clone();
        self
    }

    /// Set the namespace; an empty namespace is the same as none
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        let ns = namespace.into();
        self.namespace = if ns.is_empty() { None } else { Some(ns) };
        self
    }

    /// Kind of the entity
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Id-or-name of the entity
    pub fn id(&self) -> &KeyId {
        &self.id
    }

    /// Numeric id, if this key has one
    pub fn id_value(&self) -> Option<i64> {
        match self.id {
            KeyId::Id(id) => Some(id),
            _ => None,
        }
    }

    /// Name, if this key has one
    pub fn name(&self) -> Option<&str> {
        match &self.id {
            KeyId::Name(name) => Some(name),
            _ => None,
        }
    }

    /// Namespace, `None` for the default namespace
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Ancestor path, root first, excluding this key's own element
    pub fn parent_path(&self) -> &[PathElement] {
        &self.parent
    }

    /// Full path: ancestor path followed by this key's element
    pub fn path(&self) -> Vec<PathElement> {
        let mut path = self.parent.clone();
        path.push(PathElement::new(self.kind.clone(), self.id.clone()));
        path
    }

    /// The parent key, rebuilt from the ancestor path
    pub fn parent(&self) -> Option<Key> {
        if self.parent.is_empty() {
            return None;
        }
        Key::from_path(self.namespace.clone(), &self.parent).ok()
    }

    /// Ancestor keys from the root down to the direct parent
    pub fn ancestors(&self) -> Vec<Key> {
        (1..=self.parent.len())
            .filter_map(|len| Key::from_path(self.namespace.clone(), &self.parent[..len]).ok())
            .collect()
    }

    /// True when every path element carries an id or name
    pub fn is_complete(&self) -> bool {
        self.id != KeyId::Incomplete
    }

    /// Copy of this key with an allocated numeric id
    pub fn complete_with_id(&self, id: i64) -> Key {
        let mut key = self.clone();
        key.id = KeyId::Id(id);
        key
    }

    /// True if `ancestor`'s full path is a prefix of this key's full path
    ///
    /// A key counts as its own ancestor. Namespaces must match.
    pub fn has_ancestor(&self, ancestor: &Key) -> bool {
        if self.namespace != ancestor.namespace {
            return false;
        }
        let own = self.path();
        let other = ancestor.path();
        other.len() <= own.len() && own[..other.len()] == other[..]
    }

    /// Inverse of [`has_ancestor`](Self::has_ancestor)
    pub fn is_ancestor_of(&self, other: &Key) -> bool {
        other.has_ancestor(self)
    }

    /// Rebuild a key from a namespace and full path
    ///
    /// The parent chain is rebuilt recursively from the path prefix.
    pub fn from_path(namespace: Option<String>, path: &[PathElement]) -> Result<Key> {
        let (last, rest) = path
            .split_last()
            .ok_or_else(|| Error::Backend("key path is empty".to_string()))?;
        let key = Key::from_parts(
            namespace.clone(),
            Vec::new(),
            last.kind.clone(),
            last.id.clone(),
        );
        if rest.is_empty() {
            return Ok(key);
        }
        let parent = Key::from_path(namespace, rest)?;
        Ok(key.with_parent(&parent))
    }

    /// Stable string form used to index entities in maps
    ///
    /// Distinct keys always encode to distinct strings.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        if let Some(ns) = &self.namespace {
            push_escaped(&mut out, ns);
        }
        for element in self.path() {
            out.push('/');
            push_escaped(&mut out, &element.kind);
            out.push(':');
            match &element.id {
                KeyId::Incomplete => out.push('?'),
                KeyId::Id(id) => {
                    out.push('#');
                    out.push_str(&id.to_string());
                }
                KeyId::Name(name) => {
                    out.push('=');
                    push_escaped(&mut out, name);
                }
            }
        }
        out
    }
}

fn push_escaped(out: &mut String, text: &str) {
    for ch in text.chars() {
        if matches!(ch, '\\' | '/' | ':' | '#' | '=' | '?') {
            out.push('\\');
        }
        out.push(ch);
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        // None sorts before Some, so the default namespace comes first
        self.namespace
            .cmp(&other.namespace)
            .then_with(|| self.path().cmp(&other.path()))
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ns) = &self.namespace {
            write!(f, "[{}]", ns)?;
        }
        let path = self.path();
        for (i, element) in path.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{}", element)?;
        }
        Ok(())
    }
}

/// Backend-native key representation
///
/// Flat `namespace + full path` record as exchanged with a remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyProto {
    /// Project the key belongs to, if the backend tracks it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Namespace, `None` for default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Full path, root first
    pub path: Vec<PathElement>,
}

impl From<&Key> for KeyProto {
    fn from(key: &Key) -> Self {
        KeyProto {
            project_id: None,
            namespace: key.namespace.clone(),
            path: key.path(),
        }
    }
}

impl TryFrom<KeyProto> for Key {
    type Error = Error;

    fn try_from(proto: KeyProto) -> Result<Self> {
        Key::from_path(proto.namespace, &proto.path)
    }
}
