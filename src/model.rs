//! Data model: entity descriptors pulled from source and the
//! relationship-resolved nodes kept in the store.

use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Closed set of declaration kinds the documentation model knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Interface,
    Category,
    ClassExtension,
    Protocol,
    Method,
    Property,
    Function,
    Enum,
    EnumValue,
    Typedef,
    Constant,
    Struct,
    Union,
    Macro,
    Unknown,
}

impl EntityKind {
    pub const ALL: [EntityKind; 15] = [
        EntityKind::Interface,
        EntityKind::Category,
        EntityKind::ClassExtension,
        EntityKind::Protocol,
        EntityKind::Method,
        EntityKind::Property,
        EntityKind::Function,
        EntityKind::Enum,
        EntityKind::EnumValue,
        EntityKind::Typedef,
        EntityKind::Constant,
        EntityKind::Struct,
        EntityKind::Union,
        EntityKind::Macro,
        EntityKind::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Interface => "interface",
            EntityKind::Category => "category",
            EntityKind::ClassExtension => "class-extension",
            EntityKind::Protocol => "protocol",
            EntityKind::Method => "method",
            EntityKind::Property => "property",
            EntityKind::Function => "function",
            EntityKind::Enum => "enum",
            EntityKind::EnumValue => "enum-value",
            EntityKind::Typedef => "typedef",
            EntityKind::Constant => "constant",
            EntityKind::Struct => "struct",
            EntityKind::Union => "union",
            EntityKind::Macro => "macro",
            EntityKind::Unknown => "unknown",
        }
    }

    /// Parse the kebab-case name used on the command line.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    /// Kinds that own member nodes.
    pub fn is_container(self) -> bool {
        matches!(
            self,
            EntityKind::Interface
                | EntityKind::Category
                | EntityKind::ClassExtension
                | EntityKind::Protocol
                | EntityKind::Enum
        )
    }

    /// Kinds that only exist inside a container.
    pub fn is_member(self) -> bool {
        matches!(
            self,
            EntityKind::Method | EntityKind::Property | EntityKind::EnumValue
        )
    }

    pub fn is_category_like(self) -> bool {
        matches!(self, EntityKind::Category | EntityKind::ClassExtension)
    }

    /// Whether a member of kind `member` may live inside a container of this kind.
    pub fn accepts(self, member: EntityKind) -> bool {
        match member {
            EntityKind::Method | EntityKind::Property => matches!(
                self,
                EntityKind::Interface
                    | EntityKind::Category
                    | EntityKind::ClassExtension
                    | EntityKind::Protocol
            ),
            EntityKind::EnumValue => self == EntityKind::Enum,
            _ => false,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File, line and column of a declaration. Ordering is file, then line, then column.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Non-owning pointer to the entity a declaration is nested under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParentRef {
    pub kind: EntityKind,
    pub name: String,
    pub location: SourceLocation,
}

/// One typed piece of a method or function signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "kebab-case")]
pub enum SignatureFragment {
    Return {
        type_name: String,
    },
    Parameter {
        #[serde(skip_serializing_if = "Option::is_none")]
        keyword: Option<String>,
        type_name: String,
        name: String,
    },
    Variadic,
}

/// Instance (`-`) or class (`+`) method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodFlavor {
    Instance,
    Class,
}

impl MethodFlavor {
    pub fn prefix(self) -> char {
        match self {
            MethodFlavor::Instance => '-',
            MethodFlavor::Class => '+',
        }
    }
}

/// Entity descriptor produced by the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub kind: EntityKind,
    /// Identifier as spelled in source; selector for methods, category name for categories.
    pub name: String,
    pub location: SourceLocation,
    /// Verbatim documentation comment, empty if none.
    pub raw_comment: String,
    pub parent: Option<ParentRef>,
    pub signature: Vec<SignatureFragment>,
    pub flavor: Option<MethodFlavor>,
    /// Declared type of properties, typedefs and constants.
    pub type_name: Option<String>,
    pub superclass: Option<String>,
    pub protocols: Vec<String>,
    /// Class a category or extension adds to.
    pub base_class: Option<String>,
    /// Property attributes (`nonatomic`, `copy`, ...).
    pub attributes: Vec<String>,
    /// `@name` group opened right before this entity.
    pub group: Option<String>,
}

impl Entity {
    pub fn new(kind: EntityKind, name: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            kind,
            name: name.into(),
            location,
            raw_comment: String::new(),
            parent: None,
            signature: Vec::new(),
            flavor: None,
            type_name: None,
            superclass: None,
            protocols: Vec::new(),
            base_class: None,
            attributes: Vec::new(),
            group: None,
        }
    }

    pub fn key(&self) -> NodeKey {
        NodeKey::for_parts(self.kind, &self.name, self.flavor)
    }
}

/// Identity of a node among its siblings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeKey {
    pub kind: EntityKind,
    pub name: String,
}

impl NodeKey {
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Methods are keyed with their flavor prefix so `-foo` and `+foo` never collide.
    pub fn for_parts(kind: EntityKind, name: &str, flavor: Option<MethodFlavor>) -> Self {
        match flavor {
            Some(flavor) if kind == EntityKind::Method => {
                Self::new(kind, format!("{}{}", flavor.prefix(), name))
            }
            _ => Self::new(kind, name),
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

/// `@param` / `@exception` style entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedDescription {
    pub name: String,
    pub description: String,
}

/// Structured documentation comment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub raw: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<NamedDescription>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returns: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exceptions: Vec<NamedDescription>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub see_also: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bugs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<String>,
}

impl Comment {
    /// True when nothing but whitespace or delimiters was written.
    pub fn is_empty(&self) -> bool {
        self.short_description.is_none()
            && self.long_description.is_none()
            && self.parameters.is_empty()
            && self.returns.is_none()
            && self.exceptions.is_empty()
            && self.see_also.is_empty()
            && self.warnings.is_empty()
            && self.bugs.is_empty()
            && self.deprecated.is_none()
    }
}

/// Outcome of matching a category or extension to its base class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Resolved,
    Unresolved,
}

/// A model node as persisted in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub kind: EntityKind,
    pub name: String,
    /// Earliest declaration site.
    pub location: SourceLocation,
    pub declared_in: BTreeSet<SourceLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<Comment>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub signature: Vec<SignatureFragment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flavor: Option<MethodFlavor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superclass: Option<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub protocols: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_class: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    /// Back-reference to the owning node, by key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeKey>,
    #[serde(serialize_with = "values_in_key_order")]
    pub children: BTreeMap<NodeKey, Node>,
}

impl Node {
    pub fn from_entity(entity: Entity, comment: Option<Comment>) -> Self {
        let mut declared_in = BTreeSet::new();
        declared_in.insert(entity.location.clone());
        Self {
            kind: entity.kind,
            name: entity.name,
            location: entity.location,
            declared_in,
            comment,
            signature: entity.signature,
            flavor: entity.flavor,
            type_name: entity.type_name,
            superclass: entity.superclass,
            protocols: entity.protocols.into_iter().collect(),
            base_class: entity.base_class,
            attributes: entity.attributes,
            group: entity.group,
            resolution: None,
            parent: None,
            children: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> NodeKey {
        NodeKey::for_parts(self.kind, &self.name, self.flavor)
    }

    pub fn child(&self, kind: EntityKind, name: &str) -> Option<&Node> {
        self.children
            .values()
            .find(|c| c.kind == kind && c.name == name)
    }

    /// Children sorted by where they were first declared.
    pub fn children_in_source_order(&self) -> Vec<&Node> {
        let mut children: Vec<&Node> = self.children.values().collect();
        children.sort_by(|a, b| a.location.cmp(&b.location).then_with(|| a.key().cmp(&b.key())));
        children
    }

    pub fn is_documented(&self) -> bool {
        self.comment.as_ref().is_some_and(|c| !c.is_empty())
    }

    /// `Foo(Bar)` for categories, `-baz:` for methods, the bare name otherwise.
    pub fn display_name(&self) -> String {
        match self.kind {
            EntityKind::Category | EntityKind::ClassExtension => format!(
                "{}({})",
                self.base_class.as_deref().unwrap_or("?"),
                self.name
            ),
            EntityKind::Method => self.key().name,
            _ => self.name.clone(),
        }
    }
}

fn values_in_key_order<S: Serializer>(
    map: &BTreeMap<NodeKey, Node>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(map.values())
}
