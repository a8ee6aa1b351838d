//! Arena-backed syntax tree.
//!
//! Nodes are immutable once allocated. A transform forks the input tree with
//! [`TreeBuilder::fork`], appends new nodes and finishes with a new
//! [`CompilationUnit`]; every node it does not replace keeps its id.

use std::sync::Arc;

use crate::trivia::TriviaTable;
use crate::{Arena, NodeId, TextRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Public,
    Protected,
    Private,
    Static,
    Final,
    Abstract,
    Native,
    Synchronized,
    Transient,
    Volatile,
    Strictfp,
    Default,
    Sealed,
    NonSealed,
}

impl Modifier {
    pub fn from_keyword(text: &str) -> Option<Self> {
        Some(match text {
            "public" => Modifier::Public,
            "protected" => Modifier::Protected,
            "private" => Modifier::Private,
            "static" => Modifier::Static,
            "final" => Modifier::Final,
            "abstract" => Modifier::Abstract,
            "native" => Modifier::Native,
            "synchronized" => Modifier::Synchronized,
            "transient" => Modifier::Transient,
            "volatile" => Modifier::Volatile,
            "strictfp" => Modifier::Strictfp,
            "default" => Modifier::Default,
            "sealed" => Modifier::Sealed,
            "non-sealed" => Modifier::NonSealed,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Modifier::Public => "public",
            Modifier::Protected => "protected",
            Modifier::Private => "private",
            Modifier::Static => "static",
            Modifier::Final => "final",
            Modifier::Abstract => "abstract",
            Modifier::Native => "native",
            Modifier::Synchronized => "synchronized",
            Modifier::Transient => "transient",
            Modifier::Volatile => "volatile",
            Modifier::Strictfp => "strictfp",
            Modifier::Default => "default",
            Modifier::Sealed => "sealed",
            Modifier::NonSealed => "non-sealed",
        }
    }
}

/// Keyword modifiers plus annotations, each annotation kept as written
/// (`@Deprecated`, `@SuppressWarnings("unused")`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub keywords: Vec<Modifier>,
    pub annotations: Vec<String>,
}

impl Modifiers {
    pub fn has(&self, modifier: Modifier) -> bool {
        self.keywords.contains(&modifier)
    }

    /// Matches `@Name`, `@pkg.Name` and `@Name(...)` against a simple name.
    pub fn has_annotation(&self, simple_name: &str) -> bool {
        self.annotations
            .iter()
            .any(|a| annotation_simple_name(a) == simple_name)
    }
}

pub fn annotation_simple_name(annotation: &str) -> &str {
    let name = annotation.trim_start_matches('@');
    let name = name.split('(').next().unwrap_or(name).trim();
    name.rsplit('.').next().unwrap_or(name).trim()
}

/// Source text of a node as parsed.
///
/// `range` covers the node's own tokens; `extent` additionally covers the
/// whitespace and comments before it (back to the previous sibling) and any
/// comments trailing it on the same line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verbatim {
    pub text: String,
    pub indent: String,
    pub range: TextRange,
    pub extent: TextRange,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilationUnit {
    pub package: Option<NodeId>,
    pub imports: Vec<NodeId>,
    pub types: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDecl {
    pub name: String,
    pub source: Verbatim,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    pub path: String,
    pub is_static: bool,
    pub is_star: bool,
    pub source: Verbatim,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDecl {
    pub name: String,
    /// `<T extends Comparable<T>>`, including the angle brackets.
    pub type_params: Option<String>,
    pub modifiers: Modifiers,
    /// Everything before the `class` keyword, verbatim (annotations, modifiers
    /// and comments between them).
    pub header_prefix: String,
    pub extends: Option<String>,
    pub implements: Option<String>,
    pub permits: Option<String>,
    pub package: Option<String>,
    pub members: Vec<NodeId>,
    pub source: Verbatim,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordComponent {
    pub name: String,
    pub ty: String,
    pub annotations: Vec<String>,
}

impl RecordComponent {
    pub fn render(&self) -> String {
        let mut out = String::new();
        for annotation in &self.annotations {
            out.push_str(annotation);
            out.push(' ');
        }
        out.push_str(&self.ty);
        out.push(' ');
        out.push_str(&self.name);
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDecl {
    pub name: String,
    pub type_params: Option<String>,
    pub modifiers: Modifiers,
    pub header_prefix: String,
    pub implements: Option<String>,
    pub package: Option<String>,
    pub components: Vec<RecordComponent>,
    pub members: Vec<NodeId>,
    pub indent: String,
    /// Source extent of the declaration this record replaces.
    pub extent: TextRange,
    /// Id of the class this record was rewritten from.
    pub origin: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: String,
    pub modifiers: Modifiers,
    /// Index of the field among its class's members.
    pub position: usize,
    pub initializer: Option<String>,
    /// Number of variables declared by the statement (`int a, b;` has two).
    pub declarators: usize,
    pub source: Verbatim,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: String,
    pub modifiers: Modifiers,
    pub varargs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprShape {
    /// A bare identifier.
    Name,
    /// `this.<ident>`.
    ThisField,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub text: String,
    pub shape: ExprShape,
}

impl Expr {
    /// Identifier named by a `Name` or `ThisField` expression.
    pub fn ident(&self) -> Option<&str> {
        match self.shape {
            ExprShape::Name => Some(self.text.as_str()),
            ExprShape::ThisField => self.text.strip_prefix("this").map(|rest| {
                rest.trim_start()
                    .trim_start_matches('.')
                    .trim_start()
            }),
            ExprShape::Other => None,
        }
    }

    pub fn is_this_field(&self, name: &str) -> bool {
        self.shape == ExprShape::ThisField && self.ident() == Some(name)
    }

    pub fn is_name(&self, name: &str) -> bool {
        self.shape == ExprShape::Name && self.text == name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    /// `+=`, `<<=`, `>>>=`, ...
    Compound(String),
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    This,
    Super,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Assign {
        target: Expr,
        op: AssignOp,
        value: Option<Expr>,
        text: String,
    },
    Return {
        value: Option<Expr>,
        text: String,
    },
    LocalVar {
        ty: String,
        name: String,
        init: Option<Expr>,
        text: String,
    },
    ConstructorCall {
        kind: CallKind,
        args: String,
        text: String,
    },
    Other {
        text: String,
    },
}

impl Stmt {
    pub fn text(&self) -> &str {
        match self {
            Stmt::Assign { text, .. }
            | Stmt::Return { text, .. }
            | Stmt::LocalVar { text, .. }
            | Stmt::ConstructorCall { text, .. }
            | Stmt::Other { text } => text,
        }
    }
}

/// A braced block: its verbatim text plus its top-level statements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    pub text: String,
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructorDecl {
    pub name: String,
    pub modifiers: Modifiers,
    pub type_params: Option<String>,
    pub params: Vec<Param>,
    pub body: Body,
    pub source: Verbatim,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDecl {
    pub name: String,
    pub modifiers: Modifiers,
    pub type_params: Option<String>,
    pub return_ty: String,
    pub params: Vec<Param>,
    /// `None` for abstract and native methods.
    pub body: Option<Body>,
    pub source: Verbatim,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializerDecl {
    pub is_static: bool,
    pub body: Body,
    pub source: Verbatim,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpaqueKind {
    Class,
    Interface,
    Enum,
    Record,
    Annotation,
    Empty,
    Unknown,
}

/// A declaration kept only as text: interfaces, enums, records, annotation
/// types, stray semicolons and anything the parser does not model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueDecl {
    pub kind: OpaqueKind,
    pub name: Option<String>,
    pub source: Verbatim,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Package,
    Import,
    Class,
    Record,
    Field,
    Constructor,
    Method,
    Initializer,
    Opaque,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Package(PackageDecl),
    Import(ImportDecl),
    Class(ClassDecl),
    Record(RecordDecl),
    Field(FieldDecl),
    Constructor(ConstructorDecl),
    Method(MethodDecl),
    Initializer(InitializerDecl),
    Opaque(OpaqueDecl),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Package(_) => NodeKind::Package,
            Node::Import(_) => NodeKind::Import,
            Node::Class(_) => NodeKind::Class,
            Node::Record(_) => NodeKind::Record,
            Node::Field(_) => NodeKind::Field,
            Node::Constructor(_) => NodeKind::Constructor,
            Node::Method(_) => NodeKind::Method,
            Node::Initializer(_) => NodeKind::Initializer,
            Node::Opaque(_) => NodeKind::Opaque,
        }
    }

    /// Whether the node may appear in a class or record body.
    pub fn is_member(&self) -> bool {
        matches!(
            self,
            Node::Class(_)
                | Node::Record(_)
                | Node::Field(_)
                | Node::Constructor(_)
                | Node::Method(_)
                | Node::Initializer(_)
                | Node::Opaque(_)
        )
    }

    pub fn verbatim(&self) -> Option<&Verbatim> {
        match self {
            Node::Package(n) => Some(&n.source),
            Node::Import(n) => Some(&n.source),
            Node::Class(n) => Some(&n.source),
            Node::Field(n) => Some(&n.source),
            Node::Constructor(n) => Some(&n.source),
            Node::Method(n) => Some(&n.source),
            Node::Initializer(n) => Some(&n.source),
            Node::Opaque(n) => Some(&n.source),
            Node::Record(_) => None,
        }
    }

    pub fn extent(&self) -> TextRange {
        match self {
            Node::Record(r) => r.extent,
            other => other
                .verbatim()
                .map(|v| v.extent)
                .unwrap_or_default(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Node::Package(n) => Some(&n.name),
            Node::Import(n) => Some(&n.path),
            Node::Class(n) => Some(&n.name),
            Node::Record(n) => Some(&n.name),
            Node::Field(n) => Some(&n.name),
            Node::Constructor(n) => Some(&n.name),
            Node::Method(n) => Some(&n.name),
            Node::Initializer(_) => None,
            Node::Opaque(n) => n.name.as_deref(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyntaxTree {
    source: Arc<str>,
    nodes: Arena<Node>,
    trivia: TriviaTable,
    unit: CompilationUnit,
}

impl SyntaxTree {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn unit(&self) -> &CompilationUnit {
        &self.unit
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> &Arena<Node> {
        &self.nodes
    }

    pub fn trivia(&self) -> &TriviaTable {
        &self.trivia
    }

    pub fn class(&self, id: NodeId) -> Option<&ClassDecl> {
        match self.node(id)? {
            Node::Class(class) => Some(class),
            _ => None,
        }
    }

    pub fn record(&self, id: NodeId) -> Option<&RecordDecl> {
        match self.node(id)? {
            Node::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Top-level class declarations in declaration order.
    pub fn classes(&self) -> impl Iterator<Item = (NodeId, &ClassDecl)> {
        self.unit
            .types
            .iter()
            .filter_map(|&id| self.class(id).map(|class| (id, class)))
    }

    /// Top-level record declarations in declaration order.
    pub fn records(&self) -> impl Iterator<Item = (NodeId, &RecordDecl)> {
        self.unit
            .types
            .iter()
            .filter_map(|&id| self.record(id).map(|record| (id, record)))
    }

    pub fn find_type(&self, name: &str) -> Option<NodeId> {
        self.unit
            .types
            .iter()
            .copied()
            .find(|&id| self.node(id).and_then(Node::name) == Some(name))
    }
}

/// Builds a [`SyntaxTree`], either from scratch or on top of an existing one.
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    source: Arc<str>,
    nodes: Arena<Node>,
    trivia: TriviaTable,
}

impl TreeBuilder {
    pub fn new(source: impl Into<Arc<str>>) -> Self {
        TreeBuilder {
            source: source.into(),
            nodes: Arena::default(),
            trivia: TriviaTable::default(),
        }
    }

    /// Start from `tree`'s nodes and trivia; existing ids stay valid.
    pub fn fork(tree: &SyntaxTree) -> Self {
        TreeBuilder {
            source: Arc::clone(&tree.source),
            nodes: tree.nodes.clone(),
            trivia: tree.trivia.clone(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn alloc(&mut self, node: Node) -> NodeId {
        self.nodes.alloc(node)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn trivia(&self) -> &TriviaTable {
        &self.trivia
    }

    pub fn trivia_mut(&mut self) -> &mut TriviaTable {
        &mut self.trivia
    }

    pub fn finish(self, unit: CompilationUnit) -> SyntaxTree {
        SyntaxTree {
            source: self.source,
            nodes: self.nodes,
            trivia: self.trivia,
            unit,
        }
    }
}
