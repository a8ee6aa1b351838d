//! Candidate classification: decides whether a class can become a record and
//! extracts its components and canonical constructor.

use recordify_syntax::{
    scan_declared_names, scan_writes, AssignOp, ConstructorDecl, Modifier, Node, NodeId,
    RecordComponent, Stmt, SyntaxTree,
};
use serde::Serialize;
use thiserror::Error;

use crate::class::{resolve_class, ClassView};
use crate::error::{Diagnostic, StructuralAssumptionViolation};

/// A record component together with the field it is derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub field: NodeId,
    pub name: String,
    pub ty: String,
    pub annotations: Vec<String>,
}

impl Component {
    pub fn to_record_component(&self) -> RecordComponent {
        RecordComponent {
            name: self.name.clone(),
            ty: self.ty.clone(),
            annotations: self.annotations.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eligible {
    /// Components in field declaration order.
    pub components: Vec<Component>,
    pub canonical: NodeId,
}

impl Eligible {
    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn is_component_field(&self, id: NodeId) -> bool {
        self.components.iter().any(|c| c.field == id)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IneligibleReason {
    #[error("not a class declaration")]
    NotAClass,
    #[error("extends `{superclass}`")]
    ExtendsClass { superclass: String },
    #[error("`{modifier}` classes cannot become records")]
    IncompatibleModifier { modifier: String },
    #[error("declares an instance initializer")]
    InstanceInitializer,
    #[error("`{declaration}` declares several fields in one statement")]
    MultipleDeclarators { declaration: String },
    #[error("instance field `{field}` is not private and final")]
    InstanceFieldNotComponent { field: String },
    #[error("declares no private final instance fields")]
    NoComponents,
    #[error("no constructor only assigns every component from its parameters in order")]
    NoCanonicalConstructor,
    #[error("component `{field}` is assigned in `{member}`")]
    ComponentWrittenOutsideCanonicalConstructor { field: String, member: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Eligible(Eligible),
    Ineligible(IneligibleReason),
}

impl Classification {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Classification::Eligible(_))
    }
}

/// Classify the node `id` of `tree`. Nodes that are not classes are
/// `Ineligible(NotAClass)`.
pub fn classify(
    tree: &SyntaxTree,
    id: NodeId,
) -> Result<Classification, StructuralAssumptionViolation> {
    Ok(match resolve_class(tree, id)? {
        Some(view) => classify_class(&view),
        None => Classification::Ineligible(IneligibleReason::NotAClass),
    })
}

/// Whether the class `id` would be rewritten. Structural problems count as
/// ineligible.
pub fn is_eligible(tree: &SyntaxTree, id: NodeId) -> bool {
    classify(tree, id).is_ok_and(|c| c.is_eligible())
}

pub fn classify_class(view: &ClassView<'_>) -> Classification {
    classify_with_diagnostics(view).0
}

/// Like [`classify_class`], also returning review diagnostics raised while
/// classifying. Diagnostics are reported whatever the outcome.
pub fn classify_with_diagnostics(view: &ClassView<'_>) -> (Classification, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();
    let classification = match analyze(view, &mut diagnostics) {
        Ok(eligible) => Classification::Eligible(eligible),
        Err(reason) => Classification::Ineligible(reason),
    };
    (classification, diagnostics)
}

fn analyze(
    view: &ClassView<'_>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Eligible, IneligibleReason> {
    let class = view.class;

    if let Some(superclass) = &class.extends {
        let superclass = compact(superclass);
        if superclass != "Object" && superclass != "java.lang.Object" {
            return Err(IneligibleReason::ExtendsClass { superclass });
        }
    }

    for modifier in [Modifier::Abstract, Modifier::Sealed, Modifier::NonSealed] {
        if class.modifiers.has(modifier) {
            return Err(IneligibleReason::IncompatibleModifier {
                modifier: modifier.as_str().to_string(),
            });
        }
    }

    if view
        .members
        .iter()
        .any(|m| matches!(m.node, Node::Initializer(init) if !init.is_static))
    {
        return Err(IneligibleReason::InstanceInitializer);
    }

    let mut components = Vec::new();
    for (id, field) in view.fields() {
        let modifiers = &field.modifiers;
        if modifiers.has(Modifier::Static) {
            continue;
        }
        // Records cannot declare instance fields besides their components.
        if !modifiers.has(Modifier::Private) || !modifiers.has(Modifier::Final) {
            return Err(IneligibleReason::InstanceFieldNotComponent {
                field: field.name.clone(),
            });
        }
        if field.declarators > 1 {
            return Err(IneligibleReason::MultipleDeclarators {
                declaration: field.source.text.clone(),
            });
        }
        components.push(Component {
            field: id,
            name: field.name.clone(),
            ty: field.ty.clone(),
            annotations: field.modifiers.annotations.clone(),
        });
    }
    if components.is_empty() {
        return Err(IneligibleReason::NoComponents);
    }

    let canonical: Vec<NodeId> = view
        .constructors()
        .filter(|(_, ctor)| is_canonical_constructor(ctor, &components))
        .map(|(id, _)| id)
        .collect();
    let Some(&canonical_id) = canonical.first() else {
        return Err(IneligibleReason::NoCanonicalConstructor);
    };

    if canonical.len() > 1 {
        diagnostics.push(Diagnostic::AmbiguousCanonicalConstructor {
            candidates: canonical.len(),
        });
    }

    for member in &view.members {
        if member.id == canonical_id {
            continue;
        }
        if let Some(field) = component_written_by(member.node, &components) {
            return Err(IneligibleReason::ComponentWrittenOutsideCanonicalConstructor {
                field,
                member: describe_member(member.node),
            });
        }
    }

    Ok(Eligible {
        components,
        canonical: canonical_id,
    })
}

/// `this.c1 = p1; ... this.cN = pN;` with parameters positionally matching
/// the component types, and nothing else.
fn is_canonical_constructor(ctor: &ConstructorDecl, components: &[Component]) -> bool {
    if ctor.params.len() != components.len() || ctor.body.statements.len() != components.len() {
        return false;
    }
    let types_match = ctor
        .params
        .iter()
        .zip(components)
        .all(|(param, component)| same_type(&param.ty, &component.ty));
    if !types_match {
        return false;
    }

    ctor.body
        .statements
        .iter()
        .zip(ctor.params.iter().zip(components))
        .all(|(stmt, (param, component))| match stmt {
            Stmt::Assign {
                target,
                op: AssignOp::Assign,
                value: Some(value),
                ..
            } => target.is_this_field(&component.name) && value.is_name(&param.name),
            _ => false,
        })
}

/// The first component assigned anywhere in `node`.
fn component_written_by(node: &Node, components: &[Component]) -> Option<String> {
    let (text, params): (&str, Vec<&str>) = match node {
        Node::Constructor(ctor) => (
            ctor.body.text.as_str(),
            ctor.params.iter().map(|p| p.name.as_str()).collect(),
        ),
        Node::Method(method) => (
            method.body.as_ref()?.text.as_str(),
            method.params.iter().map(|p| p.name.as_str()).collect(),
        ),
        Node::Initializer(init) => (init.body.text.as_str(), Vec::new()),
        Node::Field(field) => (field.initializer.as_deref()?, Vec::new()),
        _ => return None,
    };

    let writes = scan_writes(text).unwrap_or_default();
    if writes.is_empty() {
        return None;
    }
    let locals = scan_declared_names(text).unwrap_or_default();
    let shadowed = |name: &str| params.contains(&name) || locals.iter().any(|l| l == name);

    writes
        .into_iter()
        .find(|write| {
            components.iter().any(|c| c.name == write.name)
                && (write.qualified || !shadowed(&write.name))
        })
        .map(|write| write.name)
}

pub(crate) fn describe_member(node: &Node) -> String {
    match node {
        Node::Constructor(ctor) => {
            let params: Vec<&str> = ctor.params.iter().map(|p| p.ty.as_str()).collect();
            format!("{}({})", ctor.name, params.join(", "))
        }
        Node::Method(method) => {
            let params: Vec<&str> = method.params.iter().map(|p| p.ty.as_str()).collect();
            format!("{}({})", method.name, params.join(", "))
        }
        Node::Initializer(init) if init.is_static => "static initializer".to_string(),
        Node::Initializer(_) => "instance initializer".to_string(),
        other => other.name().unwrap_or("<member>").to_string(),
    }
}

/// Type equality ignoring whitespace; varargs equal arrays.
pub(crate) fn same_type(a: &str, b: &str) -> bool {
    compact(a).replace("...", "[]") == compact(b).replace("...", "[]")
}

fn compact(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}
