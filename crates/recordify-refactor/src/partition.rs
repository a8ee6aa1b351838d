//! Member partitioning: which members the record provides implicitly and which
//! are carried over verbatim.

use recordify_syntax::{MethodDecl, Modifier, Node, NodeId, Stmt};
use serde::Serialize;

use crate::class::ClassView;
use crate::classify::{same_type, Eligible};
use crate::error::Diagnostic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElideReason {
    CanonicalConstructor,
    ComponentField,
    TrivialAccessor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Elide(ElideReason),
    RetainVerbatim,
}

/// One disposition per member, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub dispositions: Vec<(NodeId, Disposition)>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Partition {
    pub fn disposition(&self, id: NodeId) -> Option<Disposition> {
        self.dispositions
            .iter()
            .find(|(member, _)| *member == id)
            .map(|(_, d)| *d)
    }

    pub fn retained(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.dispositions
            .iter()
            .filter(|(_, d)| *d == Disposition::RetainVerbatim)
            .map(|(id, _)| *id)
    }

    pub fn elided(&self) -> impl Iterator<Item = (NodeId, ElideReason)> + '_ {
        self.dispositions.iter().filter_map(|(id, d)| match d {
            Disposition::Elide(reason) => Some((*id, *reason)),
            Disposition::RetainVerbatim => None,
        })
    }
}

pub fn partition(view: &ClassView<'_>, eligible: &Eligible) -> Partition {
    let mut dispositions = Vec::with_capacity(view.members.len());
    let mut diagnostics = Vec::new();

    for member in &view.members {
        let disposition = if member.id == eligible.canonical {
            Disposition::Elide(ElideReason::CanonicalConstructor)
        } else if eligible.is_component_field(member.id) {
            Disposition::Elide(ElideReason::ComponentField)
        } else {
            match member.node {
                Node::Method(method) if is_trivial_accessor(method, eligible) => {
                    Disposition::Elide(ElideReason::TrivialAccessor)
                }
                Node::Method(method) => {
                    if is_accessor_shaped(method, eligible) && !method.modifiers.has(Modifier::Public)
                    {
                        diagnostics.push(Diagnostic::NonPublicAccessor {
                            method: method.name.clone(),
                        });
                    }
                    Disposition::RetainVerbatim
                }
                _ => Disposition::RetainVerbatim,
            }
        };
        dispositions.push((member.id, disposition));
    }

    Partition {
        dispositions,
        diagnostics,
    }
}

/// Zero parameters, not static, not generic, named and typed like a
/// component.
fn is_accessor_shaped(method: &MethodDecl, eligible: &Eligible) -> bool {
    method.params.is_empty()
        && method.type_params.is_none()
        && !method.modifiers.has(Modifier::Static)
        && eligible
            .component(&method.name)
            .is_some_and(|c| same_type(&method.return_ty, &c.ty))
}

/// An accessor-shaped method whose body is exactly `return f;` or
/// `return this.f;`. Annotations other than `@Override` keep it.
fn is_trivial_accessor(method: &MethodDecl, eligible: &Eligible) -> bool {
    if !is_accessor_shaped(method, eligible) {
        return false;
    }
    if method
        .modifiers
        .annotations
        .iter()
        .any(|a| recordify_syntax::annotation_simple_name(a) != "Override")
    {
        return false;
    }
    let Some(body) = &method.body else {
        return false;
    };
    match body.statements.as_slice() {
        [Stmt::Return {
            value: Some(value), ..
        }] => value.is_name(&method.name) || value.is_this_field(&method.name),
        _ => false,
    }
}
