use std::collections::HashSet;

use recordify_syntax::{
    lex, Body, ClassDecl, ConstructorDecl, FieldDecl, MethodDecl, Node, NodeId, SyntaxTree,
};

use crate::error::StructuralAssumptionViolation;

/// A class declaration with its member list resolved against the tree.
///
/// Construction checks every structural assumption the conversion relies on,
/// so the classifier, partitioner and rewriter can be total over it.
#[derive(Debug, Clone)]
pub struct ClassView<'t> {
    pub id: NodeId,
    pub class: &'t ClassDecl,
    pub members: Vec<Member<'t>>,
}

#[derive(Debug, Clone, Copy)]
pub struct Member<'t> {
    pub id: NodeId,
    pub node: &'t Node,
}

impl<'t> ClassView<'t> {
    pub fn name(&self) -> &'t str {
        &self.class.name
    }

    pub fn fields(&self) -> impl Iterator<Item = (NodeId, &'t FieldDecl)> + '_ {
        self.members.iter().filter_map(|m| match m.node {
            Node::Field(field) => Some((m.id, field)),
            _ => None,
        })
    }

    pub fn constructors(&self) -> impl Iterator<Item = (NodeId, &'t ConstructorDecl)> + '_ {
        self.members.iter().filter_map(|m| match m.node {
            Node::Constructor(ctor) => Some((m.id, ctor)),
            _ => None,
        })
    }

    pub fn methods(&self) -> impl Iterator<Item = (NodeId, &'t MethodDecl)> + '_ {
        self.members.iter().filter_map(|m| match m.node {
            Node::Method(method) => Some((m.id, method)),
            _ => None,
        })
    }
}

/// Resolve `id` to a class view. Returns `Ok(None)` when the node exists but
/// is not a class declaration.
pub fn resolve_class(
    tree: &SyntaxTree,
    id: NodeId,
) -> Result<Option<ClassView<'_>>, StructuralAssumptionViolation> {
    let node = tree
        .node(id)
        .ok_or(StructuralAssumptionViolation::UnknownNode { id })?;
    let Node::Class(class) = node else {
        return Ok(None);
    };

    let mut seen = HashSet::with_capacity(class.members.len());
    let mut last_field_position: Option<usize> = None;
    let mut members = Vec::with_capacity(class.members.len());

    for &member in &class.members {
        let node = tree
            .node(member)
            .ok_or(StructuralAssumptionViolation::UnknownNode { id: member })?;
        if !node.is_member() {
            return Err(StructuralAssumptionViolation::NotAMember {
                id: member,
                node_kind: format!("{:?}", node.kind()),
            });
        }
        if !seen.insert(member) {
            return Err(StructuralAssumptionViolation::DuplicateMember { id: member });
        }

        match node {
            Node::Field(field) => {
                if last_field_position.is_some_and(|prev| field.position <= prev) {
                    return Err(StructuralAssumptionViolation::FieldOutOfOrder {
                        field: field.name.clone(),
                        position: field.position,
                    });
                }
                last_field_position = Some(field.position);
            }
            Node::Constructor(ctor) => check_body(&ctor.name, Some(&ctor.body))?,
            Node::Method(method) => check_body(&method.name, method.body.as_ref())?,
            Node::Initializer(init) => {
                let label = if init.is_static {
                    "static initializer"
                } else {
                    "instance initializer"
                };
                check_body(label, Some(&init.body))?;
            }
            _ => {}
        }

        members.push(Member { id: member, node });
    }

    Ok(Some(ClassView { id, class, members }))
}

fn check_body(member: &str, body: Option<&Body>) -> Result<(), StructuralAssumptionViolation> {
    let Some(body) = body else {
        return Ok(());
    };
    let text = body.text.trim();
    if text.starts_with('{') && text.ends_with('}') && lex(text).is_ok() {
        Ok(())
    } else {
        Err(StructuralAssumptionViolation::MalformedBody {
            member: member.to_string(),
        })
    }
}
