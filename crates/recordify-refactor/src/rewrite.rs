use recordify_syntax::RecordDecl;

use crate::class::ClassView;
use crate::classify::{Component, Eligible};
use crate::partition::Partition;

/// Assemble the record that replaces `view`.
///
/// The header keeps the class's name, type parameters, modifiers and
/// annotations (as the verbatim prefix before `class`), implements clause
/// and package. Retained members keep their ids and relative order.
pub fn rewrite(view: &ClassView<'_>, eligible: &Eligible, partition: &Partition) -> RecordDecl {
    let class = view.class;
    RecordDecl {
        name: class.name.clone(),
        type_params: class.type_params.clone(),
        modifiers: class.modifiers.clone(),
        header_prefix: class.header_prefix.clone(),
        implements: class.implements.clone(),
        package: class.package.clone(),
        components: eligible
            .components
            .iter()
            .map(Component::to_record_component)
            .collect(),
        members: partition.retained().collect(),
        indent: class.source.indent.clone(),
        extent: class.source.extent,
        origin: view.id,
    }
}
