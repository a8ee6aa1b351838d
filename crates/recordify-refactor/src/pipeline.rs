//! `classify → partition → rewrite → preserve_trivia`, applied per class.
//!
//! Classes are staged in parallel against the shared input tree, then the
//! output tree is rebuilt with member classes settled before their parents.
//! Reports keep declaration order.

use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};

use rayon::prelude::*;
use recordify_syntax::{
    line_of, parse, print, Modifier, Node, NodeId, ParseError, RecordDecl, SyntaxTree,
    TreeBuilder,
};
use serde::Serialize;

use crate::class::resolve_class;
use crate::classify::{classify_with_diagnostics, Classification, IneligibleReason};
use crate::error::{panic_payload_to_string, Diagnostic, StructuralAssumptionViolation};
use crate::partition::{partition, Partition};
use crate::rewrite::rewrite;
use crate::trivia::preserve_trivia;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClassOutcome {
    Unchanged {
        reason: IneligibleReason,
    },
    Rewritten {
        record: NodeId,
        components: Vec<String>,
        elided: usize,
        retained: usize,
    },
    Failed {
        violation: StructuralAssumptionViolation,
    },
}

impl ClassOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ClassOutcome::Unchanged { .. } => "unchanged",
            ClassOutcome::Rewritten { .. } => "rewritten",
            ClassOutcome::Failed { .. } => "failed",
        }
    }

    pub fn is_rewritten(&self) -> bool {
        matches!(self, ClassOutcome::Rewritten { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassReport {
    pub class: NodeId,
    pub name: String,
    /// 1-based line of the declaration in the input source (0 if unknown).
    pub line: usize,
    #[serde(flatten)]
    pub outcome: ClassOutcome,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
pub struct UnitConversion {
    pub tree: SyntaxTree,
    pub reports: Vec<ClassReport>,
}

impl UnitConversion {
    pub fn rewritten(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.outcome.is_rewritten())
            .count()
    }

    pub fn is_changed(&self) -> bool {
        self.rewritten() > 0
    }
}

enum Staged {
    Unchanged(IneligibleReason),
    Rewrite {
        record: RecordDecl,
        partition: Partition,
    },
    Failed(StructuralAssumptionViolation),
}

/// Convert every top-level class of `tree` and, recursively, their static
/// member classes. Inner (non-static) classes are left alone.
pub fn convert_unit(tree: &SyntaxTree) -> UnitConversion {
    let mut seen = HashSet::new();
    let mut targets = Vec::new();
    for &id in &tree.unit().types {
        collect_targets(tree, id, &mut seen, &mut targets);
    }
    apply(tree, &targets)
}

/// Convert the single declaration `class`, leaving its siblings untouched.
pub fn convert_class(tree: &SyntaxTree, class: NodeId) -> UnitConversion {
    apply(tree, &[class])
}

/// Classes in declaration order, each before the member classes it holds.
fn collect_targets(
    tree: &SyntaxTree,
    id: NodeId,
    seen: &mut HashSet<NodeId>,
    targets: &mut Vec<NodeId>,
) {
    let class = match tree.node(id) {
        Some(Node::Class(class)) => class,
        None => {
            if seen.insert(id) {
                targets.push(id);
            }
            return;
        }
        Some(_) => return,
    };
    if !seen.insert(id) {
        return;
    }
    targets.push(id);
    for &member in &class.members {
        if matches!(tree.node(member), Some(Node::Class(nested)) if nested.modifiers.has(Modifier::Static))
        {
            collect_targets(tree, member, seen, targets);
        }
    }
}

fn apply(tree: &SyntaxTree, targets: &[NodeId]) -> UnitConversion {
    let staged: Vec<(NodeId, Staged, Vec<Diagnostic>)> = targets
        .par_iter()
        .map(|&id| {
            let (staged, diagnostics) = stage_isolated(tree, id);
            (id, staged, diagnostics)
        })
        .collect();

    let mut outcomes = HashMap::with_capacity(staged.len());
    let mut rewrites = HashMap::new();
    let mut order = Vec::with_capacity(staged.len());
    for (id, staged, diagnostics) in staged {
        match staged {
            Staged::Rewrite { record, partition } => {
                rewrites.insert(id, (record, partition));
            }
            Staged::Unchanged(reason) => {
                outcomes.insert(id, ClassOutcome::Unchanged { reason });
            }
            Staged::Failed(violation) => {
                outcomes.insert(id, ClassOutcome::Failed { violation });
            }
        }
        order.push((id, diagnostics));
    }

    let mut rebuild = Rebuild {
        input: tree,
        builder: TreeBuilder::fork(tree),
        rewrites,
        outcomes,
        replaced: HashMap::new(),
        visiting: HashSet::new(),
    };
    let mut unit = tree.unit().clone();
    for slot in unit.types.iter_mut() {
        *slot = rebuild.node(*slot);
    }
    // Targets that are not reachable from the unit still get their record.
    let mut unreached: Vec<NodeId> = rebuild.rewrites.keys().copied().collect();
    unreached.sort();
    for id in unreached {
        rebuild.node(id);
    }

    let Rebuild {
        builder,
        mut outcomes,
        ..
    } = rebuild;
    let mut reports = Vec::with_capacity(order.len());
    for (id, diagnostics) in order {
        let Some(outcome) = outcomes.remove(&id) else {
            continue;
        };
        let report = report_for(tree, id, outcome, diagnostics);
        log_report(&report);
        reports.push(report);
    }

    UnitConversion {
        tree: builder.finish(unit),
        reports,
    }
}

/// Builds the output tree bottom-up: member classes are settled before the
/// class that holds them, so a parent record or an unchanged parent class can
/// point at the records that replaced its members.
struct Rebuild<'t> {
    input: &'t SyntaxTree,
    builder: TreeBuilder,
    rewrites: HashMap<NodeId, (RecordDecl, Partition)>,
    outcomes: HashMap<NodeId, ClassOutcome>,
    /// Input id to output id, for every class visited.
    replaced: HashMap<NodeId, NodeId>,
    visiting: HashSet<NodeId>,
}

impl Rebuild<'_> {
    fn node(&mut self, id: NodeId) -> NodeId {
        if let Some(&done) = self.replaced.get(&id) {
            return done;
        }
        let input = self.input;
        let Some(Node::Class(class)) = input.node(id) else {
            return id;
        };
        if !self.visiting.insert(id) {
            return id;
        }
        let members: Vec<NodeId> = class.members.iter().map(|&m| self.node(m)).collect();

        let output = match self.rewrites.remove(&id) {
            Some((mut record, partition)) => {
                for member in record.members.iter_mut() {
                    *member = self.replaced.get(member).copied().unwrap_or(*member);
                }
                let components = record.components.iter().map(|c| c.name.clone()).collect();
                let record_id = self.builder.alloc(Node::Record(record));
                preserve_trivia(
                    input.trivia(),
                    id,
                    &partition,
                    record_id,
                    self.builder.trivia_mut(),
                );
                self.outcomes.insert(
                    id,
                    ClassOutcome::Rewritten {
                        record: record_id,
                        components,
                        elided: partition.elided().count(),
                        retained: partition.retained().count(),
                    },
                );
                record_id
            }
            None if members != class.members => {
                let mut copy = class.clone();
                copy.members = members;
                let copy_id = self.builder.alloc(Node::Class(copy));
                if let Some(trivia) = self.builder.trivia_mut().remove(id) {
                    self.builder.trivia_mut().insert(copy_id, trivia);
                }
                copy_id
            }
            None => id,
        };

        self.visiting.remove(&id);
        self.replaced.insert(id, output);
        output
    }
}

fn log_report(report: &ClassReport) {
    match &report.outcome {
        ClassOutcome::Failed { violation } => tracing::warn!(
            target = "recordify.refactor",
            class = %report.name,
            line = report.line,
            error = %violation,
            "class left unchanged after a structural failure"
        ),
        ClassOutcome::Unchanged { reason } => tracing::debug!(
            target = "recordify.refactor",
            class = %report.name,
            reason = %reason,
            "class is not a record candidate"
        ),
        ClassOutcome::Rewritten {
            elided, retained, ..
        } => tracing::debug!(
            target = "recordify.refactor",
            class = %report.name,
            elided,
            retained,
            "class rewritten as record"
        ),
    }
}

fn report_for(
    tree: &SyntaxTree,
    id: NodeId,
    outcome: ClassOutcome,
    diagnostics: Vec<Diagnostic>,
) -> ClassReport {
    let node = tree.node(id);
    let name = node
        .and_then(Node::name)
        .unwrap_or("<unknown>")
        .to_string();
    let line = node
        .and_then(Node::verbatim)
        .map_or(0, |v| line_of(tree.source(), v.range.start));
    ClassReport {
        class: id,
        name,
        line,
        outcome,
        diagnostics,
    }
}

fn stage_isolated(tree: &SyntaxTree, id: NodeId) -> (Staged, Vec<Diagnostic>) {
    match catch_unwind(AssertUnwindSafe(|| stage_class(tree, id))) {
        Ok(staged) => staged,
        Err(panic) => {
            let message = panic_payload_to_string(panic.as_ref());
            (
                Staged::Failed(StructuralAssumptionViolation::Panicked { message }),
                Vec::new(),
            )
        }
    }
}

fn stage_class(tree: &SyntaxTree, id: NodeId) -> (Staged, Vec<Diagnostic>) {
    let view = match resolve_class(tree, id) {
        Ok(Some(view)) => view,
        Ok(None) => return (Staged::Unchanged(IneligibleReason::NotAClass), Vec::new()),
        Err(violation) => return (Staged::Failed(violation), Vec::new()),
    };

    let (classification, mut diagnostics) = classify_with_diagnostics(&view);
    let eligible = match classification {
        Classification::Eligible(eligible) => eligible,
        Classification::Ineligible(reason) => return (Staged::Unchanged(reason), diagnostics),
    };

    let partition = partition(&view, &eligible);
    diagnostics.extend(partition.diagnostics.iter().cloned());
    let record = rewrite(&view, &eligible, &partition);
    (Staged::Rewrite { record, partition }, diagnostics)
}

/// Result of converting one source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConversion {
    pub output: String,
    pub reports: Vec<ClassReport>,
}

impl SourceConversion {
    pub fn is_changed(&self) -> bool {
        self.reports.iter().any(|r| r.outcome.is_rewritten())
    }
}

/// Parse, convert and print `source`. Unchanged sources are returned as-is.
pub fn convert_source(source: &str) -> Result<SourceConversion, ParseError> {
    let tree = parse(source)?;
    let conversion = convert_unit(&tree);
    let output = if conversion.is_changed() {
        print(&conversion.tree)
    } else {
        source.to_string()
    };
    Ok(SourceConversion {
        output,
        reports: conversion.reports,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use recordify_syntax::{ClassDecl, CompilationUnit, Modifiers, TextRange, Verbatim};

    fn verbatim(text: &str) -> Verbatim {
        Verbatim {
            text: text.to_string(),
            indent: String::new(),
            range: TextRange::new(0, text.len()),
            extent: TextRange::new(0, text.len()),
        }
    }

    fn class_with_members(name: &str, members: Vec<NodeId>) -> Node {
        Node::Class(ClassDecl {
            name: name.to_string(),
            type_params: None,
            modifiers: Modifiers::default(),
            header_prefix: String::new(),
            extends: None,
            implements: None,
            permits: None,
            package: None,
            members,
            source: verbatim("class X {}"),
        })
    }

    #[test]
    fn structural_failure_is_contained_to_its_class() {
        let src = "class Good { private final int x; Good(int x) { this.x = x; } }\n";
        let input = parse(src).unwrap();

        let mut builder = TreeBuilder::fork(&input);
        let bogus = builder.alloc(class_with_members("Broken", vec![NodeId::from_raw(4242)]));
        let mut unit: CompilationUnit = input.unit().clone();
        unit.types.push(bogus);
        let tree = builder.finish(unit);

        let conversion = convert_unit(&tree);
        let outcomes: Vec<_> = conversion
            .reports
            .iter()
            .map(|r| (r.name.as_str(), r.outcome.label()))
            .collect();
        assert_eq!(outcomes, vec![("Good", "rewritten"), ("Broken", "failed")]);
        assert_eq!(
            conversion.reports[1].outcome,
            ClassOutcome::Failed {
                violation: StructuralAssumptionViolation::UnknownNode {
                    id: NodeId::from_raw(4242)
                }
            }
        );
        // The broken class stays in place.
        assert_eq!(conversion.tree.unit().types[1], bogus);
    }

    #[test]
    fn duplicate_and_foreign_members_are_violations() {
        let input = parse("import java.util.List;\nclass A { int a; }\n").unwrap();
        let (_, class) = input.classes().next().unwrap();
        let field = class.members[0];
        let import = input.unit().imports[0];

        let mut builder = TreeBuilder::fork(&input);
        let dup = builder.alloc(class_with_members("Dup", vec![field, field]));
        let foreign = builder.alloc(class_with_members("Foreign", vec![import]));
        let tree = builder.finish(CompilationUnit {
            types: vec![dup, foreign],
            ..CompilationUnit::default()
        });

        let conversion = convert_unit(&tree);
        assert_eq!(
            conversion.reports[0].outcome,
            ClassOutcome::Failed {
                violation: StructuralAssumptionViolation::DuplicateMember { id: field }
            }
        );
        assert!(matches!(
            &conversion.reports[1].outcome,
            ClassOutcome::Failed {
                violation: StructuralAssumptionViolation::NotAMember { id, node_kind }
            } if *id == import && node_kind == "Import"
        ));
    }

    #[test]
    fn input_tree_is_left_intact() {
        let src = "// c\nclass P { private final int x; P(int x) { this.x = x; } void keep() {} }\n";
        let input = parse(src).unwrap();
        let before_nodes = input.nodes().len();
        let before_trivia = input.trivia().clone();

        let conversion = convert_unit(&input);
        assert_eq!(conversion.rewritten(), 1);
        assert_eq!(input.nodes().len(), before_nodes);
        assert_eq!(input.trivia(), &before_trivia);
        assert!(input.classes().next().is_some());

        let (record_id, record) = conversion.tree.records().next().unwrap();
        let (class_id, class) = input.classes().next().unwrap();
        assert_eq!(record.origin, class_id);
        // Retained members are shared by id with the input tree.
        assert_eq!(record.members, vec![class.members[2]]);
        assert_eq!(
            conversion.tree.node(class.members[2]),
            input.node(class.members[2])
        );
        assert_eq!(conversion.tree.trivia().leading(record_id)[0].text, "// c");
    }

    #[test]
    fn convert_class_only_touches_the_requested_class() {
        let src = "class A { private final int a; A(int a) { this.a = a; } }\nclass B { private final int b; B(int b) { this.b = b; } }\n";
        let input = parse(src).unwrap();
        let b = input.find_type("B").unwrap();
        let conversion = convert_class(&input, b);
        assert_eq!(conversion.reports.len(), 1);
        assert_eq!(
            print(&conversion.tree),
            "class A { private final int a; A(int a) { this.a = a; } }\nrecord B(int b) {\n}\n"
        );
    }

    #[test]
    fn unchanged_source_is_returned_verbatim() {
        let src = "class A extends B { }\n";
        let conversion = convert_source(src).unwrap();
        assert!(!conversion.is_changed());
        assert_eq!(conversion.output, src);
        assert_eq!(
            conversion.reports[0].outcome,
            ClassOutcome::Unchanged {
                reason: IneligibleReason::ExtendsClass {
                    superclass: "B".into()
                }
            }
        );
        assert_eq!(conversion.reports[0].line, 1);
    }

    const NESTED: &str = concat!(
        "class Outer {\n",
        "    private int hits;\n",
        "\n",
        "    // a point\n",
        "    static final class Point { // xy\n",
        "        private final int x;\n",
        "\n",
        "        Point(int x) {\n",
        "            this.x = x;\n",
        "        }\n",
        "\n",
        "        static class Unit {\n",
        "            private final String name;\n",
        "\n",
        "            Unit(String name) {\n",
        "                this.name = name;\n",
        "            }\n",
        "        }\n",
        "    }\n",
        "\n",
        "    class Inner {\n",
        "        private final int y;\n",
        "\n",
        "        Inner(int y) {\n",
        "            this.y = y;\n",
        "        }\n",
        "    }\n",
        "}\n",
    );

    #[test]
    fn static_member_classes_are_converted_in_place() {
        let input = parse(NESTED).unwrap();
        let conversion = convert_unit(&input);

        let outcomes: Vec<_> = conversion
            .reports
            .iter()
            .map(|r| (r.name.as_str(), r.line, r.outcome.label()))
            .collect();
        assert_eq!(
            outcomes,
            vec![
                ("Outer", 1, "unchanged"),
                ("Point", 5, "rewritten"),
                ("Unit", 12, "rewritten"),
            ]
        );

        // The unchanged outer class is replaced by a copy pointing at the record.
        let outer_id = conversion.tree.unit().types[0];
        let Some(Node::Class(outer)) = conversion.tree.node(outer_id) else {
            panic!("expected class");
        };
        assert_ne!(outer_id, input.unit().types[0]);
        let point = outer.members[1];
        let Some(Node::Record(point_record)) = conversion.tree.node(point) else {
            panic!("expected record");
        };
        assert!(matches!(
            conversion.tree.node(point_record.members[0]),
            Some(Node::Record(unit)) if unit.name == "Unit"
        ));

        assert_eq!(
            print(&conversion.tree),
            concat!(
                "class Outer {\n",
                "    private int hits;\n",
                "    // a point\n",
                "    // xy\n",
                "    static final record Point(int x) {\n",
                "        static record Unit(String name) {\n",
                "        }\n",
                "    }\n",
                "\n",
                "    class Inner {\n",
                "        private final int y;\n",
                "\n",
                "        Inner(int y) {\n",
                "            this.y = y;\n",
                "        }\n",
                "    }\n",
                "}\n",
            )
        );
    }

    #[test]
    fn nested_records_survive_a_converted_parent() {
        let src = concat!(
            "final class Line {\n",
            "    private final Point from;\n",
            "\n",
            "    Line(Point from) {\n",
            "        this.from = from;\n",
            "    }\n",
            "\n",
            "    static class Point {\n",
            "        private final int x;\n",
            "\n",
            "        Point(int x) {\n",
            "            this.x = x;\n",
            "        }\n",
            "    }\n",
            "}\n",
        );
        let conversion = convert_source(src).unwrap();
        assert_eq!(
            conversion.output,
            concat!(
                "final record Line(Point from) {\n",
                "    static record Point(int x) {\n",
                "    }\n",
                "}\n",
            )
        );
        assert_eq!(conversion.reports.len(), 2);
        assert!(conversion.reports.iter().all(|r| r.outcome.is_rewritten()));

        let again = convert_source(&conversion.output).unwrap();
        assert!(!again.is_changed());
    }

    #[test]
    fn convert_class_reaches_a_member_class() {
        let input = parse(NESTED).unwrap();
        let (_, outer) = input.classes().next().unwrap();
        let point = outer.members[1];
        let conversion = convert_class(&input, point);
        assert_eq!(conversion.reports.len(), 1);
        assert!(conversion.reports[0].outcome.is_rewritten());
        let printed = print(&conversion.tree);
        assert!(printed.contains("    static final record Point(int x) {\n        static class Unit {\n"));
        assert!(printed.contains("    class Inner {\n"));
    }
}
