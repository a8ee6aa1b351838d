use pretty_assertions::assert_eq;
use proptest::prelude::*;

use recordify_refactor::{
    convert_files, convert_source, ClassOutcome, Diagnostic, FileInput, IneligibleReason,
    StructuralAssumptionViolation,
};
use recordify_syntax::NodeId;
use std::path::PathBuf;

#[test]
fn comments_follow_their_declarations() {
    let source = concat!(
        "package demo;\n",
        "\n",
        "import java.util.List;\n",
        "\n",
        "/**\n",
        " * A point.\n",
        " */\n",
        "public final class Point { // header\n",
        "    // x coordinate\n",
        "    private final int x; // trailing x\n",
        "    /** cached */\n",
        "    private static final Point ORIGIN = new Point(0);\n",
        "\n",
        "    Point(int x) {\n",
        "        this.x = x;\n",
        "    }\n",
        "\n",
        "    // describes\n",
        "    public String describe() {\n",
        "        return \"p\" + x;\n",
        "    }\n",
        "    // end of body\n",
        "}\n",
    );

    let conversion = convert_source(source).unwrap();
    assert_eq!(
        conversion.output,
        concat!(
            "package demo;\n",
            "\n",
            "import java.util.List;\n",
            "/**\n",
            " * A point.\n",
            " */\n",
            "// header\n",
            "public final record Point(int x) {\n",
            "    /** cached */\n",
            "    private static final Point ORIGIN = new Point(0);\n",
            "\n",
            "    // describes\n",
            "    public String describe() {\n",
            "        return \"p\" + x;\n",
            "    }\n",
            "    // end of body\n",
            "}\n",
        )
    );
}

#[test]
fn classes_in_one_file_are_converted_independently() {
    let source = concat!(
        "class A {\n",
        "    private final String name;\n",
        "\n",
        "    A(String name) {\n",
        "        this.name = name;\n",
        "    }\n",
        "\n",
        "    static class Builder {\n",
        "        private String name;\n",
        "    }\n",
        "}\n",
        "\n",
        "class B {\n",
        "    private int counter;\n",
        "\n",
        "    void bump() {\n",
        "        counter++;\n",
        "    }\n",
        "}\n",
    );

    let conversion = convert_source(source).unwrap();
    assert_eq!(
        conversion.output,
        concat!(
            "record A(String name) {\n",
            "    static class Builder {\n",
            "        private String name;\n",
            "    }\n",
            "}\n",
            "\n",
            "class B {\n",
            "    private int counter;\n",
            "\n",
            "    void bump() {\n",
            "        counter++;\n",
            "    }\n",
            "}\n",
        )
    );

    let names: Vec<_> = conversion.reports.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["A", "Builder", "B"]);
    assert_eq!(
        conversion.reports[1].outcome,
        ClassOutcome::Unchanged {
            reason: IneligibleReason::InstanceFieldNotComponent {
                field: "name".into()
            }
        }
    );
    let b = &conversion.reports[2];
    assert_eq!(b.line, 13);
    assert_eq!(
        b.outcome,
        ClassOutcome::Unchanged {
            reason: IneligibleReason::InstanceFieldNotComponent {
                field: "counter".into()
            }
        }
    );
}

#[test]
fn component_written_after_construction_blocks_the_rewrite() {
    let source = concat!(
        "class Counter {\n",
        "    private final int count;\n",
        "\n",
        "    Counter(int count) {\n",
        "        this.count = count;\n",
        "    }\n",
        "\n",
        "    void reset() {\n",
        "        this.count = 0;\n",
        "    }\n",
        "}\n",
    );
    let conversion = convert_source(source).unwrap();
    assert!(!conversion.is_changed());
    assert_eq!(conversion.output, source);
    assert_eq!(
        conversion.reports[0].outcome,
        ClassOutcome::Unchanged {
            reason: IneligibleReason::ComponentWrittenOutsideCanonicalConstructor {
                field: "count".into(),
                member: "reset()".into(),
            }
        }
    );
}

#[test]
fn mutable_instance_fields_block_the_rewrite() {
    let source = concat!(
        "class Cache {\n",
        "    private final String key;\n",
        "    transient int hits;\n",
        "\n",
        "    Cache(String key) {\n",
        "        this.key = key;\n",
        "    }\n",
        "}\n",
    );
    let conversion = convert_source(source).unwrap();
    assert!(!conversion.is_changed());
    assert_eq!(conversion.output, source);
    assert_eq!(
        conversion.reports[0].outcome,
        ClassOutcome::Unchanged {
            reason: IneligibleReason::InstanceFieldNotComponent {
                field: "hits".into()
            }
        }
    );
}

#[test]
fn review_diagnostics_are_reported_with_the_rewrite() {
    let source = concat!(
        "class Cache {\n",
        "    private final String key;\n",
        "    static int created;\n",
        "\n",
        "    Cache(String key) {\n",
        "        this.key = key;\n",
        "    }\n",
        "\n",
        "    String key() {\n",
        "        return key.trim();\n",
        "    }\n",
        "}\n",
    );
    let conversion = convert_source(source).unwrap();
    let report = &conversion.reports[0];
    assert!(report.outcome.is_rewritten());
    assert_eq!(
        report.diagnostics,
        vec![Diagnostic::NonPublicAccessor {
            method: "key".into()
        }]
    );
}

#[test]
fn empty_classes_keep_their_identity() {
    let source = "class Marker {\n    Marker() {}\n}\n";
    let conversion = convert_source(source).unwrap();
    assert_eq!(conversion.output, source);
    assert_eq!(
        conversion.reports[0].outcome,
        ClassOutcome::Unchanged {
            reason: IneligibleReason::NoComponents
        }
    );
}

#[test]
fn reports_serialize_with_flat_outcome_tags() {
    let conversion = convert_source("class A extends B {}\n").unwrap();
    let json = serde_json::to_value(&conversion.reports[0]).unwrap();
    assert_eq!(json["name"], "A");
    assert_eq!(json["line"], 1);
    assert_eq!(json["outcome"], "unchanged");
    assert_eq!(json["reason"]["kind"], "extends_class");
    assert_eq!(json["reason"]["superclass"], "B");
    assert_eq!(json["diagnostics"], serde_json::json!([]));

    let failed = ClassOutcome::Failed {
        violation: StructuralAssumptionViolation::NotAMember {
            id: NodeId::from_raw(7),
            node_kind: "Import".into(),
        },
    };
    assert_eq!(
        serde_json::to_value(&failed).unwrap(),
        serde_json::json!({
            "outcome": "failed",
            "violation": { "kind": "not_a_member", "id": 7, "node_kind": "Import" },
        })
    );
}

#[test]
fn parallel_batch_matches_sequential_conversion() {
    let inputs: Vec<FileInput> = (0..48)
        .map(|n| FileInput {
            path: PathBuf::from(format!("src/C{n}.java")),
            text: generated_class(n),
        })
        .collect();

    let expected: Vec<String> = inputs
        .iter()
        .map(|file| convert_source(&file.text).unwrap().output)
        .collect();

    for _ in 0..3 {
        let outputs: Vec<String> = convert_files(inputs.clone())
            .into_iter()
            .map(|c| c.result.unwrap().output)
            .collect();
        assert_eq!(outputs, expected);
    }
}

fn generated_class(n: usize) -> String {
    let fields = n % 4;
    let mut src = format!("package gen;\n\n// class {n}\npublic class C{n} {{\n");
    for i in 0..fields {
        src.push_str(&format!("    private final long f{i};\n"));
    }
    let params: Vec<String> = (0..fields).map(|i| format!("long f{i}")).collect();
    src.push_str(&format!("\n    public C{n}({}) {{\n", params.join(", ")));
    for i in 0..fields {
        src.push_str(&format!("        this.f{i} = f{i};\n"));
    }
    src.push_str("    }\n");
    if n % 3 == 0 {
        src.push_str("\n    public int tag() {\n        return 7;\n    }\n");
    }
    src.push_str("}\n");
    src
}

const TYPES: &[&str] = &["int", "String", "long", "List<String>", "byte[]"];

fn class_source(
    components: &[(usize, bool)],
    extra_method: bool,
    header_comment: bool,
) -> String {
    let mut src = String::new();
    if header_comment {
        src.push_str("/** generated */\n");
    }
    src.push_str("public class Gen {\n");
    for (i, (ty, _)) in components.iter().enumerate() {
        src.push_str(&format!("    private final {} c{i};\n", TYPES[*ty]));
    }
    let params: Vec<String> = components
        .iter()
        .enumerate()
        .map(|(i, (ty, _))| format!("{} c{i}", TYPES[*ty]))
        .collect();
    src.push_str(&format!("\n    Gen({}) {{\n", params.join(", ")));
    for i in 0..components.len() {
        src.push_str(&format!("        this.c{i} = c{i};\n"));
    }
    src.push_str("    }\n");
    for (i, (ty, accessor)) in components.iter().enumerate() {
        if *accessor {
            src.push_str(&format!(
                "\n    public {} c{i}() {{\n        return c{i};\n    }}\n",
                TYPES[*ty]
            ));
        }
    }
    if extra_method {
        src.push_str("\n    public String show() {\n        return \"gen\";\n    }\n");
    }
    src.push_str("}\n");
    src
}

proptest! {
    #[test]
    fn conversion_is_idempotent(
        components in prop::collection::vec((0..TYPES.len(), any::<bool>()), 1..5),
        extra_method in any::<bool>(),
        header_comment in any::<bool>(),
    ) {
        let source = class_source(&components, extra_method, header_comment);
        let once = convert_source(&source).unwrap();
        prop_assert!(once.is_changed());
        prop_assert!(once.output.contains("record Gen("));
        prop_assert_eq!(header_comment, once.output.starts_with("/** generated */\n"));
        prop_assert_eq!(extra_method, once.output.contains("public String show()"));
        // Trivial accessors are always provided by the record.
        prop_assert!(!once.output.contains("return c"));

        let twice = convert_source(&once.output).unwrap();
        prop_assert!(!twice.is_changed());
        prop_assert_eq!(twice.output, once.output);
    }

    #[test]
    fn ineligible_sources_are_untouched(
        components in prop::collection::vec((0..TYPES.len(), any::<bool>()), 0..5),
    ) {
        let source = class_source(&components, true, true)
            .replace("public class Gen {", "public class Gen extends Base {");
        let conversion = convert_source(&source).unwrap();
        prop_assert!(!conversion.is_changed());
        prop_assert_eq!(conversion.output, source);
    }
}
