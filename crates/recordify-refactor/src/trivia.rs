use recordify_syntax::{NodeId, TriviaTable};

use crate::partition::Partition;

/// Carry comments across the rewrite of `class` into `record`.
///
/// `output` starts as a copy of `input`, so retained members already keep
/// their comments. Comments bound only to elided members are dropped, and the
/// class's own comments (leading, trailing and dangling) move to the record.
pub fn preserve_trivia(
    input: &TriviaTable,
    class: NodeId,
    partition: &Partition,
    record: NodeId,
    output: &mut TriviaTable,
) {
    for (member, _) in partition.elided() {
        if let Some(dropped) = output.remove(member) {
            tracing::trace!(
                target = "recordify.refactor",
                member = %member,
                comments = dropped.leading.len() + dropped.trailing.len() + dropped.dangling.len(),
                "dropping comments of elided member"
            );
        }
    }

    for member in partition.retained() {
        if let Some(trivia) = input.get(member) {
            output.insert(member, trivia.clone());
        }
    }

    output.remove(class);
    if let Some(trivia) = input.get(class) {
        output.insert(record, trivia.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::{Disposition, ElideReason};
    use pretty_assertions::assert_eq;
    use recordify_syntax::{Comment, CommentKind, TextRange, Trivia};

    fn comment(text: &str) -> Comment {
        Comment {
            kind: CommentKind::Line,
            text: text.to_string(),
            range: TextRange::default(),
        }
    }

    fn leading(text: &str) -> Trivia {
        Trivia {
            leading: vec![comment(text)],
            ..Trivia::default()
        }
    }

    #[test]
    fn moves_class_comments_and_drops_elided_ones() {
        let class = NodeId::from_raw(0);
        let field = NodeId::from_raw(1);
        let method = NodeId::from_raw(2);
        let record = NodeId::from_raw(3);

        let mut input = TriviaTable::default();
        input.insert(class, leading("// class"));
        input.insert(field, leading("// field"));
        input.insert(method, leading("// method"));

        let partition = Partition {
            dispositions: vec![
                (field, Disposition::Elide(ElideReason::ComponentField)),
                (method, Disposition::RetainVerbatim),
            ],
            diagnostics: Vec::new(),
        };

        let mut output = input.clone();
        preserve_trivia(&input, class, &partition, record, &mut output);

        assert_eq!(output.leading(record), &[comment("// class")]);
        assert_eq!(output.leading(method), &[comment("// method")]);
        assert!(output.get(field).is_none());
        assert!(output.get(class).is_none());
        assert_eq!(output.len(), 2);
    }
}
