//! Token-level scans over code fragments such as method bodies.

use crate::lexer::{is_java_keyword, is_type_name, LexError};
use crate::parser::Parser;
use crate::tree::AssignOp;

/// A write to a simple name or to `this.<name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableWrite {
    pub name: String,
    /// Written through `this.`.
    pub qualified: bool,
    pub op: AssignOp,
    /// Byte offset of the write target in the fragment.
    pub offset: usize,
}

/// Every assignment, compound assignment, increment and decrement in
/// `fragment` whose target is a simple name or `this.<name>`.
pub fn scan_writes(fragment: &str) -> Result<Vec<VariableWrite>, LexError> {
    let p = Parser::fragment(fragment)?;
    let mut writes = Vec::new();

    for k in 0..p.len() {
        let (name, qualified, last) =
            if p.is_ident(k, "this") && p.is_punct(k + 1, '.') && p.is_any_ident(k + 2) {
                (p.text(k + 2), true, k + 2)
            } else if p.is_any_ident(k)
                && !is_java_keyword(p.text(k))
                && !(k > 0 && p.is_punct(k - 1, '.'))
            {
                (p.text(k), false, k)
            } else {
                continue;
            };

        let op = (last + 1..=last + 4)
            .find_map(|j| p.assign_op_at(j).filter(|(start, _)| *start == last + 1))
            .map(|(_, op)| op)
            .or_else(|| p.is_increment(last + 1))
            .or_else(|| if k >= 2 { p.is_increment(k - 2) } else { None });

        if let Some(op) = op {
            writes.push(VariableWrite {
                name: name.to_string(),
                qualified,
                op,
                offset: p.offset(k),
            });
        }
    }

    Ok(writes)
}

/// Names of local variables, pattern bindings, catch parameters and lambda
/// parameters declared anywhere in `fragment`.
///
/// Scoping is ignored: a name declared in any nested block is reported.
pub fn scan_declared_names(fragment: &str) -> Result<Vec<String>, LexError> {
    let p = Parser::fragment(fragment)?;
    let mut names: Vec<String> = Vec::new();

    for k in 1..p.len() {
        if !p.is_any_ident(k) || is_java_keyword(p.text(k)) {
            continue;
        }
        let lambda_param = p.is_punct(k + 1, '-') && p.is_arrow(k + 2);
        let declares = lambda_param || {
            let next_ok = p.assign_op_at(k + 1).is_some_and(|(_, op)| op == AssignOp::Assign)
                || p.is_punct(k + 1, ';')
                || p.is_punct(k + 1, ',')
                || p.is_punct(k + 1, ':')
                || p.is_punct(k + 1, ')');
            let prev = k - 1;
            let prev_is_type = (p.is_any_ident(prev) && is_type_name(p.text(prev)))
                || p.is_punct(prev, '>')
                || (prev > 0 && p.is_punct(prev, ']') && p.is_punct(prev - 1, '['));
            next_ok && prev_is_type
        };
        if declares && !names.iter().any(|n| n == p.text(k)) {
            names.push(p.text(k).to_string());
        }
    }

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn targets(fragment: &str) -> Vec<(String, bool, AssignOp)> {
        scan_writes(fragment)
            .unwrap()
            .into_iter()
            .map(|w| (w.name, w.qualified, w.op))
            .collect()
    }

    #[test]
    fn finds_plain_compound_and_increment_writes() {
        assert_eq!(
            targets("{ this.x = 1; y += 2; z++; --w; this.v >>= 1; }"),
            vec![
                ("x".to_string(), true, AssignOp::Assign),
                ("y".to_string(), false, AssignOp::Compound("+=".into())),
                ("z".to_string(), false, AssignOp::Increment),
                ("w".to_string(), false, AssignOp::Decrement),
                ("v".to_string(), true, AssignOp::Compound(">>=".into())),
            ]
        );
    }

    #[test]
    fn ignores_reads_comparisons_and_member_writes() {
        assert_eq!(
            targets("{ if (x == y) { return x; } other.x = 3; a.b.c = 4; f(x); }"),
            Vec::new()
        );
    }

    #[test]
    fn ignores_comments() {
        assert_eq!(targets("{ // x = 1;\n /* y = 2; */ }"), Vec::new());
    }

    #[test]
    fn declared_names_cover_locals_params_and_lambdas() {
        let names = scan_declared_names(
            "{ int x = 12; for (String s : xs) {} try {} catch (IOException e) {} \
             List<String> list; run(v -> v + 1); if (o instanceof Foo f) {} }",
        )
        .unwrap();
        assert_eq!(names, vec!["x", "s", "e", "list", "v", "f"]);
    }

    #[test]
    fn assignments_are_not_declarations() {
        assert_eq!(scan_declared_names("{ x = 1; this.y = x; return y; }").unwrap(), Vec::<String>::new());
    }
}
