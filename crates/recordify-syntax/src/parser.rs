//! Tolerant member-level Java parser.
//!
//! Only the structure the record conversion needs is modelled: the package,
//! imports and types; for classes (top-level and member classes alike) their
//! header and members; for bodies their top-level statements. Everything else
//! is kept verbatim.

use thiserror::Error;

use crate::lexer::{self, is_java_keyword, is_type_name, LexError, Token, TokenKind};
use crate::tree::{
    AssignOp, Body, CallKind, ClassDecl, CompilationUnit, ConstructorDecl, Expr, ExprShape,
    FieldDecl, ImportDecl, InitializerDecl, MethodDecl, Modifier, Modifiers, Node, OpaqueDecl,
    OpaqueKind, PackageDecl, Param, Stmt, Verbatim,
};
use crate::trivia::{Comment, CommentKind, Trivia};
use crate::{NodeId, SyntaxTree, TextRange, TreeBuilder};

const INDENT_UNIT: &str = "    ";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("unbalanced `{open}` at offset {offset}")]
    Unbalanced { open: char, offset: usize },
}

/// Parse a Java compilation unit.
pub fn parse(source: &str) -> Result<SyntaxTree, ParseError> {
    let mut tokens = Vec::new();
    let mut comments = Vec::new();
    for token in lexer::lex(source)? {
        if token.kind.is_comment() {
            comments.push(token);
        } else {
            tokens.push(token);
        }
    }

    let tree = Parser::new(source, tokens, comments).parse_compilation_unit()?;
    tracing::trace!(
        target = "recordify.syntax",
        nodes = tree.nodes().len(),
        types = tree.unit().types.len(),
        "parsed compilation unit"
    );
    Ok(tree)
}

pub(crate) struct Parser<'a> {
    source: &'a str,
    /// Non-comment tokens.
    tokens: Vec<Token>,
    comments: Vec<Token>,
    builder: TreeBuilder,
    package: Option<String>,
}

/// Where a declaration sits in the source and which comments surround it.
struct Item {
    verbatim: Verbatim,
    leading: Vec<Comment>,
    trailing: Vec<Comment>,
}

enum MemberSplit {
    Method(usize),
    Field(usize),
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, tokens: Vec<Token>, comments: Vec<Token>) -> Self {
        Parser {
            source,
            tokens,
            comments,
            builder: TreeBuilder::new(source),
            package: None,
        }
    }

    /// A parser over a code fragment, used for token-level scans.
    pub(crate) fn fragment(source: &'a str) -> Result<Self, LexError> {
        let tokens = lexer::lex(source)?
            .into_iter()
            .filter(|t| !t.kind.is_comment())
            .collect();
        Ok(Parser::new(source, tokens, Vec::new()))
    }

    // --- token helpers -----------------------------------------------------

    pub(crate) fn len(&self) -> usize {
        self.tokens.len()
    }

    pub(crate) fn offset(&self, i: usize) -> usize {
        self.tokens[i].range.start
    }

    pub(crate) fn text(&self, i: usize) -> &'a str {
        self.tokens[i].text(self.source)
    }

    pub(crate) fn is_punct(&self, i: usize, ch: char) -> bool {
        self.tokens.get(i).is_some_and(|t| {
            t.kind == TokenKind::Punct && t.text(self.source).starts_with(ch)
        })
    }

    pub(crate) fn is_ident(&self, i: usize, word: &str) -> bool {
        self.tokens
            .get(i)
            .is_some_and(|t| t.kind == TokenKind::Ident && t.text(self.source) == word)
    }

    pub(crate) fn is_any_ident(&self, i: usize) -> bool {
        self.tokens.get(i).is_some_and(|t| t.kind == TokenKind::Ident)
    }

    fn adjacent(&self, a: usize, b: usize) -> bool {
        self.tokens[a].range.end == self.tokens[b].range.start
    }

    /// Source text from token `first` through token `last`, inclusive.
    fn span_text(&self, first: usize, last: usize) -> &'a str {
        &self.source[self.tokens[first].range.start..self.tokens[last].range.end]
    }

    /// Token texts in `first..end` concatenated without whitespace.
    fn joined(&self, first: usize, end: usize) -> String {
        (first..end).map(|i| self.text(i)).collect()
    }

    fn matching(
        &self,
        open_idx: usize,
        open: char,
        close: char,
        limit: usize,
    ) -> Result<usize, ParseError> {
        let mut depth = 0usize;
        for i in open_idx..limit.min(self.tokens.len()) {
            if self.is_punct(i, open) {
                depth += 1;
            } else if self.is_punct(i, close) {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Ok(i);
                }
            }
        }
        Err(ParseError::Unbalanced {
            open,
            offset: self.tokens[open_idx].range.start,
        })
    }

    /// If token `i` is the `=` of an assignment operator, returns the index of
    /// the operator's first token and the operator.
    pub(crate) fn assign_op_at(&self, i: usize) -> Option<(usize, AssignOp)> {
        if !self.is_punct(i, '=') {
            return None;
        }
        if self.is_punct(i + 1, '=') && self.adjacent(i, i + 1) {
            return None;
        }
        if i == 0 || !self.adjacent(i - 1, i) || self.tokens[i - 1].kind != TokenKind::Punct {
            return Some((i, AssignOp::Assign));
        }
        let prev = i - 1;
        match self.text(prev) {
            "=" | "!" => None,
            op @ ("+" | "-" | "*" | "/" | "%" | "&" | "|" | "^") => {
                Some((prev, AssignOp::Compound(format!("{op}="))))
            }
            "<" => (prev > 0 && self.is_punct(prev - 1, '<') && self.adjacent(prev - 1, prev))
                .then(|| (prev - 1, AssignOp::Compound("<<=".to_string()))),
            ">" => {
                let mut start = prev;
                while start > 0 && self.is_punct(start - 1, '>') && self.adjacent(start - 1, start)
                {
                    start -= 1;
                }
                match prev - start + 1 {
                    2 => Some((start, AssignOp::Compound(">>=".to_string()))),
                    3 => Some((start, AssignOp::Compound(">>>=".to_string()))),
                    _ => None,
                }
            }
            _ => Some((i, AssignOp::Assign)),
        }
    }

    pub(crate) fn is_increment(&self, i: usize) -> Option<AssignOp> {
        if i + 1 >= self.tokens.len() || !self.adjacent(i, i + 1) {
            return None;
        }
        if self.is_punct(i, '+') && self.is_punct(i + 1, '+') {
            Some(AssignOp::Increment)
        } else if self.is_punct(i, '-') && self.is_punct(i + 1, '-') {
            Some(AssignOp::Decrement)
        } else {
            None
        }
    }

    pub(crate) fn is_arrow(&self, i: usize) -> bool {
        i > 0 && self.is_punct(i, '>') && self.is_punct(i - 1, '-') && self.adjacent(i - 1, i)
    }

    // --- comments and layout -----------------------------------------------

    fn comment(&self, token: &Token) -> Comment {
        let kind = match token.kind {
            TokenKind::LineComment => CommentKind::Line,
            TokenKind::DocComment => CommentKind::Doc,
            _ => CommentKind::Block,
        };
        Comment {
            kind,
            text: token.text(self.source).to_string(),
            range: token.range,
        }
    }

    fn comments_between(&self, start: usize, end: usize) -> Vec<Comment> {
        let first = self.comments.partition_point(|c| c.range.start < start);
        self.comments[first..]
            .iter()
            .take_while(|c| c.range.end <= end)
            .map(|c| self.comment(c))
            .collect()
    }

    /// Comments after `end` on the same line, stopping before `limit`.
    /// Returns them with the offset where the last one ends.
    fn trailing_comments(&self, end: usize, limit: usize) -> (Vec<Comment>, usize) {
        let mut out = Vec::new();
        let mut cursor = end;
        let first = self.comments.partition_point(|c| c.range.start < end);
        for token in &self.comments[first..] {
            if token.range.start >= limit {
                break;
            }
            let gap = &self.source[cursor..token.range.start];
            if gap.contains('\n') || !gap.chars().all(char::is_whitespace) {
                break;
            }
            out.push(self.comment(token));
            cursor = token.range.end;
            if token.kind == TokenKind::LineComment {
                break;
            }
        }
        (out, cursor)
    }

    fn indent_of(&self, offset: usize, default: &str) -> String {
        let line_start = self.source[..offset].rfind('\n').map_or(0, |i| i + 1);
        let prefix = &self.source[line_start..offset];
        if prefix.chars().all(char::is_whitespace) {
            prefix.to_string()
        } else {
            default.to_string()
        }
    }

    fn item(&self, cursor: usize, first: usize, last: usize, limit: usize, indent: &str) -> Item {
        let start = self.tokens[first].range.start;
        let end = self.tokens[last].range.end;
        let leading = self.comments_between(cursor, start);
        let (trailing, trailing_end) = self.trailing_comments(end, limit);
        Item {
            verbatim: Verbatim {
                text: self.source[start..end].to_string(),
                indent: self.indent_of(start, indent),
                range: TextRange::new(start, end),
                extent: TextRange::new(cursor, trailing_end),
            },
            leading,
            trailing,
        }
    }

    fn attach(&mut self, id: NodeId, trivia: Trivia) {
        self.builder.trivia_mut().insert(id, trivia);
    }

    /// Index of the last token of the declaration or statement-like item
    /// starting at `start`: a `;` outside parentheses, or the `}` closing the
    /// first brace block unless an initializer (`= {...}`) precedes it.
    fn item_end(&self, start: usize, limit: usize) -> Result<usize, ParseError> {
        let mut paren = 0usize;
        let mut saw_assign = false;
        let mut i = start;
        while i < limit {
            if self.is_punct(i, '(') {
                paren += 1;
            } else if self.is_punct(i, ')') {
                paren = paren.saturating_sub(1);
            } else if paren == 0 {
                if self.is_punct(i, ';') {
                    return Ok(i);
                }
                if self.assign_op_at(i).is_some() {
                    saw_assign = true;
                }
                if self.is_punct(i, '{') {
                    let close = self.matching(i, '{', '}', limit)?;
                    if !saw_assign {
                        return Ok(close);
                    }
                    i = close + 1;
                    continue;
                }
            }
            i += 1;
        }
        Ok(limit - 1)
    }

    // --- compilation unit --------------------------------------------------

    fn parse_compilation_unit(mut self) -> Result<SyntaxTree, ParseError> {
        let mut unit = CompilationUnit::default();
        let len = self.tokens.len();
        let mut cursor = 0;
        let mut i = 0;

        while i < len {
            let last = self.item_end(i, len)?;
            let limit = self
                .tokens
                .get(last + 1)
                .map_or(self.source.len(), |t| t.range.start);
            let Item {
                verbatim,
                leading,
                trailing,
            } = self.item(cursor, i, last, limit, "");
            cursor = verbatim.extent.end;

            if self.is_ident(i, "package") {
                let name = self.joined(i + 1, self.statement_limit(last));
                self.package = Some(name.clone());
                let id = self.builder.alloc(Node::Package(PackageDecl {
                    name,
                    source: verbatim,
                }));
                self.attach(id, Trivia { leading, trailing, dangling: Vec::new() });
                unit.package = Some(id);
            } else if self.is_ident(i, "import") {
                let is_static = self.is_ident(i + 1, "static");
                let path_start = if is_static { i + 2 } else { i + 1 };
                let path = self.joined(path_start, self.statement_limit(last));
                let id = self.builder.alloc(Node::Import(ImportDecl {
                    is_star: path.ends_with(".*"),
                    path,
                    is_static,
                    source: verbatim,
                }));
                self.attach(id, Trivia { leading, trailing, dangling: Vec::new() });
                unit.imports.push(id);
            } else {
                let (node, header, dangling) = self.parse_type_decl(i, last, verbatim)?;
                let id = self.builder.alloc(node);
                let mut leading = leading;
                leading.extend(header);
                self.attach(id, Trivia { leading, trailing, dangling });
                unit.types.push(id);
            }

            i = last + 1;
        }

        Ok(self.builder.finish(unit))
    }

    /// Exclusive end of an item's tokens, leaving out its terminating `;`.
    fn statement_limit(&self, last: usize) -> usize {
        if self.is_punct(last, ';') {
            last
        } else {
            last + 1
        }
    }

    fn opaque(&self, kind: OpaqueKind, name_idx: Option<usize>, source: Verbatim) -> Node {
        let name = name_idx
            .filter(|&i| self.is_any_ident(i))
            .map(|i| self.text(i).to_string());
        Node::Opaque(OpaqueDecl { kind, name, source })
    }

    fn parse_modifiers(&self, start: usize, limit: usize) -> Result<(Modifiers, usize), ParseError> {
        let mut modifiers = Modifiers::default();
        let mut i = start;
        while i < limit {
            if self.is_punct(i, '@') {
                if self.is_ident(i + 1, "interface") || !self.is_any_ident(i + 1) {
                    break;
                }
                let mut j = i + 1;
                while j + 2 < limit && self.is_punct(j + 1, '.') && self.is_any_ident(j + 2) {
                    j += 2;
                }
                if j + 1 < limit && self.is_punct(j + 1, '(') {
                    j = self.matching(j + 1, '(', ')', limit)?;
                }
                modifiers.annotations.push(self.span_text(i, j).to_string());
                i = j + 1;
                continue;
            }
            if self.is_ident(i, "non") && self.is_punct(i + 1, '-') && self.is_ident(i + 2, "sealed") {
                modifiers.keywords.push(Modifier::NonSealed);
                i += 3;
                continue;
            }
            if self.is_any_ident(i) {
                if let Some(modifier) = Modifier::from_keyword(self.text(i)) {
                    modifiers.keywords.push(modifier);
                    i += 1;
                    continue;
                }
            }
            break;
        }
        Ok((modifiers, i))
    }

    /// Kind of the type declaration starting at token `i`, with the index of
    /// its name token.
    fn type_keyword(&self, i: usize) -> Option<(OpaqueKind, usize)> {
        if self.is_punct(i, '@') && self.is_ident(i + 1, "interface") {
            return Some((OpaqueKind::Annotation, i + 2));
        }
        if self.is_ident(i, "class") {
            return Some((OpaqueKind::Class, i + 1));
        }
        if self.is_ident(i, "interface") {
            return Some((OpaqueKind::Interface, i + 1));
        }
        if self.is_ident(i, "enum") {
            return Some((OpaqueKind::Enum, i + 1));
        }
        if self.is_ident(i, "record")
            && self.is_any_ident(i + 1)
            && (self.is_punct(i + 2, '(') || self.is_punct(i + 2, '<'))
        {
            return Some((OpaqueKind::Record, i + 1));
        }
        None
    }

    /// Text of a header clause (`extends ...`) up to the next clause keyword.
    fn header_clause(&self, from: usize, to: usize, keyword: &str) -> Option<String> {
        let mut angle = 0usize;
        let mut start = None;
        for k in from..to {
            if self.is_punct(k, '<') {
                angle += 1;
            } else if self.is_punct(k, '>') {
                angle = angle.saturating_sub(1);
            } else if angle == 0
                && (self.is_ident(k, "extends")
                    || self.is_ident(k, "implements")
                    || self.is_ident(k, "permits"))
            {
                if let Some(s) = start {
                    return (k > s).then(|| self.span_text(s, k - 1).to_string());
                }
                if self.is_ident(k, keyword) {
                    start = Some(k + 1);
                }
            }
        }
        let s = start?;
        (to > s).then(|| self.span_text(s, to - 1).to_string())
    }

    fn parse_type_decl(
        &mut self,
        first: usize,
        last: usize,
        source: Verbatim,
    ) -> Result<(Node, Vec<Comment>, Vec<Comment>), ParseError> {
        if first == last && self.is_punct(first, ';') {
            return Ok((self.opaque(OpaqueKind::Empty, None, source), Vec::new(), Vec::new()));
        }
        let (modifiers, kw) = self.parse_modifiers(first, last + 1)?;
        let Some((kind, name_idx)) = self.type_keyword(kw) else {
            return Ok((self.opaque(OpaqueKind::Unknown, None, source), Vec::new(), Vec::new()));
        };
        if kind != OpaqueKind::Class || !self.is_any_ident(name_idx) {
            return Ok((self.opaque(kind, Some(name_idx), source), Vec::new(), Vec::new()));
        }

        let name = self.text(name_idx).to_string();
        let mut idx = name_idx + 1;
        let mut type_params = None;
        if self.is_punct(idx, '<') {
            let close = self.matching(idx, '<', '>', last + 1)?;
            type_params = Some(self.span_text(idx, close).to_string());
            idx = close + 1;
        }
        let body_open = (idx..=last).find(|&k| self.is_punct(k, '{'));
        let Some(body_open) = body_open.filter(|_| self.is_punct(last, '}')) else {
            return Ok((self.opaque(OpaqueKind::Class, Some(name_idx), source), Vec::new(), Vec::new()));
        };

        let header_prefix =
            self.source[self.tokens[first].range.start..self.tokens[kw].range.start].to_string();
        let mut header_comments = self.comments_between(
            self.tokens[kw].range.start,
            self.tokens[body_open].range.end,
        );
        // Comments on the line of the opening brace describe the class.
        let (open_comments, members_start) = self.trailing_comments(
            self.tokens[body_open].range.end,
            self.tokens[body_open + 1].range.start,
        );
        header_comments.extend(open_comments);
        let (members, dangling) =
            self.parse_members(members_start, body_open, last, &name, &source.indent)?;

        let class = ClassDecl {
            extends: self.header_clause(idx, body_open, "extends"),
            implements: self.header_clause(idx, body_open, "implements"),
            permits: self.header_clause(idx, body_open, "permits"),
            name,
            type_params,
            modifiers,
            header_prefix,
            package: self.package.clone(),
            members,
            source,
        };
        Ok((Node::Class(class), header_comments, dangling))
    }

    // --- members ------------------------------------------------------------

    fn parse_members(
        &mut self,
        start: usize,
        open: usize,
        close: usize,
        class_name: &str,
        class_indent: &str,
    ) -> Result<(Vec<NodeId>, Vec<Comment>), ParseError> {
        let default_indent = format!("{class_indent}{INDENT_UNIT}");
        let mut members = Vec::new();
        let mut cursor = start;
        let mut i = open + 1;

        while i < close {
            let last = self.item_end(i, close)?;
            let limit = self.tokens[last + 1].range.start;
            let Item {
                verbatim,
                leading,
                trailing,
            } = self.item(cursor, i, last, limit, &default_indent);
            cursor = verbatim.extent.end;

            let (node, header, dangling) = if self.starts_type_decl(i, last)? {
                self.parse_type_decl(i, last, verbatim)?
            } else {
                let node = self.parse_member(i, last, class_name, members.len(), verbatim)?;
                (node, Vec::new(), Vec::new())
            };
            let id = self.builder.alloc(node);
            let mut leading = leading;
            leading.extend(header);
            self.attach(id, Trivia { leading, trailing, dangling });
            members.push(id);
            i = last + 1;
        }

        let dangling = self.comments_between(cursor, self.tokens[close].range.start);
        Ok((members, dangling))
    }

    /// Whether the item at `first` declares a member type.
    fn starts_type_decl(&self, first: usize, last: usize) -> Result<bool, ParseError> {
        let (_, kw) = self.parse_modifiers(first, last + 1)?;
        Ok(kw <= last && self.type_keyword(kw).is_some())
    }

    fn parse_member(
        &self,
        first: usize,
        last: usize,
        class_name: &str,
        position: usize,
        source: Verbatim,
    ) -> Result<Node, ParseError> {
        if first == last && self.is_punct(first, ';') {
            return Ok(self.opaque(OpaqueKind::Empty, None, source));
        }
        let (modifiers, mut i) = self.parse_modifiers(first, last + 1)?;
        if i > last {
            return Ok(self.opaque(OpaqueKind::Unknown, None, source));
        }
        if self.is_punct(i, '{') {
            let body = self.parse_body(i, last)?;
            return Ok(Node::Initializer(InitializerDecl {
                is_static: modifiers.has(Modifier::Static),
                body,
                source,
            }));
        }
        let mut type_params = None;
        if self.is_punct(i, '<') {
            let close = self.matching(i, '<', '>', last + 1)?;
            type_params = Some(self.span_text(i, close).to_string());
            i = close + 1;
        }

        if self.is_ident(i, class_name) && self.is_punct(i + 1, '(') {
            let close = self.matching(i + 1, '(', ')', last + 1)?;
            let params = self.parse_params(i + 2, close)?;
            let open = (close + 1..=last).find(|&k| self.is_punct(k, '{'));
            let Some(open) = open.filter(|_| self.is_punct(last, '}')) else {
                return Ok(self.opaque(OpaqueKind::Unknown, Some(i), source));
            };
            return Ok(Node::Constructor(ConstructorDecl {
                name: class_name.to_string(),
                modifiers,
                type_params,
                params,
                body: self.parse_body(open, last)?,
                source,
            }));
        }

        match self.split_member(i, last) {
            Some(MemberSplit::Method(paren)) => {
                if paren < i + 2 || !self.is_any_ident(paren - 1) {
                    return Ok(self.opaque(OpaqueKind::Unknown, None, source));
                }
                let close = self.matching(paren, '(', ')', last + 1)?;
                let params = self.parse_params(paren + 1, close)?;
                let open = (close + 1..=last).find(|&k| self.is_punct(k, '{'));
                let body = match open.filter(|_| self.is_punct(last, '}')) {
                    Some(open) => Some(self.parse_body(open, last)?),
                    None => None,
                };
                Ok(Node::Method(MethodDecl {
                    name: self.text(paren - 1).to_string(),
                    modifiers,
                    type_params,
                    return_ty: self.span_text(i, paren - 2).to_string(),
                    params,
                    body,
                    source,
                }))
            }
            Some(MemberSplit::Field(stop)) => {
                Ok(self.parse_field(i, stop, last, modifiers, position, source))
            }
            None => Ok(self.opaque(OpaqueKind::Unknown, None, source)),
        }
    }

    /// Finds where a member's type-and-name prefix ends: at the `(` of a
    /// method, or at the `=`, `,` or `;` after a field's first declarator.
    fn split_member(&self, start: usize, last: usize) -> Option<MemberSplit> {
        let mut angle = 0usize;
        for k in start..=last {
            if self.is_punct(k, '<') {
                angle += 1;
            } else if self.is_punct(k, '>') {
                angle = angle.saturating_sub(1);
            } else if angle == 0 {
                if self.is_punct(k, '(') {
                    return Some(MemberSplit::Method(k));
                }
                if self.is_punct(k, ';') || self.is_punct(k, ',') || self.assign_op_at(k).is_some()
                {
                    return Some(MemberSplit::Field(k));
                }
                if self.is_punct(k, '{') {
                    return None;
                }
            }
        }
        None
    }

    /// Indices of `,` and `;` separating declarators between `from` and `last`.
    fn declarator_separators(&self, from: usize, last: usize) -> Vec<usize> {
        let mut depth = 0usize;
        let mut angle = 0usize;
        let mut out = Vec::new();
        for k in from..=last {
            if self.is_punct(k, '(') || self.is_punct(k, '[') || self.is_punct(k, '{') {
                depth += 1;
            } else if self.is_punct(k, ')') || self.is_punct(k, ']') || self.is_punct(k, '}') {
                depth = depth.saturating_sub(1);
            } else if depth == 0 {
                if self.is_punct(k, ';') {
                    out.push(k);
                    angle = 0;
                } else if self.is_punct(k, '<')
                    && k > 0
                    && (self.is_any_ident(k - 1) || self.is_punct(k - 1, '.'))
                {
                    angle += 1;
                } else if self.is_punct(k, '>') && angle > 0 && !self.is_arrow(k) {
                    angle -= 1;
                } else if angle == 0 && self.is_punct(k, ',') {
                    out.push(k);
                }
            }
        }
        out
    }

    fn parse_field(
        &self,
        ty_start: usize,
        stop: usize,
        last: usize,
        modifiers: Modifiers,
        position: usize,
        source: Verbatim,
    ) -> Node {
        let mut name_idx = stop.saturating_sub(1);
        let mut dims = 0;
        while name_idx > ty_start + 1 && self.is_punct(name_idx, ']') && self.is_punct(name_idx - 1, '[')
        {
            dims += 1;
            name_idx -= 2;
        }
        if name_idx <= ty_start || !self.is_any_ident(name_idx) {
            return self.opaque(OpaqueKind::Unknown, None, source);
        }

        let mut ty = self.span_text(ty_start, name_idx - 1).to_string();
        for _ in 0..dims {
            ty.push_str("[]");
        }
        let separators = self.declarator_separators(stop, last);
        let initializer = if self.is_punct(stop, '=') {
            let end = separators.first().copied().unwrap_or(last + 1);
            (end > stop + 1).then(|| self.span_text(stop + 1, end - 1).to_string())
        } else {
            None
        };
        let declarators = 1 + separators.iter().filter(|&&k| self.is_punct(k, ',')).count();

        Node::Field(FieldDecl {
            name: self.text(name_idx).to_string(),
            ty,
            modifiers,
            position,
            initializer,
            declarators,
            source,
        })
    }

    fn parse_params(&self, from: usize, to: usize) -> Result<Vec<Param>, ParseError> {
        let mut params = Vec::new();
        if from >= to {
            return Ok(params);
        }

        let mut segments = Vec::new();
        let mut depth = 0usize;
        let mut seg_start = from;
        for k in from..to {
            if ['(', '[', '{', '<'].iter().any(|&c| self.is_punct(k, c)) {
                depth += 1;
            } else if [')', ']', '}', '>'].iter().any(|&c| self.is_punct(k, c)) {
                depth = depth.saturating_sub(1);
            } else if depth == 0 && self.is_punct(k, ',') {
                segments.push((seg_start, k));
                seg_start = k + 1;
            }
        }
        segments.push((seg_start, to));

        for (start, end) in segments {
            if start >= end {
                continue;
            }
            let (modifiers, t) = self.parse_modifiers(start, end)?;
            let mut name_idx = end - 1;
            let mut dims = 0;
            while name_idx > t + 1 && self.is_punct(name_idx, ']') && self.is_punct(name_idx - 1, '[') {
                dims += 1;
                name_idx -= 2;
            }
            let (name, mut ty) = if name_idx > t && self.is_any_ident(name_idx) {
                (
                    self.text(name_idx).to_string(),
                    self.span_text(t, name_idx - 1).to_string(),
                )
            } else {
                (String::new(), self.span_text(start, end - 1).to_string())
            };
            for _ in 0..dims {
                ty.push_str("[]");
            }
            params.push(Param {
                varargs: ty.ends_with("..."),
                name,
                ty,
                modifiers,
            });
        }
        Ok(params)
    }

    // --- bodies ---------------------------------------------------------------

    fn parse_body(&self, open: usize, close: usize) -> Result<Body, ParseError> {
        let mut statements = Vec::new();
        let mut i = open + 1;
        while i < close {
            let end = self.statement_end(i, close)?;
            statements.push(self.parse_statement(i, end));
            i = end + 1;
        }
        Ok(Body {
            text: self.span_text(open, close).to_string(),
            statements,
        })
    }

    fn statement_end(&self, start: usize, limit: usize) -> Result<usize, ParseError> {
        let mut paren = 0usize;
        let mut continues = self.is_ident(start, "do");
        let mut i = start;
        while i < limit {
            if self.is_punct(i, '(') {
                paren += 1;
            } else if self.is_punct(i, ')') {
                paren = paren.saturating_sub(1);
            } else if paren == 0 {
                if self.is_punct(i, ';') {
                    return Ok(i);
                }
                if self.assign_op_at(i).is_some() || self.is_arrow(i) {
                    continues = true;
                }
                if self.is_punct(i, '{') {
                    let close = self.matching(i, '{', '}', limit)?;
                    let next = close + 1;
                    let chained = next < limit
                        && (self.is_ident(next, "else")
                            || self.is_ident(next, "catch")
                            || self.is_ident(next, "finally")
                            || self.is_punct(next, ';')
                            || self.is_punct(next, '.')
                            || self.is_punct(next, ')')
                            || self.is_punct(next, ','));
                    if continues || chained {
                        i = next;
                        continue;
                    }
                    return Ok(close);
                }
            }
            i += 1;
        }
        Ok(limit - 1)
    }

    fn parse_statement(&self, s: usize, e: usize) -> Stmt {
        let text = self.span_text(s, e).to_string();
        let end = self.statement_limit(e);
        if end <= s {
            return Stmt::Other { text };
        }

        if self.is_ident(s, "return") {
            let value = (s + 1 < end).then(|| self.expr(s + 1, end));
            return Stmt::Return { value, text };
        }

        if (self.is_ident(s, "this") || self.is_ident(s, "super")) && self.is_punct(s + 1, '(') {
            if let Ok(close) = self.matching(s + 1, '(', ')', end) {
                if close + 1 == end {
                    let kind = if self.is_ident(s, "this") {
                        CallKind::This
                    } else {
                        CallKind::Super
                    };
                    let args = if close > s + 2 {
                        self.span_text(s + 2, close - 1).to_string()
                    } else {
                        String::new()
                    };
                    return Stmt::ConstructorCall { kind, args, text };
                }
            }
        }

        if let Some(op) = self.is_increment(s) {
            return Stmt::Assign {
                target: self.expr(s + 2, end),
                op,
                value: None,
                text,
            };
        }

        let mut depth = 0usize;
        for k in s..end {
            if self.is_punct(k, '(') || self.is_punct(k, '[') || self.is_punct(k, '{') {
                depth += 1;
            } else if self.is_punct(k, ')') || self.is_punct(k, ']') || self.is_punct(k, '}') {
                depth = depth.saturating_sub(1);
            } else if depth == 0 {
                let Some((op_start, op)) = self.assign_op_at(k) else {
                    continue;
                };
                if op == AssignOp::Assign {
                    if let Some((ty, name)) = self.local_declaration(s, op_start) {
                        return Stmt::LocalVar {
                            ty,
                            name,
                            init: Some(self.expr(k + 1, end)),
                            text,
                        };
                    }
                }
                return Stmt::Assign {
                    target: self.expr(s, op_start),
                    op,
                    value: Some(self.expr(k + 1, end)),
                    text,
                };
            }
        }

        if end >= s + 3 {
            if let Some(op) = self.is_increment(end - 2) {
                return Stmt::Assign {
                    target: self.expr(s, end - 2),
                    op,
                    value: None,
                    text,
                };
            }
        }

        if let Some((ty, name)) = self.local_declaration(s, end) {
            return Stmt::LocalVar {
                ty,
                name,
                init: None,
                text,
            };
        }

        Stmt::Other { text }
    }

    /// `[final] Type name` spanning `from..to`.
    fn local_declaration(&self, from: usize, to: usize) -> Option<(String, String)> {
        let (_, t) = self.parse_modifiers(from, to).ok()?;
        if to < t + 2 || !self.is_any_ident(t) || !is_type_name(self.text(t)) {
            return None;
        }
        let name_idx = to - 1;
        if !self.is_any_ident(name_idx) || is_java_keyword(self.text(name_idx)) {
            return None;
        }
        let prev = name_idx - 1;
        let typeish = (self.is_any_ident(prev) && is_type_name(self.text(prev)))
            || self.is_punct(prev, '>')
            || (prev > t && self.is_punct(prev, ']') && self.is_punct(prev - 1, '['));
        typeish.then(|| {
            (
                self.span_text(t, prev).to_string(),
                self.text(name_idx).to_string(),
            )
        })
    }

    fn expr(&self, start: usize, end: usize) -> Expr {
        if start >= end {
            return Expr {
                text: String::new(),
                shape: ExprShape::Other,
            };
        }
        let shape = if end - start == 1
            && self.is_any_ident(start)
            && !is_java_keyword(self.text(start))
        {
            ExprShape::Name
        } else if end - start == 3
            && self.is_ident(start, "this")
            && self.is_punct(start + 1, '.')
            && self.is_any_ident(start + 2)
        {
            ExprShape::ThisField
        } else {
            ExprShape::Other
        };
        Expr {
            text: self.span_text(start, end - 1).to_string(),
            shape,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn class_of(tree: &SyntaxTree) -> &ClassDecl {
        tree.classes().next().map(|(_, c)| c).expect("class")
    }

    fn member<'t>(tree: &'t SyntaxTree, class: &ClassDecl, idx: usize) -> &'t Node {
        tree.node(class.members[idx]).expect("member")
    }

    #[test]
    fn parses_package_imports_and_class_header() {
        let src = "package a.b;\nimport static java.util.Map.*;\nimport java.util.List;\n\n@Deprecated\npublic final class Pair<A, B> extends Object implements Comparable<Pair<A, B>>, java.io.Serializable {\n}\n";
        let tree = parse(src).unwrap();
        let package = tree.node(tree.unit().package.unwrap()).unwrap();
        assert_eq!(package.name(), Some("a.b"));
        assert_eq!(tree.unit().imports.len(), 2);
        let Node::Import(import) = tree.node(tree.unit().imports[0]).unwrap() else {
            panic!("expected import");
        };
        assert!(import.is_static);
        assert!(import.is_star);

        let class = class_of(&tree);
        assert_eq!(class.name, "Pair");
        assert_eq!(class.type_params.as_deref(), Some("<A, B>"));
        assert_eq!(class.header_prefix, "@Deprecated\npublic final ");
        assert_eq!(class.extends.as_deref(), Some("Object"));
        assert_eq!(
            class.implements.as_deref(),
            Some("Comparable<Pair<A, B>>, java.io.Serializable")
        );
        assert_eq!(class.package.as_deref(), Some("a.b"));
        assert!(class.modifiers.has(Modifier::Public));
        assert!(class.modifiers.has_annotation("Deprecated"));
    }

    #[test]
    fn parses_members_in_order() {
        let src = r#"class P {
    private final int x;
    private static final int S = 1, T = 2;
    P(int x) { this.x = x; }
    P() { this(0); }
    public int x() { return this.x; }
    abstract void f();
    static { System.out.println("s"); }
    { count++; }
    class Inner {}
    ;
}
"#;
        let tree = parse(src).unwrap();
        let class = class_of(&tree);
        let kinds: Vec<_> = class
            .members
            .iter()
            .map(|&id| tree.node(id).unwrap().kind())
            .collect();
        use crate::NodeKind::*;
        assert_eq!(
            kinds,
            vec![Field, Field, Constructor, Constructor, Method, Method, Initializer, Initializer, Class, Opaque]
        );

        let Node::Field(field) = member(&tree, class, 1) else { panic!() };
        assert_eq!(field.name, "S");
        assert_eq!(field.declarators, 2);
        assert_eq!(field.initializer.as_deref(), Some("1"));
        assert_eq!(field.position, 1);

        let Node::Constructor(ctor) = member(&tree, class, 2) else { panic!() };
        assert_eq!(ctor.params.len(), 1);
        assert_eq!(ctor.params[0].ty, "int");
        let Stmt::Assign { target, op, value, .. } = &ctor.body.statements[0] else {
            panic!("expected assignment");
        };
        assert!(target.is_this_field("x"));
        assert_eq!(*op, AssignOp::Assign);
        assert!(value.as_ref().unwrap().is_name("x"));

        let Node::Constructor(delegating) = member(&tree, class, 3) else { panic!() };
        assert!(matches!(
            &delegating.body.statements[0],
            Stmt::ConstructorCall { kind: CallKind::This, args, .. } if args == "0"
        ));

        let Node::Method(abstract_method) = member(&tree, class, 5) else { panic!() };
        assert!(abstract_method.body.is_none());
        assert_eq!(abstract_method.return_ty, "void");

        let Node::Initializer(instance) = member(&tree, class, 7) else { panic!() };
        assert!(!instance.is_static);
        assert!(matches!(
            &instance.body.statements[0],
            Stmt::Assign { op: AssignOp::Increment, .. }
        ));

        let Node::Class(inner) = member(&tree, class, 8) else { panic!() };
        assert_eq!(inner.name, "Inner");
        assert!(inner.members.is_empty());
    }

    #[test]
    fn member_classes_are_parsed_like_top_level_ones() {
        let src = concat!(
            "class Outer {\n",
            "    // nested\n",
            "    public static final class Pair<A> implements Cloneable { // pair\n",
            "        private final A a;\n",
            "        Pair(A a) { this.a = a; }\n",
            "        // end of pair\n",
            "    }\n",
            "    interface Shape {}\n",
            "}\n",
        );
        let tree = parse(src).unwrap();
        let outer = class_of(&tree);
        assert_eq!(tree.classes().count(), 1);

        let pair_id = outer.members[0];
        let Node::Class(pair) = member(&tree, outer, 0) else { panic!("expected class") };
        assert_eq!(pair.name, "Pair");
        assert_eq!(pair.type_params.as_deref(), Some("<A>"));
        assert_eq!(pair.implements.as_deref(), Some("Cloneable"));
        assert_eq!(pair.header_prefix, "public static final ");
        assert!(pair.modifiers.has(Modifier::Static));
        assert_eq!(pair.source.indent, "    ");
        assert_eq!(pair.members.len(), 2);
        let Node::Field(field) = tree.node(pair.members[0]).unwrap() else { panic!() };
        assert_eq!(field.source.indent, "        ");

        let trivia = tree.trivia();
        let leading: Vec<_> = trivia.leading(pair_id).iter().map(|c| c.text.as_str()).collect();
        assert_eq!(leading, vec!["// nested", "// pair"]);
        assert_eq!(trivia.dangling(pair_id)[0].text, "// end of pair");

        let Node::Opaque(shape) = member(&tree, outer, 1) else { panic!() };
        assert_eq!(shape.kind, OpaqueKind::Interface);
    }

    #[test]
    fn generic_field_initializer_is_a_single_declarator() {
        let src = "class M { private final Map<K, V> m = new HashMap<K, V>(); }";
        let tree = parse(src).unwrap();
        let class = class_of(&tree);
        let Node::Field(field) = member(&tree, class, 0) else { panic!() };
        assert_eq!(field.ty, "Map<K, V>");
        assert_eq!(field.declarators, 1);
        assert_eq!(field.initializer.as_deref(), Some("new HashMap<K, V>()"));
    }

    #[test]
    fn recognises_compound_assignments_and_comparisons() {
        let src = "class C { void f() { a += 1; b >>>= 2; c <<= 3; if (d >= 4) { e--; } g = h == i; } }";
        let tree = parse(src).unwrap();
        let class = class_of(&tree);
        let Node::Method(method) = member(&tree, class, 0) else { panic!() };
        let stmts = &method.body.as_ref().unwrap().statements;
        let ops: Vec<_> = stmts
            .iter()
            .map(|s| match s {
                Stmt::Assign { op, .. } => Some(op.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            ops,
            vec![
                Some(AssignOp::Compound("+=".into())),
                Some(AssignOp::Compound(">>>=".into())),
                Some(AssignOp::Compound("<<=".into())),
                None,
                Some(AssignOp::Assign),
            ]
        );
    }

    #[test]
    fn local_declarations_are_recognised() {
        let src = "class C { int f() { int x = 12; final List<String> xs; return x; } }";
        let tree = parse(src).unwrap();
        let class = class_of(&tree);
        let Node::Method(method) = member(&tree, class, 0) else { panic!() };
        let stmts = &method.body.as_ref().unwrap().statements;
        assert!(matches!(&stmts[0], Stmt::LocalVar { name, ty, init: Some(_), .. } if name == "x" && ty == "int"));
        assert!(matches!(&stmts[1], Stmt::LocalVar { name, init: None, .. } if name == "xs"));
        assert!(matches!(&stmts[2], Stmt::Return { value: Some(v), .. } if v.is_name("x")));
    }

    #[test]
    fn binds_comments_to_members() {
        let src = "// header\nclass C { // open\n    /** doc */\n    int a; // a\n    int b; /* b */ // b2\n    // dangling\n}\n";
        let tree = parse(src).unwrap();
        let (id, class) = tree.classes().next().unwrap();
        let trivia = tree.trivia();
        let leading: Vec<_> = trivia.leading(id).iter().map(|c| c.text.as_str()).collect();
        assert_eq!(leading, vec!["// header", "// open"]);
        let dangling: Vec<_> = trivia.dangling(id).iter().map(|c| c.text.as_str()).collect();
        assert_eq!(dangling, vec!["// dangling"]);

        let a = class.members[0];
        assert_eq!(trivia.leading(a)[0].text, "/** doc */");
        assert_eq!(trivia.leading(a)[0].kind, CommentKind::Doc);
        assert_eq!(trivia.trailing(a)[0].text, "// a");

        let b = class.members[1];
        let trailing: Vec<_> = trivia.trailing(b).iter().map(|c| c.text.as_str()).collect();
        assert_eq!(trailing, vec!["/* b */", "// b2"]);
    }

    #[test]
    fn non_class_types_are_opaque() {
        let src = "interface I {}\nenum E { A, B }\nrecord R(int a) {}\n@interface Ann {}\n";
        let tree = parse(src).unwrap();
        let kinds: Vec<_> = tree
            .unit()
            .types
            .iter()
            .map(|&id| match tree.node(id).unwrap() {
                Node::Opaque(o) => (o.kind, o.name.clone()),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                (OpaqueKind::Interface, Some("I".to_string())),
                (OpaqueKind::Enum, Some("E".to_string())),
                (OpaqueKind::Record, Some("R".to_string())),
                (OpaqueKind::Annotation, Some("Ann".to_string())),
            ]
        );
    }

    #[test]
    fn member_indent_is_taken_from_source() {
        let src = "class C {\n  int a;\n}\n";
        let tree = parse(src).unwrap();
        let class = class_of(&tree);
        let field = member(&tree, class, 0);
        assert_eq!(field.verbatim().unwrap().indent, "  ");
    }

    #[test]
    fn unbalanced_braces_are_an_error() {
        assert!(matches!(
            parse("class C {\n  void f() {\n}\n"),
            Err(ParseError::Unbalanced { open: '{', .. })
        ));
    }

    #[test]
    fn lex_errors_surface_as_parse_errors() {
        assert!(matches!(
            parse("class C { String s = \"oops; }"),
            Err(ParseError::Lex(LexError::UnterminatedString { .. }))
        ));
    }
}
