//! Java tokenizer.
//!
//! Whitespace is skipped; comments are kept as tokens so the parser can bind
//! them to nodes. Operators are emitted one character at a time and the parser
//! recombines them by adjacency (`+=`, `==`, `>>>=`, ...).

use thiserror::Error;

use crate::TextRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Ident,
    Number,
    StringLiteral,
    TextBlock,
    CharLiteral,
    LineComment,
    BlockComment,
    DocComment,
    Punct,
}

impl TokenKind {
    pub fn is_comment(self) -> bool {
        matches!(
            self,
            TokenKind::LineComment | TokenKind::BlockComment | TokenKind::DocComment
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub range: TextRange,
}

impl Token {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.range.start..self.range.end]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unterminated block comment starting at offset {offset}")]
    UnterminatedComment { offset: usize },
    #[error("unterminated string literal starting at offset {offset}")]
    UnterminatedString { offset: usize },
    #[error("unterminated text block starting at offset {offset}")]
    UnterminatedTextBlock { offset: usize },
    #[error("unterminated character literal starting at offset {offset}")]
    UnterminatedChar { offset: usize },
}

/// Tokenize `text`, stopping at the first malformed literal or comment.
pub fn lex(text: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(text).collect()
}

pub struct Lexer<'a> {
    text: &'a str,
    pos: usize,
    failed: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(text: &'a str) -> Self {
        Lexer {
            text,
            pos: 0,
            failed: false,
        }
    }

    fn remaining(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn bump_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn bump_str(&mut self, s: &str) {
        debug_assert!(self.remaining().starts_with(s));
        self.pos += s.len();
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) {
        while matches!(self.peek_char(), Some(c) if pred(c)) {
            self.bump_char();
        }
    }

    fn skip_whitespace(&mut self) {
        self.eat_while(char::is_whitespace);
    }

    fn lex_line_comment(&mut self) -> TokenKind {
        self.eat_while(|c| c != '\n');
        TokenKind::LineComment
    }

    fn lex_block_comment(&mut self, start: usize) -> Result<TokenKind, LexError> {
        self.bump_str("/*");
        // `/**/` is an empty block comment, not a doc comment.
        let kind = if self.remaining().starts_with('*') && !self.remaining().starts_with("*/") {
            TokenKind::DocComment
        } else {
            TokenKind::BlockComment
        };
        match self.remaining().find("*/") {
            Some(idx) => {
                self.pos += idx + 2;
                Ok(kind)
            }
            None => Err(LexError::UnterminatedComment { offset: start }),
        }
    }

    fn lex_string_literal(&mut self, start: usize) -> Result<TokenKind, LexError> {
        if self.remaining().starts_with("\"\"\"") {
            return self.lex_text_block(start);
        }
        self.bump_char();
        loop {
            match self.bump_char() {
                Some('"') => return Ok(TokenKind::StringLiteral),
                Some('\\') => {
                    self.bump_char();
                }
                Some('\n') | None => return Err(LexError::UnterminatedString { offset: start }),
                Some(_) => {}
            }
        }
    }

    fn lex_text_block(&mut self, start: usize) -> Result<TokenKind, LexError> {
        self.bump_str("\"\"\"");
        loop {
            if self.remaining().starts_with("\"\"\"") {
                self.bump_str("\"\"\"");
                return Ok(TokenKind::TextBlock);
            }
            match self.bump_char() {
                Some('\\') => {
                    self.bump_char();
                }
                Some(_) => {}
                None => return Err(LexError::UnterminatedTextBlock { offset: start }),
            }
        }
    }

    fn lex_char_literal(&mut self, start: usize) -> Result<TokenKind, LexError> {
        self.bump_char();
        loop {
            match self.bump_char() {
                Some('\'') => return Ok(TokenKind::CharLiteral),
                Some('\\') => {
                    self.bump_char();
                }
                Some('\n') | None => return Err(LexError::UnterminatedChar { offset: start }),
                Some(_) => {}
            }
        }
    }

    fn next_token(&mut self) -> Option<Result<Token, LexError>> {
        if self.failed {
            return None;
        }
        self.skip_whitespace();
        let start = self.pos;
        let rem = self.remaining();
        let ch = rem.chars().next()?;

        let kind = if rem.starts_with("//") {
            Ok(self.lex_line_comment())
        } else if rem.starts_with("/*") {
            self.lex_block_comment(start)
        } else if ch == '"' {
            self.lex_string_literal(start)
        } else if ch == '\'' {
            self.lex_char_literal(start)
        } else if ch.is_ascii_digit()
            || (ch == '.' && rem[1..].starts_with(|c: char| c.is_ascii_digit()))
        {
            self.bump_char();
            self.eat_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
            Ok(TokenKind::Number)
        } else if is_ident_start(ch) {
            self.eat_while(is_ident_continue);
            Ok(TokenKind::Ident)
        } else {
            self.bump_char();
            Ok(TokenKind::Punct)
        };

        Some(match kind {
            Ok(kind) => Ok(Token {
                kind,
                range: TextRange::new(start, self.pos),
            }),
            Err(err) => {
                self.failed = true;
                Err(err)
            }
        })
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

const JAVA_KEYWORDS: &[&str] = &[
    "abstract",
    "assert",
    "boolean",
    "break",
    "byte",
    "case",
    "catch",
    "char",
    "class",
    "const",
    "continue",
    "default",
    "do",
    "double",
    "else",
    "enum",
    "extends",
    "final",
    "finally",
    "float",
    "for",
    "goto",
    "if",
    "implements",
    "import",
    "instanceof",
    "int",
    "interface",
    "long",
    "native",
    "new",
    "package",
    "private",
    "protected",
    "public",
    "return",
    "short",
    "static",
    "strictfp",
    "super",
    "switch",
    "synchronized",
    "this",
    "throw",
    "throws",
    "transient",
    "try",
    "void",
    "volatile",
    "while",
    "true",
    "false",
    "null",
];

const PRIMITIVE_TYPES: &[&str] = &[
    "boolean", "byte", "char", "double", "float", "int", "long", "short", "var",
];

pub fn is_java_keyword(ident: &str) -> bool {
    JAVA_KEYWORDS.contains(&ident)
}

/// Whether `ident` can end a type in a declaration (`int`, `String`, `var`).
pub fn is_type_name(ident: &str) -> bool {
    PRIMITIVE_TYPES.contains(&ident) || !is_java_keyword(ident)
}
