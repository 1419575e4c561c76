use colon_ast::span::Span;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenType {
    Keyword,
    Operator,
    Identifier,
    Number,
    String,
    Comment,
    Whitespace,
    /// Input no rule matched; the text is the raw unmatched run.
    Error,
    /// Never produced by the lexer; the parser reports it past the last token.
    EndOfInput,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenType::Keyword => "Keyword",
            TokenType::Operator => "Operator",
            TokenType::Identifier => "Identifier",
            TokenType::Number => "Number",
            TokenType::String => "String",
            TokenType::Comment => "Comment",
            TokenType::Whitespace => "Whitespace",
            TokenType::Error => "Error",
            TokenType::EndOfInput => "EndOfInput",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenType,
    pub text: String,
    pub span: Span,
}

/// Reserved words. Anything else made of word characters is an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    If,
    Else,
    While,
    For,
    In,
    Def,
    Class,
    Return,
    Not,
    True,
    False,
    None,
    // reserved type names; highlighted, but never start a construct
    Int,
    Float,
    Str,
    Void,
    Function,
}

impl Keyword {
    pub const ALL: [Keyword; 17] = [
        Keyword::If,
        Keyword::Else,
        Keyword::While,
        Keyword::For,
        Keyword::In,
        Keyword::Def,
        Keyword::Class,
        Keyword::Return,
        Keyword::Not,
        Keyword::True,
        Keyword::False,
        Keyword::None,
        Keyword::Int,
        Keyword::Float,
        Keyword::Str,
        Keyword::Void,
        Keyword::Function,
    ];

    pub fn lookup(word: &str) -> Option<Keyword> {
        Self::ALL.into_iter().find(|kw| kw.as_str() == word)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::If => "if",
            Keyword::Else => "else",
            Keyword::While => "while",
            Keyword::For => "for",
            Keyword::In => "in",
            Keyword::Def => "def",
            Keyword::Class => "class",
            Keyword::Return => "return",
            Keyword::Not => "not",
            Keyword::True => "True",
            Keyword::False => "False",
            Keyword::None => "None",
            Keyword::Int => "int",
            Keyword::Float => "float",
            Keyword::Str => "string",
            Keyword::Void => "void",
            Keyword::Function => "function",
        }
    }

    /// Keywords that open a statement; error recovery stops in front of them.
    pub fn starts_statement(self) -> bool {
        matches!(
            self,
            Keyword::If
                | Keyword::While
                | Keyword::For
                | Keyword::Def
                | Keyword::Class
                | Keyword::Return
        )
    }
}

/// Every character the lexer accepts as a one-character operator.
pub const OPERATORS: &str = "+-*/=<>!&|;:,.(){}[]";
