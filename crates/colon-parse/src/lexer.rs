use crate::token::{Keyword, Token, TokenType, OPERATORS};
use colon_ast::span::Span;
use tracing::trace;

/// A rule looks at the source from `pos` and returns the end offset of its
/// match. Matches are anchored at `pos` and never empty.
type Rule = fn(&Lexer<'_>, usize) -> Option<usize>;

/// Tried in this order at every position; the first rule that matches wins,
/// even when a later one would match more text.
const RULES: [(TokenType, Rule); 7] = [
    (TokenType::Comment, scan_comment),
    (TokenType::Keyword, scan_keyword),
    (TokenType::String, scan_string),
    (TokenType::Number, scan_number),
    (TokenType::Operator, scan_operator),
    (TokenType::Identifier, scan_identifier),
    (TokenType::Whitespace, scan_whitespace),
];

/// Split `src` into tokens that cover it exactly, in order.
///
/// Spans are `u32` byte offsets; inputs of 4 GiB or more get saturated
/// spans past that point.
pub fn tokenize(src: &str) -> Vec<Token> {
    Lexer::new(src).collect()
}

/// The token whose span contains `offset`, if any.
pub fn token_at(tokens: &[Token], offset: u32) -> Option<&Token> {
    let idx = tokens.partition_point(|t| t.span.end <= offset);
    tokens.get(idx).filter(|t| t.span.contains(offset))
}

pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    /// A matched token held back while the error run in front of it is emitted.
    pending: Option<Token>,
    /// Offset just past the last `*/` in the source. A `/*` starting later
    /// than this can never close.
    last_close_end: Option<usize>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            pending: None,
            last_close_end: src.rfind("*/").map(|i| i + 2),
        }
    }

    fn match_at(&self, pos: usize) -> Option<(TokenType, usize)> {
        RULES
            .iter()
            .find_map(|&(kind, rule)| rule(self, pos).map(|end| (kind, end)))
    }

    fn token(&self, kind: TokenType, start: usize, end: usize) -> Token {
        Token {
            kind,
            text: self.src[start..end].to_string(),
            span: Span::new(start, end),
        }
    }

    fn error(&self, start: usize, end: usize) -> Token {
        let tok = self.token(TokenType::Error, start, end);
        trace!(start, end, text = %tok.text, "unrecognized input");
        tok
    }

    fn char_len_at(&self, pos: usize) -> usize {
        self.src[pos..].chars().next().map_or(1, char::len_utf8)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if let Some(tok) = self.pending.take() {
            return Some(tok);
        }

        let error_start = self.pos;
        while self.pos < self.src.len() {
            let start = self.pos;
            if let Some((kind, end)) = self.match_at(start) {
                let tok = self.token(kind, start, end);
                self.pos = end;
                if error_start < start {
                    self.pending = Some(tok);
                    return Some(self.error(error_start, start));
                }
                return Some(tok);
            }
            self.pos += self.char_len_at(start);
        }

        (error_start < self.pos).then(|| self.error(error_start, self.pos))
    }
}

// ======= rules =======

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn ascii_word_len(s: &str) -> usize {
    s.bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
        .count()
}

fn scan_comment(lx: &Lexer<'_>, pos: usize) -> Option<usize> {
    let rest = &lx.src[pos..];
    if rest.starts_with("//") {
        // the newline belongs to the comment
        let len = rest.find('\n').map_or(rest.len(), |i| i + 1);
        return Some(pos + len);
    }
    if rest.starts_with("/*") {
        // no `*/` left after the opener
        if lx.last_close_end.map_or(true, |end| end < pos + 4) {
            return None;
        }
        return rest[2..].find("*/").map(|i| pos + 2 + i + 2);
    }
    None
}

fn scan_keyword(lx: &Lexer<'_>, pos: usize) -> Option<usize> {
    let src = lx.src;
    if src[..pos].chars().next_back().is_some_and(is_word_char) {
        return None;
    }
    let rest = &src[pos..];
    let len = ascii_word_len(rest);
    if len == 0 || rest[len..].chars().next().is_some_and(is_word_char) {
        return None;
    }
    Keyword::lookup(&rest[..len]).map(|_| pos + len)
}

fn scan_string(lx: &Lexer<'_>, pos: usize) -> Option<usize> {
    let src = lx.src;
    let bytes = src.as_bytes();
    let quote = *bytes.get(pos)?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    for (i, &b) in bytes.iter().enumerate().skip(pos + 1) {
        if b == quote {
            return Some(i + 1);
        }
        if b == b'\n' || b == b'\r' {
            // unterminated: stop before the line break
            return Some(i);
        }
    }
    Some(src.len())
}

fn scan_number(lx: &Lexer<'_>, pos: usize) -> Option<usize> {
    let src = lx.src;
    let digits = |from: usize| {
        src.as_bytes()[from..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };
    let int = digits(pos);
    if int == 0 {
        return None;
    }
    let mut end = pos + int;
    if src.as_bytes().get(end) == Some(&b'.') {
        let frac = digits(end + 1);
        if frac > 0 {
            end += 1 + frac;
        }
    }
    Some(end)
}

fn scan_operator(lx: &Lexer<'_>, pos: usize) -> Option<usize> {
    let c = lx.src[pos..].chars().next()?;
    OPERATORS.contains(c).then_some(pos + 1)
}

fn scan_identifier(lx: &Lexer<'_>, pos: usize) -> Option<usize> {
    let src = lx.src;
    let first = *src.as_bytes().get(pos)?;
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return None;
    }
    Some(pos + ascii_word_len(&src[pos..]))
}

fn scan_whitespace(lx: &Lexer<'_>, pos: usize) -> Option<usize> {
    let len = lx.src.as_bytes()[pos..]
        .iter()
        .take_while(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
        .count();
    (len > 0).then_some(pos + len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<(TokenType, String)> {
        tokenize(src).into_iter().map(|t| (t.kind, t.text)).collect()
    }

    #[test]
    fn keyword_beats_identifier() {
        assert_eq!(kinds("if"), vec![(TokenType::Keyword, "if".into())]);
        assert_eq!(kinds("iffy"), vec![(TokenType::Identifier, "iffy".into())]);
        assert_eq!(kinds("_if"), vec![(TokenType::Identifier, "_if".into())]);
    }

    #[test]
    fn keyword_needs_word_boundary_before() {
        assert_eq!(
            kinds("3if"),
            vec![
                (TokenType::Number, "3".into()),
                (TokenType::Identifier, "if".into()),
            ]
        );
    }

    #[test]
    fn comment_beats_operator() {
        assert_eq!(
            kinds("a//b"),
            vec![
                (TokenType::Identifier, "a".into()),
                (TokenType::Comment, "//b".into()),
            ]
        );
    }

    #[test]
    fn block_comment_stops_at_first_close() {
        assert_eq!(
            kinds("/* a\n */ */"),
            vec![
                (TokenType::Comment, "/* a\n */".into()),
                (TokenType::Whitespace, " ".into()),
                (TokenType::Operator, "*".into()),
                (TokenType::Operator, "/".into()),
            ]
        );
    }

    #[test]
    fn unterminated_block_comment_is_operators() {
        assert_eq!(
            kinds("/*x"),
            vec![
                (TokenType::Operator, "/".into()),
                (TokenType::Operator, "*".into()),
                (TokenType::Identifier, "x".into()),
            ]
        );
    }

    #[test]
    fn close_must_follow_the_opener() {
        // "*/" overlapping the "/*" does not close it
        assert_eq!(
            kinds("/*/"),
            vec![
                (TokenType::Operator, "/".into()),
                (TokenType::Operator, "*".into()),
                (TokenType::Operator, "/".into()),
            ]
        );
        assert_eq!(kinds("/**/"), vec![(TokenType::Comment, "/**/".into())]);
    }

    #[test]
    fn strings_do_not_cross_lines() {
        assert_eq!(
            kinds("'ab\ncd'"),
            vec![
                (TokenType::String, "'ab".into()),
                (TokenType::Whitespace, "\n".into()),
                (TokenType::Identifier, "cd".into()),
                (TokenType::String, "'".into()),
            ]
        );
        assert_eq!(kinds(r#""a'b""#), vec![(TokenType::String, r#""a'b""#.into())]);
    }

    #[test]
    fn number_without_fraction_leaves_the_dot() {
        assert_eq!(
            kinds("3."),
            vec![
                (TokenType::Number, "3".into()),
                (TokenType::Operator, ".".into()),
            ]
        );
        assert_eq!(
            kinds("1.2.3"),
            vec![
                (TokenType::Number, "1.2".into()),
                (TokenType::Operator, ".".into()),
                (TokenType::Number, "3".into()),
            ]
        );
    }

    #[test]
    fn error_runs_are_grouped_between_matches() {
        assert_eq!(
            kinds("a @#$ b"),
            vec![
                (TokenType::Identifier, "a".into()),
                (TokenType::Whitespace, " ".into()),
                (TokenType::Error, "@#$".into()),
                (TokenType::Whitespace, " ".into()),
                (TokenType::Identifier, "b".into()),
            ]
        );
    }

    #[test]
    fn non_ascii_input_becomes_error_tokens_on_char_boundaries() {
        let toks = tokenize("é=ü");
        assert_eq!(toks.len(), 3);
        assert_eq!(toks[0].kind, TokenType::Error);
        assert_eq!(toks[0].text, "é");
        assert_eq!(toks[0].span, Span::new(0, 2));
        assert_eq!(toks[2].text, "ü");
    }

    #[test]
    fn token_at_finds_containing_token() {
        let toks = tokenize("ab + 12");
        assert_eq!(token_at(&toks, 1).map(|t| t.text.as_str()), Some("ab"));
        assert_eq!(token_at(&toks, 3).map(|t| t.text.as_str()), Some("+"));
        assert_eq!(token_at(&toks, 6).map(|t| t.text.as_str()), Some("12"));
        assert!(token_at(&toks, 7).is_none());
    }

    #[test]
    fn empty_input_has_no_tokens() {
        assert!(tokenize("").is_empty());
    }
}
