use crate::diagnostic::Diagnostic;
use crate::lexer::tokenize;
use crate::token::{Keyword, Token, TokenType};
use colon_ast::ast::{Ast, AstBuilder, BinOp, NodeId, NodeKind, UnOp};
use colon_ast::span::Span;
use tracing::debug;

/// Blocks, parentheses and prefix operators nested deeper than this are
/// replaced by an error node instead of recursing further.
pub const MAX_NESTING_DEPTH: usize = 200;

/// Everything one pass over a source text produces.
#[derive(Debug, Clone)]
pub struct Parsed {
    pub tokens: Vec<Token>,
    pub ast: Ast,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn parse_str(src: &str) -> Parsed {
    let tokens = tokenize(src);
    let (ast, diagnostics) = parse(&tokens);
    Parsed {
        tokens,
        ast,
        diagnostics,
    }
}

/// Build a syntax tree from `tokens`. Never fails: malformed input yields a
/// partial tree and one or more diagnostics.
pub fn parse(tokens: &[Token]) -> (Ast, Vec<Diagnostic>) {
    let mut p = Parser::new(tokens);
    let root = p.parse_program();
    let ast = p.ast.finish(root);
    debug!(
        tokens = tokens.len(),
        nodes = ast.len(),
        diagnostics = p.diagnostics.len(),
        "parsed program"
    );
    (ast, p.diagnostics)
}

/// Position of a significant token relative to the line it sits on.
#[derive(Debug, Clone, Copy)]
struct Layout {
    /// First significant token on its line.
    starts_line: bool,
    /// Indentation of the line, in chars.
    indent: u32,
}

#[derive(Debug, Clone, Copy)]
enum Infix {
    Assign,
    Binary(BinOp),
}

impl Infix {
    /// (left, right) binding power; right < left makes the operator
    /// right-associative.
    fn binding_power(self) -> (u8, u8) {
        match self {
            Infix::Assign => (2, 1),
            Infix::Binary(BinOp::Eq | BinOp::Ne) => (5, 6),
            Infix::Binary(BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge) => (7, 8),
            Infix::Binary(BinOp::Add | BinOp::Sub) => (10, 11),
            Infix::Binary(BinOp::Mul | BinOp::Div) => (20, 21),
        }
    }
}

/// Binding power of prefix operators; tighter than every infix operator.
const PREFIX_BP: u8 = 100;

struct Parser<'t> {
    tokens: &'t [Token],
    /// Indices into `tokens` of everything except whitespace and comments.
    sig: Vec<usize>,
    /// Parallel to `sig`.
    layout: Vec<Layout>,
    /// Index into `sig`; only ever moves forward.
    cursor: usize,
    eof: Span,
    ast: AstBuilder,
    diagnostics: Vec<Diagnostic>,
    depth: usize,
    /// Set once the current statement has reported a problem; silences the
    /// follow-on report when the rest of its line is skipped.
    recovering: bool,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        let mut sig = Vec::new();
        let mut layout = Vec::new();
        let mut at_line_start = true;
        // indentation stops counting at the first comment on a line
        let mut counting = true;
        let mut indent = 0u32;
        let mut line_indent = 0u32;

        for (i, tok) in tokens.iter().enumerate() {
            match tok.kind {
                TokenType::Whitespace => {
                    if let Some(nl) = tok.text.rfind('\n') {
                        at_line_start = true;
                        counting = true;
                        indent = tok.text[nl + 1..].chars().count() as u32;
                    } else if at_line_start && counting {
                        indent += tok.text.chars().count() as u32;
                    }
                }
                TokenType::Comment => {
                    if tok.text.ends_with('\n') {
                        at_line_start = true;
                        counting = true;
                        indent = 0;
                    } else {
                        counting = false;
                    }
                }
                _ => {
                    if at_line_start {
                        line_indent = indent;
                    }
                    sig.push(i);
                    layout.push(Layout {
                        starts_line: at_line_start,
                        indent: line_indent,
                    });
                    at_line_start = false;
                }
            }
        }

        let eof = tokens.last().map_or(Span::at(0), |t| Span::at(t.span.end));
        Self {
            tokens,
            sig,
            layout,
            cursor: 0,
            eof,
            ast: AstBuilder::new(),
            diagnostics: Vec::new(),
            depth: 0,
            recovering: false,
        }
    }

    // ======= cursor primitives =======

    fn peek(&self) -> Option<&'t Token> {
        let tokens = self.tokens;
        self.sig.get(self.cursor).map(move |&i| &tokens[i])
    }

    fn peek_type(&self) -> TokenType {
        self.peek().map_or(TokenType::EndOfInput, |t| t.kind)
    }

    fn at_end(&self) -> bool {
        self.cursor >= self.sig.len()
    }

    fn current_span(&self) -> Span {
        self.peek().map_or(self.eof, |t| t.span)
    }

    fn bump(&mut self) -> Option<&'t Token> {
        let tok = self.peek()?;
        self.cursor += 1;
        Some(tok)
    }

    fn eat(&mut self, ty: TokenType) -> Option<&'t Token> {
        if self.peek_type() == ty {
            self.bump()
        } else {
            None
        }
    }

    /// Consume a token of type `ty`, or report `message` without moving.
    fn expect(&mut self, ty: TokenType, message: &str) -> Option<&'t Token> {
        let tok = self.eat(ty);
        if tok.is_none() {
            self.error(message);
        }
        tok
    }

    fn at_op(&self, sym: &str) -> bool {
        matches!(self.peek(), Some(t) if t.kind == TokenType::Operator && t.text == sym)
    }

    fn eat_op(&mut self, sym: &str) -> Option<&'t Token> {
        if self.at_op(sym) {
            self.bump()
        } else {
            None
        }
    }

    fn expect_op(&mut self, sym: &str, message: &str) -> Option<&'t Token> {
        let tok = self.eat_op(sym);
        if tok.is_none() {
            self.error(message);
        }
        tok
    }

    fn at_keyword(&self) -> Option<Keyword> {
        self.peek()
            .filter(|t| t.kind == TokenType::Keyword)
            .and_then(|t| Keyword::lookup(&t.text))
    }

    fn expect_keyword(&mut self, kw: Keyword, message: &str) -> Option<&'t Token> {
        if self.at_keyword() == Some(kw) {
            self.bump()
        } else {
            self.error(message);
            None
        }
    }

    /// True when the raw token right after the current one is a `=` with no
    /// space in between, making `==`, `!=`, `<=` or `>=`.
    fn glued_eq(&self) -> bool {
        self.sig
            .get(self.cursor)
            .and_then(|&i| self.tokens.get(i + 1))
            .is_some_and(|t| t.kind == TokenType::Operator && t.text == "=")
    }

    /// End of input counts as a line start.
    fn starts_line(&self) -> bool {
        self.layout.get(self.cursor).map_or(true, |l| l.starts_line)
    }

    fn line_indent(&self) -> u32 {
        self.layout.get(self.cursor).map_or(0, |l| l.indent)
    }

    fn error(&mut self, message: &str) {
        let span = self.current_span();
        self.error_at(span, message);
    }

    fn error_at(&mut self, span: Span, message: &str) {
        self.diagnostics.push(Diagnostic::new(message, span));
        self.recovering = true;
    }

    // ======= recovery =======

    fn skip_line(&mut self) {
        while !self.at_end() && !self.starts_line() {
            self.bump();
        }
    }

    /// Consume at least one token, then stop at the next statement boundary.
    fn synchronize(&mut self) {
        self.bump();
        self.skip_to_boundary();
    }

    /// Skip to the next line start, statement keyword, `else` or end of
    /// input. May consume nothing.
    fn skip_to_boundary(&mut self) {
        while !self.at_end()
            && !self.starts_line()
            && !self
                .at_keyword()
                .is_some_and(|kw| kw.starts_statement() || kw == Keyword::Else)
        {
            self.bump();
        }
    }

    /// A simple statement may end here: line start, end of input, `;`, or an
    /// `else` continuing an inline `if` on the same line.
    fn at_statement_end(&self) -> bool {
        self.starts_line() || self.at_op(";") || self.at_keyword() == Some(Keyword::Else)
    }

    /// Skip the rest of a header line and every line indented under it.
    fn skip_block(&mut self, header_indent: u32) {
        self.skip_line();
        while !self.at_end() && self.line_indent() > header_indent {
            self.bump();
            self.skip_line();
        }
    }

    /// Empty error leaf at the cursor, standing in for something missing.
    /// The caller has already reported it.
    fn placeholder(&mut self) -> NodeId {
        let span = Span::at(self.current_span().start);
        self.ast.leaf(NodeKind::Error, "", span)
    }

    /// Consume the current token into an error leaf. The caller has already
    /// reported it.
    fn error_token(&mut self) -> NodeId {
        match self.bump() {
            Some(tok) => self.ast.leaf(NodeKind::Error, &tok.text, tok.span),
            None => self.placeholder(),
        }
    }

    fn nesting_too_deep(&mut self) -> NodeId {
        self.error("nesting depth limit exceeded");
        let node = self.error_token();
        self.skip_line();
        node
    }

    // ======= program / blocks =======

    fn parse_program(&mut self) -> NodeId {
        let base = self.layout.first().map_or(0, |l| l.indent);
        let stmts = self.parse_statements(base, None);
        let span = Span {
            start: 0,
            end: self.eof.end,
        };
        self.ast.alloc(NodeKind::Program, None, span, stmts)
    }

    /// Statements of an indented block whose lines sit at `block_indent`.
    /// Stops at the first line indented no deeper than `parent_indent`.
    fn parse_statements(&mut self, block_indent: u32, parent_indent: Option<u32>) -> Vec<NodeId> {
        let mut stmts = Vec::new();
        while let Some(tok) = self.peek() {
            self.recovering = false;
            if self.starts_line() {
                let indent = self.line_indent();
                if parent_indent.is_some_and(|p| indent <= p) {
                    break;
                }
                if indent > block_indent {
                    self.error_at(tok.span, "unexpected indent");
                } else if indent < block_indent {
                    self.error_at(tok.span, "inconsistent dedent");
                }
            }
            stmts.push(self.parse_statement_synced());
        }
        stmts
    }

    /// `: <statements>` after a header that starts on a line indented by
    /// `header_indent`.
    fn parse_block(&mut self, header_indent: u32, after: &str) -> NodeId {
        let colon = self.current_span();
        if self.expect_op(":", &format!("expected ':' after {after}")).is_none() {
            self.skip_line();
        }

        if self.depth >= MAX_NESTING_DEPTH {
            self.error("nesting depth limit exceeded");
            self.skip_block(header_indent);
            return self
                .ast
                .alloc(NodeKind::Block, None, Span::at(colon.end), Vec::new());
        }
        self.depth += 1;

        let stmts = if !self.starts_line() {
            // inline suite: the rest of the header line, up to an `else`
            let mut stmts = Vec::new();
            while !self.starts_line() && self.at_keyword() != Some(Keyword::Else) {
                self.recovering = false;
                stmts.push(self.parse_statement_synced());
            }
            if stmts.is_empty() {
                self.error("expected a statement after ':'");
            }
            stmts
        } else if !self.at_end() && self.line_indent() > header_indent {
            let indent = self.line_indent();
            self.parse_statements(indent, Some(header_indent))
        } else {
            self.error("expected an indented block");
            Vec::new()
        };
        self.depth -= 1;

        let span = match (stmts.first(), stmts.last()) {
            (Some(&first), Some(&last)) => self.ast.span(first).to(self.ast.span(last)),
            _ => Span::at(colon.end),
        };
        self.ast.alloc(NodeKind::Block, None, span, stmts)
    }

    // ======= statements =======

    /// Parse one statement and guarantee that at least one token was consumed.
    fn parse_statement_synced(&mut self) -> NodeId {
        let before = self.cursor;
        let stmt = self.parse_statement();
        if self.cursor == before {
            self.synchronize();
        }
        stmt
    }

    fn parse_statement(&mut self) -> NodeId {
        match self.at_keyword() {
            Some(Keyword::If) => self.parse_if(),
            Some(Keyword::While) => self.parse_while(),
            Some(Keyword::For) => self.parse_for(),
            Some(Keyword::Def) => self.parse_def(),
            Some(Keyword::Class) => self.parse_class(),
            Some(Keyword::Return) => self.parse_return(),
            Some(Keyword::Else) => self.parse_stray_else(),
            Some(
                Keyword::In
                | Keyword::Not
                | Keyword::True
                | Keyword::False
                | Keyword::None
                | Keyword::Int
                | Keyword::Float
                | Keyword::Str
                | Keyword::Void
                | Keyword::Function,
            )
            | None => self.parse_expression_statement(),
        }
    }

    /// A simple statement ends at a line break, end of input, `;`, or a
    /// same-line `else`. Anything else is skipped up to the next boundary;
    /// a statement keyword on the same line starts the next statement.
    fn end_simple_statement(&mut self) {
        if self.eat_op(";").is_some() || self.at_statement_end() {
            return;
        }
        if !self.recovering {
            let message = format!("expected end of statement, found {}", describe(self.peek()));
            self.error(&message);
        }
        self.skip_to_boundary();
    }

    fn parse_expression_statement(&mut self) -> NodeId {
        let expr = self.parse_expr();
        self.end_simple_statement();
        expr
    }

    /// `if <expr> : <block> [else : <block>]`
    fn parse_if(&mut self) -> NodeId {
        let header_indent = self.line_indent();
        let start = self.current_span();
        self.bump(); // 'if'
        let cond = self.parse_expr();
        let then_ = self.parse_block(header_indent, "if condition");
        let mut children = vec![cond, then_];

        // an indented block always ends at a line start, so a same-line
        // `else` can only follow an inline suite
        let else_here = if self.starts_line() {
            self.line_indent() == header_indent
        } else {
            true
        };
        if self.at_keyword() == Some(Keyword::Else) && else_here {
            self.bump(); // 'else'
            children.push(self.parse_block(header_indent, "'else'"));
        }

        self.alloc_stmt(NodeKind::If, start, children)
    }

    /// `while <expr> : <block>`
    fn parse_while(&mut self) -> NodeId {
        let header_indent = self.line_indent();
        let start = self.current_span();
        self.bump(); // 'while'
        let cond = self.parse_expr();
        let body = self.parse_block(header_indent, "while condition");
        self.alloc_stmt(NodeKind::While, start, vec![cond, body])
    }

    /// `for <identifier> in <expr> : <block>`
    fn parse_for(&mut self) -> NodeId {
        let header_indent = self.line_indent();
        let start = self.current_span();
        self.bump(); // 'for'
        let target = self.parse_name("expected loop variable after 'for'");
        self.expect_keyword(Keyword::In, "expected 'in' after loop variable");
        let iterable = self.parse_expr();
        let body = self.parse_block(header_indent, "for clause");
        self.alloc_stmt(NodeKind::For, start, vec![target, iterable, body])
    }

    /// `def <identifier> ( <params> ) : <block>`
    fn parse_def(&mut self) -> NodeId {
        let header_indent = self.line_indent();
        let start = self.current_span();
        self.bump(); // 'def'
        let name = self.parse_name("expected function name after 'def'");
        let mut children = vec![name];

        if self.expect_op("(", "expected '(' after function name").is_some() {
            while !self.at_op(")") {
                let Some(tok) = self.expect(TokenType::Identifier, "expected parameter name") else {
                    break;
                };
                children.push(self.ast.leaf(NodeKind::Parameter, &tok.text, tok.span));
                if self.eat_op(",").is_none() {
                    break;
                }
            }
            self.expect_op(")", "expected ')' after parameters");
        }

        children.push(self.parse_block(header_indent, "function signature"));
        self.alloc_stmt(NodeKind::FunctionDef, start, children)
    }

    /// `class <identifier> : <block>`
    fn parse_class(&mut self) -> NodeId {
        let header_indent = self.line_indent();
        let start = self.current_span();
        self.bump(); // 'class'
        let name = self.parse_name("expected class name after 'class'");
        let body = self.parse_block(header_indent, "class name");
        self.alloc_stmt(NodeKind::ClassDef, start, vec![name, body])
    }

    /// `return [<expr>]`
    fn parse_return(&mut self) -> NodeId {
        let start = self.current_span();
        self.bump(); // 'return'
        let mut children = Vec::new();
        if !self.at_statement_end() {
            children.push(self.parse_expr());
        }
        self.end_simple_statement();
        self.alloc_stmt(NodeKind::Return, start, children)
    }

    /// An `else` that no `if` claimed. Reported, and its block skipped.
    fn parse_stray_else(&mut self) -> NodeId {
        let header_indent = self.line_indent();
        self.error("'else' without a matching 'if'");
        let node = self.error_token();
        self.skip_block(header_indent);
        node
    }

    fn parse_name(&mut self, message: &str) -> NodeId {
        match self.expect(TokenType::Identifier, message) {
            Some(tok) => self.ast.leaf(NodeKind::Identifier, &tok.text, tok.span),
            None => self.placeholder(),
        }
    }

    fn alloc_stmt(&mut self, kind: NodeKind, start: Span, children: Vec<NodeId>) -> NodeId {
        let span = children
            .last()
            .map_or(start, |&last| start.to(self.ast.span(last)));
        self.ast.alloc(kind, None, span, children)
    }

    // ======= expressions (Pratt parser) =======
    //
    // Binding power (low -> high):
    //   1/2:  =        (right-assoc)
    //   5:    == !=
    //   7:    < <= > >=
    //   10:   + -
    //   20:   * /
    // prefix - / not / ! bind tighter than all infix; rbp = 100
    // postfix call binds tightest of all

    fn parse_expr(&mut self) -> NodeId {
        self.parse_expr_bp(0)
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> NodeId {
        if self.depth >= MAX_NESTING_DEPTH {
            return self.nesting_too_deep();
        }
        self.depth += 1;
        let expr = self.parse_infix(min_bp);
        self.depth -= 1;
        expr
    }

    fn parse_infix(&mut self, min_bp: u8) -> NodeId {
        let mut lhs = self.parse_prefix();

        loop {
            // call application (tightest); a '(' opening a new line is not a call
            if self.at_op("(") && !self.starts_line() {
                lhs = self.parse_call(lhs);
                continue;
            }

            let Some((op, width)) = self.peek_infix() else {
                break;
            };
            let (lbp, rbp) = op.binding_power();
            if lbp < min_bp {
                break;
            }
            for _ in 0..width {
                self.bump();
            }
            let rhs = self.parse_expr_bp(rbp);
            let span = self.ast.span(lhs).to(self.ast.span(rhs));
            lhs = match op {
                Infix::Assign => {
                    if !matches!(
                        self.ast.kind(lhs),
                        NodeKind::Identifier | NodeKind::Error
                    ) {
                        let target = self.ast.span(lhs);
                        self.error_at(target, "invalid assignment target");
                    }
                    self.ast
                        .alloc(NodeKind::Assignment, None, span, vec![lhs, rhs])
                }
                Infix::Binary(bin) => {
                    self.ast
                        .alloc(NodeKind::Binary(bin), None, span, vec![lhs, rhs])
                }
            };
        }

        lhs
    }

    /// `callee ( <args> )` with the cursor on the `(`.
    fn parse_call(&mut self, callee: NodeId) -> NodeId {
        let open = self.current_span();
        self.bump(); // '('
        let mut children = vec![callee];
        while !self.at_op(")") && !self.at_end() {
            children.push(self.parse_expr());
            if self.eat_op(",").is_none() {
                break;
            }
        }
        let end = match self.expect_op(")", "expected ')' after call arguments") {
            Some(tok) => tok.span,
            None => children
                .last()
                .filter(|&&c| c != callee)
                .map_or(open, |&c| self.ast.span(c)),
        };
        let span = self.ast.span(callee).to(end);
        self.ast.alloc(NodeKind::Call, None, span, children)
    }

    /// The infix operator at the cursor and how many tokens spell it.
    fn peek_infix(&self) -> Option<(Infix, usize)> {
        let tok = self.peek().filter(|t| t.kind == TokenType::Operator)?;
        let op = match (tok.text.as_str(), self.glued_eq()) {
            ("=", true) => (Infix::Binary(BinOp::Eq), 2),
            ("!", true) => (Infix::Binary(BinOp::Ne), 2),
            ("<", true) => (Infix::Binary(BinOp::Le), 2),
            (">", true) => (Infix::Binary(BinOp::Ge), 2),
            ("=", false) => (Infix::Assign, 1),
            ("<", false) => (Infix::Binary(BinOp::Lt), 1),
            (">", false) => (Infix::Binary(BinOp::Gt), 1),
            ("+", _) => (Infix::Binary(BinOp::Add), 1),
            ("-", _) => (Infix::Binary(BinOp::Sub), 1),
            ("*", _) => (Infix::Binary(BinOp::Mul), 1),
            ("/", _) => (Infix::Binary(BinOp::Div), 1),
            _ => return None,
        };
        Some(op)
    }

    fn parse_prefix(&mut self) -> NodeId {
        let Some(tok) = self.peek() else {
            return self.missing_expression();
        };

        match tok.kind {
            TokenType::Number => {
                self.bump();
                self.ast.leaf(NodeKind::Number, &tok.text, tok.span)
            }
            TokenType::String => {
                self.bump();
                if !is_closed_string(&tok.text) {
                    self.error_at(tok.span, "unterminated string literal");
                }
                self.ast.leaf(NodeKind::String, &tok.text, tok.span)
            }
            TokenType::Identifier => {
                self.bump();
                self.ast.leaf(NodeKind::Identifier, &tok.text, tok.span)
            }
            TokenType::Keyword => match Keyword::lookup(&tok.text) {
                Some(Keyword::True | Keyword::False | Keyword::None) => {
                    self.bump();
                    self.ast.leaf(NodeKind::Literal, &tok.text, tok.span)
                }
                Some(Keyword::Not) => self.parse_unary(UnOp::Not),
                _ => self.missing_expression(),
            },
            TokenType::Operator => match tok.text.as_str() {
                "-" => self.parse_unary(UnOp::Neg),
                "!" if !self.glued_eq() => self.parse_unary(UnOp::Not),
                "(" => {
                    self.bump();
                    let inner = self.parse_expr();
                    self.expect_op(")", "expected ')' to close parenthesized expression");
                    inner
                }
                _ => self.missing_expression(),
            },
            TokenType::Error => {
                // lexer junk inside an expression is consumed with its report
                self.error(&format!("unrecognized input '{}'", tok.text));
                self.error_token()
            }
            TokenType::Comment | TokenType::Whitespace | TokenType::EndOfInput => {
                self.missing_expression()
            }
        }
    }

    fn parse_unary(&mut self, op: UnOp) -> NodeId {
        let start = self.current_span();
        self.bump(); // operator
        let operand = self.parse_expr_bp(PREFIX_BP);
        let span = start.to(self.ast.span(operand));
        self.ast.alloc(NodeKind::Unary(op), None, span, vec![operand])
    }

    /// Error node for a token that cannot start an expression. The token is
    /// left for the statement-level recovery.
    fn missing_expression(&mut self) -> NodeId {
        let message = format!("expected expression, found {}", describe(self.peek()));
        self.error(&message);
        self.placeholder()
    }
}

fn is_closed_string(text: &str) -> bool {
    let mut chars = text.chars();
    match (chars.next(), chars.next_back()) {
        (Some(open), Some(close)) => open == close,
        _ => false,
    }
}

fn describe(tok: Option<&Token>) -> String {
    let Some(tok) = tok else {
        return "end of input".to_string();
    };
    match tok.kind {
        TokenType::Keyword => format!("keyword '{}'", tok.text),
        TokenType::Identifier => format!("identifier '{}'", tok.text),
        TokenType::Number => format!("number {}", tok.text),
        TokenType::String => format!("string {}", tok.text),
        TokenType::Error => format!("unrecognized input '{}'", tok.text),
        _ => format!("'{}'", tok.text),
    }
}
