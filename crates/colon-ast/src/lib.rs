pub mod span {
    use serde::Serialize;

    /// Half-open byte range `[start, end)` into the source text.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
    pub struct Span {
        pub start: u32,
        pub end: u32,
    }

    impl Span {
        /// Offsets that do not fit in `u32` saturate at `u32::MAX`.
        pub fn new(start: usize, end: usize) -> Self {
            let clamp = |offset: usize| u32::try_from(offset).unwrap_or(u32::MAX);
            Self {
                start: clamp(start),
                end: clamp(end),
            }
        }

        /// Empty span at `offset`.
        pub fn at(offset: u32) -> Self {
            Self {
                start: offset,
                end: offset,
            }
        }

        pub fn len(&self) -> usize {
            (self.end - self.start) as usize
        }

        pub fn is_empty(&self) -> bool {
            self.start == self.end
        }

        pub fn contains(&self, offset: u32) -> bool {
            self.start <= offset && offset < self.end
        }

        /// Smallest span covering both `self` and `other`.
        pub fn to(self, other: Span) -> Span {
            Span {
                start: self.start.min(other.start),
                end: self.end.max(other.end),
            }
        }

        pub fn range(&self) -> std::ops::Range<usize> {
            self.start as usize..self.end as usize
        }
    }

    /// 1-based line and column of a byte offset. Columns count chars, not bytes.
    /// Offsets past the end clamp to the end of the text.
    pub fn line_col(src: &str, offset: u32) -> (usize, usize) {
        let mut offset = (offset as usize).min(src.len());
        while !src.is_char_boundary(offset) {
            offset -= 1;
        }
        let before = &src[..offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let col = before[line_start..].chars().count() + 1;
        (line, col)
    }
}

pub mod ast {
    use super::span::Span;
    use serde::Serialize;
    use std::fmt;

    /// Stable index of a node inside its [`Ast`] arena.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
    #[serde(transparent)]
    pub struct NodeId(u32);

    impl NodeId {
        pub fn index(self) -> usize {
            self.0 as usize
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub enum NodeKind {
        Program,
        Block,
        If,
        While,
        For,
        FunctionDef,
        ClassDef,
        Parameter,
        Return,
        Binary(BinOp),
        Unary(UnOp),
        /// Callee followed by the arguments.
        Call,
        Assignment,
        Number,
        String,
        Identifier,
        /// `True`, `False` or `None`
        Literal,
        Error,
    }

    impl NodeKind {
        /// Kinds that carry their source text and never have children.
        pub fn is_leaf(self) -> bool {
            matches!(
                self,
                NodeKind::Parameter
                    | NodeKind::Number
                    | NodeKind::String
                    | NodeKind::Identifier
                    | NodeKind::Literal
                    | NodeKind::Error
            )
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub enum BinOp {
        // equality
        Eq,
        Ne,
        // relational
        Lt,
        Le,
        Gt,
        Ge,
        // arithmetic
        Add,
        Sub,
        Mul,
        Div,
    }

    impl BinOp {
        pub fn symbol(self) -> &'static str {
            match self {
                BinOp::Eq => "==",
                BinOp::Ne => "!=",
                BinOp::Lt => "<",
                BinOp::Le => "<=",
                BinOp::Gt => ">",
                BinOp::Ge => ">=",
                BinOp::Add => "+",
                BinOp::Sub => "-",
                BinOp::Mul => "*",
                BinOp::Div => "/",
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub enum UnOp {
        Neg,
        /// Written either `not` or `!`.
        Not,
    }

    impl UnOp {
        pub fn symbol(self) -> &'static str {
            match self {
                UnOp::Neg => "-",
                UnOp::Not => "not",
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct Node {
        pub kind: NodeKind,
        /// Source text for leaf kinds, `None` otherwise.
        pub text: Option<String>,
        pub span: Span,
        pub children: Vec<NodeId>,
    }

    /// Arena-allocated syntax tree. Read-only once built; see [`AstBuilder`].
    #[derive(Debug, Clone, Serialize)]
    pub struct Ast {
        nodes: Vec<Node>,
        root: NodeId,
    }

    impl Ast {
        pub fn root(&self) -> NodeId {
            self.root
        }

        pub fn node(&self, id: NodeId) -> &Node {
            &self.nodes[id.index()]
        }

        pub fn kind(&self, id: NodeId) -> NodeKind {
            self.node(id).kind
        }

        pub fn children(&self, id: NodeId) -> &[NodeId] {
            &self.node(id).children
        }

        pub fn text(&self, id: NodeId) -> Option<&str> {
            self.node(id).text.as_deref()
        }

        pub fn span(&self, id: NodeId) -> Span {
            self.node(id).span
        }

        pub fn len(&self) -> usize {
            self.nodes.len()
        }

        pub fn is_empty(&self) -> bool {
            self.nodes.is_empty()
        }

        /// All nodes in allocation order (children before parents).
        pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
            self.nodes
                .iter()
                .enumerate()
                .map(|(i, n)| (NodeId(i as u32), n))
        }

        /// Render the subtree at `id` as an S-expression, e.g. `(+ a (* b c))`.
        pub fn sexpr(&self, id: NodeId) -> String {
            Sexpr { ast: self, id }.to_string()
        }
    }

    struct Sexpr<'a> {
        ast: &'a Ast,
        id: NodeId,
    }

    impl fmt::Display for Sexpr<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let node = self.ast.node(self.id);
            let text = node.text.as_deref().unwrap_or("");
            let tag = match node.kind {
                NodeKind::Number
                | NodeKind::String
                | NodeKind::Identifier
                | NodeKind::Literal => return f.write_str(text),
                NodeKind::Parameter => return write!(f, "(param {text})"),
                NodeKind::Error => return write!(f, "(error {text:?})"),
                NodeKind::Program => "program",
                NodeKind::Block => "block",
                NodeKind::If => "if",
                NodeKind::While => "while",
                NodeKind::For => "for",
                NodeKind::FunctionDef => "def",
                NodeKind::ClassDef => "class",
                NodeKind::Return => "return",
                NodeKind::Binary(op) => op.symbol(),
                NodeKind::Unary(op) => op.symbol(),
                NodeKind::Call => "call",
                NodeKind::Assignment => "=",
            };
            write!(f, "({tag}")?;
            for &child in &node.children {
                write!(f, " {}", Sexpr { ast: self.ast, id: child })?;
            }
            f.write_str(")")
        }
    }

    /// Append-only arena used while parsing. Children must be allocated
    /// before the parent that lists them.
    #[derive(Debug, Default)]
    pub struct AstBuilder {
        nodes: Vec<Node>,
    }

    impl AstBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn alloc(
            &mut self,
            kind: NodeKind,
            text: Option<String>,
            span: Span,
            children: Vec<NodeId>,
        ) -> NodeId {
            debug_assert!(children.iter().all(|c| c.index() < self.nodes.len()));
            let id = NodeId(self.nodes.len() as u32);
            self.nodes.push(Node {
                kind,
                text,
                span,
                children,
            });
            id
        }

        pub fn leaf(&mut self, kind: NodeKind, text: &str, span: Span) -> NodeId {
            self.alloc(kind, Some(text.to_string()), span, Vec::new())
        }

        pub fn span(&self, id: NodeId) -> Span {
            self.nodes[id.index()].span
        }

        pub fn kind(&self, id: NodeId) -> NodeKind {
            self.nodes[id.index()].kind
        }

        pub fn finish(self, root: NodeId) -> Ast {
            Ast {
                nodes: self.nodes,
                root,
            }
        }
    }
}
