use colon_parse::{parse_str, tokenize, TokenType, MAX_NESTING_DEPTH};

const LIMIT_MESSAGE: &str = "nesting depth limit exceeded";

fn nested_parens(depth: usize) -> String {
    format!("{}x{}", "(".repeat(depth), ")".repeat(depth))
}

fn nested_ifs(depth: usize) -> String {
    let mut src = String::new();
    for level in 0..depth {
        src.push_str(&" ".repeat(level));
        src.push_str("if x:\n");
    }
    src.push_str(&" ".repeat(depth));
    src.push_str("y\n");
    src
}

fn hit_limit(src: &str) -> bool {
    parse_str(src)
        .diagnostics
        .iter()
        .any(|d| d.message == LIMIT_MESSAGE)
}

#[test]
fn moderate_nesting_is_fine() {
    assert!(parse_str(&nested_parens(50)).diagnostics.is_empty());
    assert!(parse_str(&format!("{}x", "-".repeat(100))).diagnostics.is_empty());
    assert!(parse_str(&nested_ifs(50)).diagnostics.is_empty());
}

#[test]
fn deep_parentheses_are_cut_off() {
    assert!(hit_limit(&nested_parens(MAX_NESTING_DEPTH + 100)));
}

#[test]
fn deep_blocks_are_cut_off() {
    assert!(hit_limit(&nested_ifs(MAX_NESTING_DEPTH + 10)));
}

#[test]
fn long_flat_input_is_not_nesting() {
    let src = "x = 1\n".repeat(5_000);
    let parsed = parse_str(&src);
    assert!(parsed.diagnostics.is_empty());
    assert_eq!(parsed.ast.children(parsed.ast.root()).len(), 5_000);

    let sum = format!("x = {}1", "1 + ".repeat(1_000));
    assert!(parse_str(&sum).diagnostics.is_empty());
}

#[test]
fn unclosed_block_comment_openers_lex_in_linear_time() {
    let src = "/* ".repeat(200_000);
    let started = std::time::Instant::now();
    let tokens = tokenize(&src);
    assert_eq!(tokens.len(), 600_000);
    assert!(tokens.iter().all(|t| t.kind != TokenType::Comment));
    assert!(
        started.elapsed() < std::time::Duration::from_secs(10),
        "took {:?}",
        started.elapsed()
    );

    // one close at the end turns the first opener into a single comment
    let closed = format!("{src}*/");
    let tokens = tokenize(&closed);
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].kind, TokenType::Comment);
}
