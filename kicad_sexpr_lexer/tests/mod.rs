use kicad_sexpr_lexer::*;

fn token<K: Keyword>(kind: TokenKind<'_, K>, start: usize, end: usize) -> Token<'_, K> {
    Token {
        kind,
        span: Span::new(start, end),
    }
}

#[track_caller]
fn assert_lexed<K: Keyword>(input: &str, expected: &[Token<K>]) {
    let lexer = Lexer::new(input);

    let tokens = lexer
        .collect::<Result<Vec<_>, _>>()
        .unwrap_or_else(|e| panic!("Failed to lex input: {e}"));

    assert_eq!(tokens, expected);
}

#[track_caller]
fn assert_error(input: &str, expected: Error) {
    let lexer: Lexer<'_, DefaultKeywords> = Lexer::new(input);

    let error = lexer
        .collect::<Result<Vec<_>, _>>()
        .expect_err("expected lexer to return an error");

    assert_eq!(error, expected);
}

#[test]
fn test_lex_empty_list() {
    assert_lexed::<DefaultKeywords>(
        "(test)",
        &[
            token(TokenKind::OpenParen, 0, 1),
            token(TokenKind::Symbol("test"), 1, 5),
            token(TokenKind::CloseParen, 5, 6),
        ],
    );
}

#[test]
fn test_lex_empty_list_with_whitespace() {
    assert_lexed::<DefaultKeywords>(
        "(  test\t\n )",
        &[
            token(TokenKind::OpenParen, 0, 1),
            token(TokenKind::Symbol("test"), 3, 7),
            token(TokenKind::CloseParen, 10, 11),
        ],
    );
}

#[test]
fn test_lex_number() {
    assert_lexed::<DefaultKeywords>("123", &[token(TokenKind::Number(123.0), 0, 3)]);
    assert_lexed::<DefaultKeywords>("-123", &[token(TokenKind::Number(-123.0), 0, 4)]);
    assert_lexed::<DefaultKeywords>("123.456", &[token(TokenKind::Number(123.456), 0, 7)]);
    assert_lexed::<DefaultKeywords>("-0.635", &[token(TokenKind::Number(-0.635), 0, 6)]);
}

#[test]
fn test_lex_string() {
    assert_lexed::<DefaultKeywords>(
        r#""Hello, world!""#,
        &[token(TokenKind::String("Hello, world!"), 0, 15)],
    );
    assert_lexed::<DefaultKeywords>(
        r#""Hello, \"world!""#,
        &[token(TokenKind::String(r#"Hello, \"world!"#), 0, 17)],
    );
}

#[test]
fn test_lex_string_ending_in_escaped_backslash() {
    assert_lexed::<DefaultKeywords>(
        r#"("C:\\" x)"#,
        &[
            token(TokenKind::OpenParen, 0, 1),
            token(TokenKind::String(r#"C:\\"#), 1, 7),
            token(TokenKind::Symbol("x"), 8, 9),
            token(TokenKind::CloseParen, 9, 10),
        ],
    );
}

#[test]
fn test_lex_symbol() {
    assert_lexed::<DefaultKeywords>("yes", &[token(TokenKind::Symbol("yes"), 0, 3)]);
    assert_lexed::<DefaultKeywords>(
        "04740ea2-db09-4cc1-b2d4-53506044432e",
        &[token(
            TokenKind::Symbol("04740ea2-db09-4cc1-b2d4-53506044432e"),
            0,
            36,
        )],
    );
    assert_lexed::<DefaultKeywords>("+3.3V", &[token(TokenKind::Symbol("+3.3V"), 0, 5)]);
    assert_lexed::<DefaultKeywords>("inf", &[token(TokenKind::Symbol("inf"), 0, 3)]);
}

#[test]
fn test_hash_is_not_a_comment() {
    assert_lexed::<DefaultKeywords>(
        "(ref #PWR01)",
        &[
            token(TokenKind::OpenParen, 0, 1),
            token(TokenKind::Symbol("ref"), 1, 4),
            token(TokenKind::Symbol("#PWR01"), 5, 11),
            token(TokenKind::CloseParen, 11, 12),
        ],
    );
}

#[test]
fn test_spans_are_byte_offsets() {
    let input = "(text \"Ω µA\" x)";

    let tokens = Lexer::<DefaultKeywords>::new(input)
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    assert_eq!(tokens[2].span.slice(input), "\"Ω µA\"");
    assert_eq!(tokens[3].span.slice(input), "x");
    assert_eq!(tokens[4].span.end, input.len());
}

#[test]
fn test_lex_nested_lists() {
    assert_lexed::<DefaultKeywords>(
        "(test (nested_one) (nested_two (nested_three)))",
        &[
            token(TokenKind::OpenParen, 0, 1),
            token(TokenKind::Symbol("test"), 1, 5),
            token(TokenKind::OpenParen, 6, 7),
            token(TokenKind::Symbol("nested_one"), 7, 17),
            token(TokenKind::CloseParen, 17, 18),
            token(TokenKind::OpenParen, 19, 20),
            token(TokenKind::Symbol("nested_two"), 20, 30),
            token(TokenKind::OpenParen, 31, 32),
            token(TokenKind::Symbol("nested_three"), 32, 44),
            token(TokenKind::CloseParen, 44, 45),
            token(TokenKind::CloseParen, 45, 46),
            token(TokenKind::CloseParen, 46, 47),
        ],
    );
}

#[test]
fn test_lex_wire_block() {
    assert_lexed::<DefaultKeywords>(
        "(wire (pts (xy 95 100) (xy 95 102.54)))",
        &[
            token(TokenKind::OpenParen, 0, 1),
            token(TokenKind::Symbol("wire"), 1, 5),
            token(TokenKind::OpenParen, 6, 7),
            token(TokenKind::Symbol("pts"), 7, 10),
            token(TokenKind::OpenParen, 11, 12),
            token(TokenKind::Symbol("xy"), 12, 14),
            token(TokenKind::Number(95.0), 15, 17),
            token(TokenKind::Number(100.0), 18, 21),
            token(TokenKind::CloseParen, 21, 22),
            token(TokenKind::OpenParen, 23, 24),
            token(TokenKind::Symbol("xy"), 24, 26),
            token(TokenKind::Number(95.0), 27, 29),
            token(TokenKind::Number(102.54), 30, 36),
            token(TokenKind::CloseParen, 36, 37),
            token(TokenKind::CloseParen, 37, 38),
            token(TokenKind::CloseParen, 38, 39),
        ],
    );
}

#[test]
fn test_lex_unterminated_string() {
    assert_error(
        r#"(uuid "2349f563-989d-4999-a369-9f24d984ce74)"#,
        Error {
            kind: ErrorKind::UnterminatedString,
            line_number: 1,
            column_number: 45,
        },
    );
}

#[test]
fn test_lex_multiline_string() {
    assert_lexed::<DefaultKeywords>(
        "\"first line\nsecond line\"",
        &[token(TokenKind::String("first line\nsecond line"), 0, 24)],
    );
}

#[test]
fn test_error_position_after_newlines() {
    assert_error(
        "(a\n  (b \"oops)",
        Error {
            kind: ErrorKind::UnterminatedString,
            line_number: 2,
            column_number: 12,
        },
    );
}

#[test]
fn test_expect_helpers() {
    let mut lexer = Lexer::<DefaultKeywords>::new("(wire 1)");

    assert!(lexer.expect_open_paren().is_ok());
    assert_eq!(lexer.expect_symbol().unwrap().kind, TokenKind::Symbol("wire"));
    assert_eq!(
        lexer.expect_string().unwrap_err().kind,
        ErrorKind::ExpectedString
    );
    assert!(lexer.expect_close_paren().is_ok());
    assert!(lexer.is_eof());
}

#[test]
fn test_lex_keywords() {
    #[derive(Debug, Clone, Copy, PartialEq, strum::EnumString)]
    #[strum(serialize_all = "snake_case")]
    enum Keywords {
        Wire,
        NoConnect,
    }

    impl Keyword for Keywords {}

    assert_lexed::<Keywords>(
        "(no_connect wire uuid)",
        &[
            token(TokenKind::OpenParen, 0, 1),
            token(TokenKind::Keyword(Keywords::NoConnect), 1, 11),
            token(TokenKind::Keyword(Keywords::Wire), 12, 16),
            token(TokenKind::Symbol("uuid"), 17, 21),
            token(TokenKind::CloseParen, 21, 22),
        ],
    );
}
