use pvmc::diagnostics::ErrorKind;
use pvmc::lexer::{Lexer, Position, TokenKind};

fn kinds(input: &str) -> Vec<TokenKind> {
    Lexer::tokenize(input).into_iter().map(|t| t.kind).collect()
}

#[test]
fn keywords_are_case_insensitive() {
    assert_eq!(
        kinds("BEGIN End wHiLe"),
        vec![
            TokenKind::Begin,
            TokenKind::End,
            TokenKind::While,
            TokenKind::Eof
        ]
    );
}

#[test]
fn identifiers_keep_their_spelling() {
    assert_eq!(
        kinds("Counter _tmp x1"),
        vec![
            TokenKind::Ident("Counter".to_string()),
            TokenKind::Ident("_tmp".to_string()),
            TokenKind::Ident("x1".to_string()),
            TokenKind::Eof
        ]
    );
}

#[test]
fn longest_symbol_wins() {
    assert_eq!(
        kinds("a:=b<=c<>d..e"),
        vec![
            TokenKind::Ident("a".to_string()),
            TokenKind::Assign,
            TokenKind::Ident("b".to_string()),
            TokenKind::LessEqual,
            TokenKind::Ident("c".to_string()),
            TokenKind::NotEqual,
            TokenKind::Ident("d".to_string()),
            TokenKind::DotDot,
            TokenKind::Ident("e".to_string()),
            TokenKind::Eof
        ]
    );
}

#[test]
fn numbers() {
    assert_eq!(
        kinds("42 1.5 1e3 2.5E-2"),
        vec![
            TokenKind::IntLit(42),
            TokenKind::RealLit(1.5),
            TokenKind::RealLit(1000.0),
            TokenKind::RealLit(0.025),
            TokenKind::Eof
        ]
    );
}

#[test]
fn integer_range_is_not_a_real() {
    assert_eq!(
        kinds("1..10"),
        vec![
            TokenKind::IntLit(1),
            TokenKind::DotDot,
            TokenKind::IntLit(10),
            TokenKind::Eof
        ]
    );
}

#[test]
fn integer_overflow_is_an_error_token() {
    let tokens = kinds("99999999999999999999");
    assert!(matches!(
        &tokens[0],
        TokenKind::Error(ErrorKind::IntegerOutOfRange(_))
    ));
}

#[test]
fn strings_with_escaped_quote() {
    assert_eq!(
        kinds("'it''s' ''"),
        vec![
            TokenKind::StrLit("it's".to_string()),
            TokenKind::StrLit(String::new()),
            TokenKind::Eof
        ]
    );
}

#[test]
fn unterminated_string_stops_at_end_of_line() {
    let tokens = Lexer::tokenize("'abc\nx");
    assert_eq!(
        tokens[0].kind,
        TokenKind::Error(ErrorKind::UnterminatedString)
    );
    assert_eq!(tokens[1].kind, TokenKind::Ident("x".to_string()));
    assert_eq!(tokens[1].pos, Position::new(2, 1));
}

#[test]
fn comments_are_skipped() {
    assert_eq!(
        kinds("a { one } b (* two *) c // three\nd"),
        vec![
            TokenKind::Ident("a".to_string()),
            TokenKind::Ident("b".to_string()),
            TokenKind::Ident("c".to_string()),
            TokenKind::Ident("d".to_string()),
            TokenKind::Eof
        ]
    );
}

#[test]
fn unterminated_comment() {
    let tokens = Lexer::tokenize("a (* never closed");
    assert_eq!(
        tokens[1].kind,
        TokenKind::Error(ErrorKind::UnterminatedComment)
    );
    assert_eq!(tokens[1].pos, Position::new(1, 3));
    assert_eq!(tokens[2].kind, TokenKind::Eof);
}

#[test]
fn unrecognized_character_is_skipped() {
    let tokens = Lexer::tokenize("a ? b");
    assert_eq!(
        tokens[1].kind,
        TokenKind::Error(ErrorKind::UnrecognizedCharacter('?'))
    );
    assert_eq!(tokens[2].kind, TokenKind::Ident("b".to_string()));
}

#[test]
fn positions_are_one_based() {
    let tokens = Lexer::tokenize("begin\n  x := 1\nend");
    let positions: Vec<_> = tokens.iter().map(|t| t.pos).collect();
    assert_eq!(
        positions,
        vec![
            Position::new(1, 1),
            Position::new(2, 3),
            Position::new(2, 5),
            Position::new(2, 8),
            Position::new(3, 1),
            Position::new(3, 4),
        ]
    );
}

#[test]
fn stops_after_eof_and_can_be_reset() {
    let mut lexer = Lexer::new("x");
    assert_eq!(lexer.next().map(|t| t.kind), Some(TokenKind::Ident("x".to_string())));
    assert_eq!(lexer.next().map(|t| t.kind), Some(TokenKind::Eof));
    assert_eq!(lexer.next(), None);

    lexer.reset();
    assert_eq!(lexer.count(), 2);
}

#[test]
fn lazy_stream_reports_positions_of_trivia_errors() {
    let mut lexer = Lexer::new("x\n  { never closed");
    let first = lexer.next().unwrap();
    assert_eq!(first.pos, Position::new(1, 1));
    let error = lexer.next().unwrap();
    assert_eq!(error.kind, TokenKind::Error(ErrorKind::UnterminatedComment));
    assert_eq!(error.pos, Position::new(2, 3));
    assert_eq!(lexer.next().map(|t| t.kind), Some(TokenKind::Eof));
}
