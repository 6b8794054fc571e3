//! SQL parsing shared by readonly enforcement and the permission gateway.

use sqlparser::ast::Statement;
use sqlparser::dialect::DuckDbDialect;
use sqlparser::parser::{Parser, ParserError};
use sqlparser::tokenizer::{Token, Tokenizer};

/// Parses `sql` with the DuckDB dialect, refusing text whose literals
/// DuckDB would delimit differently.
///
/// DuckDB reads `E'...'` as an escape string in which `\'` is a quote.
/// sqlparser reads the same text as the word `E` followed by an ordinary
/// literal, so the two disagree on where the literal ends and anything
/// after it.
pub fn parse_statements(sql: &str) -> Result<Vec<Statement>, ParserError> {
    let dialect = DuckDbDialect {};
    let tokens = Tokenizer::new(&dialect, sql).tokenize()?;
    if has_escape_string(&tokens) {
        return Err(ParserError::ParserError(
            "escape string literals (E'...') are not supported".to_string(),
        ));
    }
    Parser::parse_sql(&dialect, sql)
}

fn has_escape_string(tokens: &[Token]) -> bool {
    tokens.windows(2).any(|pair| {
        matches!(
            pair,
            [Token::Word(word), Token::SingleQuotedString(_)]
                if word.quote_style.is_none() && word.value.eq_ignore_ascii_case("e")
        )
    })
}
