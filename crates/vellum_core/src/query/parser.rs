//! Recursive-descent parser for the filter language.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! expr       = orExpr
//! orExpr     = andExpr ( "or"  andExpr )*
//! andExpr    = notExpr ( "and" notExpr )*
//! notExpr    = "not" primary | primary
//! primary    = "(" expr ")" | "{" JSON object "}" | comparison
//! comparison = path op valueExpr
//! op         = "==" | "=" | "!=" | ">" | ">=" | "<" | "<=" | "contains" | "like"
//! valueExpr  = addExpr
//! addExpr    = mulExpr ( ("+"|"-") mulExpr )*
//! mulExpr    = unary  ( ("*"|"/") unary )*
//! unary      = "-" unary | term
//! term       = "(" valueExpr ")" | "&" path | quoted | bool | number | bare
//! ```
//!
//! A bare word that parses as a double is a number literal, otherwise a
//! string literal; the reserved words `and`/`or`/`not` are never bare
//! literals. A `{...}` primary desugars to an `and` of equality
//! comparisons over the object's keys.

use crate::error::{Error, Result};
use crate::query::ast::{ArithOp, CmpOp, Filter, ValueExpr};
use crate::query::token::{Lexer, Token};
use crate::value::{Fields, Value};

/// Parses a filter expression.
///
/// # Errors
///
/// Returns [`Error::Parse`] for structural violations: unclosed
/// parentheses, missing operators or operands, unterminated strings,
/// trailing input.
pub fn parse(input: &str) -> Result<Filter> {
    let mut lexer = Lexer::new(input);
    let filter = parse_or(&mut lexer)?;
    expect_end(&mut lexer)?;
    Ok(filter)
}

/// Parses a standalone value expression.
///
/// # Errors
///
/// Returns [`Error::Parse`] on malformed input, as [`parse`] does.
pub fn parse_value(input: &str) -> Result<ValueExpr> {
    let mut lexer = Lexer::new(input);
    let expr = parse_add(&mut lexer)?;
    expect_end(&mut lexer)?;
    Ok(expr)
}

fn expect_end(lexer: &mut Lexer<'_>) -> Result<()> {
    match lexer.next()? {
        None => Ok(()),
        Some(token) => Err(Error::parse(format!(
            "unexpected input after expression: '{token}'"
        ))),
    }
}

fn expect(lexer: &mut Lexer<'_>, expected: &Token) -> Result<()> {
    match lexer.next()? {
        Some(ref token) if token == expected => Ok(()),
        Some(token) => Err(Error::parse(format!(
            "expected '{expected}', found '{token}'"
        ))),
        None => Err(Error::parse(format!(
            "expected '{expected}', found end of input"
        ))),
    }
}

fn peek_keyword(lexer: &Lexer<'_>, keyword: &str) -> Result<bool> {
    Ok(matches!(lexer.peek()?, Some(Token::Word(w)) if w == keyword))
}

fn parse_or(lexer: &mut Lexer<'_>) -> Result<Filter> {
    let mut parts = vec![parse_and(lexer)?];
    while peek_keyword(lexer, "or")? {
        lexer.next()?;
        parts.push(parse_and(lexer)?);
    }
    Ok(if parts.len() == 1 {
        parts.remove(0)
    } else {
        Filter::Or(parts)
    })
}

fn parse_and(lexer: &mut Lexer<'_>) -> Result<Filter> {
    let mut parts = vec![parse_not(lexer)?];
    while peek_keyword(lexer, "and")? {
        lexer.next()?;
        parts.push(parse_not(lexer)?);
    }
    Ok(if parts.len() == 1 {
        parts.remove(0)
    } else {
        Filter::And(parts)
    })
}

fn parse_not(lexer: &mut Lexer<'_>) -> Result<Filter> {
    if peek_keyword(lexer, "not")? {
        lexer.next()?;
        return Ok(Filter::Not(Box::new(parse_primary(lexer)?)));
    }
    parse_primary(lexer)
}

fn parse_primary(lexer: &mut Lexer<'_>) -> Result<Filter> {
    match lexer.peek()? {
        Some(Token::LParen) => {
            lexer.next()?;
            let filter = parse_or(lexer)?;
            expect(lexer, &Token::RParen)?;
            Ok(filter)
        }
        Some(Token::LBrace) => parse_json_filter(lexer),
        _ => parse_comparison(lexer),
    }
}

fn parse_json_filter(lexer: &mut Lexer<'_>) -> Result<Filter> {
    let raw = lexer.capture_object()?;
    let object: Fields = serde_json::from_str(raw)
        .map_err(|err| Error::parse(format!("invalid JSON filter: {err}")))?;
    Ok(Filter::And(
        object
            .into_iter()
            .map(|(path, value)| Filter::Compare {
                path,
                op: CmpOp::Eq,
                rhs: ValueExpr::Literal(value),
            })
            .collect(),
    ))
}

fn parse_comparison(lexer: &mut Lexer<'_>) -> Result<Filter> {
    let path = match lexer.next()? {
        Some(Token::Word(word)) => word,
        Some(token) => {
            return Err(Error::parse(format!(
                "expected a field path, found '{token}'"
            )))
        }
        None => return Err(Error::parse("expected a field path, found end of input")),
    };
    let op = match lexer.next()? {
        Some(Token::Eq) => CmpOp::Eq,
        Some(Token::Ne) => CmpOp::Ne,
        Some(Token::Gt) => CmpOp::Gt,
        Some(Token::Gte) => CmpOp::Gte,
        Some(Token::Lt) => CmpOp::Lt,
        Some(Token::Lte) => CmpOp::Lte,
        Some(Token::Word(ref word)) if word == "contains" => CmpOp::Contains,
        Some(Token::Word(ref word)) if word == "like" => CmpOp::Like,
        Some(token) => {
            return Err(Error::parse(format!(
                "expected a comparison operator, found '{token}'"
            )))
        }
        None => {
            return Err(Error::parse(
                "expected a comparison operator, found end of input",
            ))
        }
    };
    let rhs = parse_add(lexer)?;
    Ok(Filter::Compare { path, op, rhs })
}

fn parse_add(lexer: &mut Lexer<'_>) -> Result<ValueExpr> {
    let mut left = parse_mul(lexer)?;
    loop {
        let op = match lexer.peek()? {
            Some(Token::Plus) => ArithOp::Add,
            Some(Token::Minus) => ArithOp::Sub,
            _ => break,
        };
        lexer.next()?;
        let right = parse_mul(lexer)?;
        left = ValueExpr::Binary {
            op,
            lhs: Box::new(left),
            rhs: Box::new(right),
        };
    }
    Ok(left)
}

fn parse_mul(lexer: &mut Lexer<'_>) -> Result<ValueExpr> {
    let mut left = parse_unary(lexer)?;
    loop {
        let op = match lexer.peek()? {
            Some(Token::Star) => ArithOp::Mul,
            Some(Token::Slash) => ArithOp::Div,
            _ => break,
        };
        lexer.next()?;
        let right = parse_unary(lexer)?;
        left = ValueExpr::Binary {
            op,
            lhs: Box::new(left),
            rhs: Box::new(right),
        };
    }
    Ok(left)
}

fn parse_unary(lexer: &mut Lexer<'_>) -> Result<ValueExpr> {
    if matches!(lexer.peek()?, Some(Token::Minus)) {
        lexer.next()?;
        let operand = parse_unary(lexer)?;
        return Ok(ValueExpr::Binary {
            op: ArithOp::Sub,
            lhs: Box::new(ValueExpr::Literal(Value::from(0))),
            rhs: Box::new(operand),
        });
    }
    parse_term(lexer)
}

fn parse_term(lexer: &mut Lexer<'_>) -> Result<ValueExpr> {
    match lexer.next()? {
        None => Err(Error::parse("expected a value, found end of input")),
        Some(Token::LParen) => {
            let expr = parse_add(lexer)?;
            expect(lexer, &Token::RParen)?;
            Ok(expr)
        }
        Some(Token::Amp) => match lexer.next()? {
            Some(Token::Word(path)) => Ok(ValueExpr::Field(path)),
            Some(token) => Err(Error::parse(format!(
                "expected a field path after '&', found '{token}'"
            ))),
            None => Err(Error::parse("expected a field path after '&'")),
        },
        Some(Token::Str(text)) => Ok(ValueExpr::Literal(Value::String(text))),
        Some(Token::Word(word)) => Ok(ValueExpr::Literal(bare_literal(word)?)),
        Some(token) => Err(Error::parse(format!(
            "expected a value, found '{token}'"
        ))),
    }
}

/// Interprets a bare word per the grammar: boolean, number, or string.
fn bare_literal(word: String) -> Result<Value> {
    if word.eq_ignore_ascii_case("true") {
        return Ok(Value::Bool(true));
    }
    if word.eq_ignore_ascii_case("false") {
        return Ok(Value::Bool(false));
    }
    if word == "and" || word == "or" || word == "not" {
        return Err(Error::parse(format!(
            "unexpected keyword '{word}' in value position"
        )));
    }
    if let Ok(number) = word.parse::<f64>() {
        if let Some(number) = serde_json::Number::from_f64(number) {
            return Ok(Value::Number(number));
        }
    }
    Ok(Value::String(word))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compare(path: &str, op: CmpOp, rhs: Value) -> Filter {
        Filter::Compare {
            path: path.into(),
            op,
            rhs: ValueExpr::Literal(rhs),
        }
    }

    #[test]
    fn numeric_comparison() {
        let filter = parse("age >= 30").unwrap();
        assert_eq!(filter, compare("age", CmpOp::Gte, json!(30.0)));
    }

    #[test]
    fn equals_alias() {
        assert_eq!(parse("a = 1").unwrap(), parse("a == 1").unwrap());
    }

    #[test]
    fn bare_word_is_string_literal() {
        let filter = parse("name == alice").unwrap();
        assert_eq!(filter, compare("name", CmpOp::Eq, json!("alice")));
    }

    #[test]
    fn quoted_string_literal() {
        let filter = parse("city == \"New York\"").unwrap();
        assert_eq!(filter, compare("city", CmpOp::Eq, json!("New York")));
    }

    #[test]
    fn boolean_literals_any_case() {
        assert_eq!(
            parse("flag == TRUE").unwrap(),
            compare("flag", CmpOp::Eq, json!(true))
        );
        assert_eq!(
            parse("flag == false").unwrap(),
            compare("flag", CmpOp::Eq, json!(false))
        );
    }

    #[test]
    fn uuid_bare_literal() {
        let filter = parse("ref == 550e8400-e29b-41d4").unwrap();
        assert_eq!(
            filter,
            compare("ref", CmpOp::Eq, json!("550e8400-e29b-41d4"))
        );
    }

    #[test]
    fn and_or_precedence() {
        // a == 1 or b == 2 and c == 3  ⇒  a == 1 or (b == 2 and c == 3)
        let filter = parse("a == 1 or b == 2 and c == 3").unwrap();
        let Filter::Or(parts) = filter else {
            panic!("expected Or at the top");
        };
        assert_eq!(parts.len(), 2);
        assert!(matches!(parts[1], Filter::And(_)));
    }

    #[test]
    fn parentheses_group() {
        let filter = parse("(a == 1 or b == 2) and c == 3").unwrap();
        let Filter::And(parts) = filter else {
            panic!("expected And at the top");
        };
        assert!(matches!(parts[0], Filter::Or(_)));
    }

    #[test]
    fn not_binds_to_primary() {
        let filter = parse("not a == 1").unwrap();
        assert!(matches!(filter, Filter::Not(_)));
    }

    #[test]
    fn contains_and_like_operators() {
        assert_eq!(
            parse("name contains \"li\"").unwrap(),
            compare("name", CmpOp::Contains, json!("li"))
        );
        assert_eq!(
            parse("name like \"a%\"").unwrap(),
            compare("name", CmpOp::Like, json!("a%"))
        );
    }

    #[test]
    fn json_filter_desugars_to_and_of_equals() {
        let filter = parse("{\"age\": 30, \"name\": \"Alice\"}").unwrap();
        assert_eq!(
            filter,
            Filter::And(vec![
                compare("age", CmpOp::Eq, json!(30)),
                compare("name", CmpOp::Eq, json!("Alice")),
            ])
        );
    }

    #[test]
    fn empty_json_filter_matches_nothing() {
        let filter = parse("{}").unwrap();
        assert_eq!(filter, Filter::And(vec![]));
    }

    #[test]
    fn json_filter_nested_value_stays_literal() {
        let filter = parse("{\"address\": {\"city\": \"Paris\"}}").unwrap();
        assert_eq!(
            filter,
            Filter::And(vec![compare(
                "address",
                CmpOp::Eq,
                json!({"city": "Paris"})
            )])
        );
    }

    #[test]
    fn field_reference_rhs() {
        let filter = parse("a == &b.c").unwrap();
        assert_eq!(
            filter,
            Filter::Compare {
                path: "a".into(),
                op: CmpOp::Eq,
                rhs: ValueExpr::Field("b.c".into()),
            }
        );
    }

    #[test]
    fn arithmetic_precedence() {
        // 1 + 2 * 3  ⇒  1 + (2 * 3)
        let expr = parse_value("1 + 2 * 3").unwrap();
        let ValueExpr::Binary { op, rhs, .. } = expr else {
            panic!("expected binary node");
        };
        assert_eq!(op, ArithOp::Add);
        assert!(matches!(
            *rhs,
            ValueExpr::Binary {
                op: ArithOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn unary_minus_desugars() {
        let expr = parse_value("-5").unwrap();
        assert_eq!(
            expr,
            ValueExpr::Binary {
                op: ArithOp::Sub,
                lhs: Box::new(ValueExpr::Literal(json!(0))),
                rhs: Box::new(ValueExpr::Literal(json!(5.0))),
            }
        );
    }

    #[test]
    fn value_parentheses() {
        let expr = parse_value("(1 + 2) * 3").unwrap();
        let ValueExpr::Binary { op, lhs, .. } = expr else {
            panic!("expected binary node");
        };
        assert_eq!(op, ArithOp::Mul);
        assert!(matches!(
            *lhs,
            ValueExpr::Binary {
                op: ArithOp::Add,
                ..
            }
        ));
    }

    #[test]
    fn unclosed_paren_errors() {
        assert!(parse("(a == 1").is_err());
        assert!(parse_value("(1 + 2").is_err());
    }

    #[test]
    fn missing_operand_errors() {
        assert!(parse("age >=").is_err());
        assert!(parse("age").is_err());
        assert!(parse_value("1 +").is_err());
    }

    #[test]
    fn unterminated_string_errors() {
        assert!(parse("name == \"oops").is_err());
    }

    #[test]
    fn trailing_input_errors() {
        assert!(parse("a == 1 b == 2").is_err());
    }

    #[test]
    fn keyword_in_value_position_errors() {
        assert!(parse("a == and").is_err());
    }

    #[test]
    fn invalid_json_filter_errors() {
        assert!(parse("{\"age\": }").is_err());
    }
}
