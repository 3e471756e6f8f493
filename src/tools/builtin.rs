//! Reference tool implementations: minimal working examples and test
//! fixtures, not a claim to cover the filesystem/HTTP/search tools a real
//! deployment would register (those are out of scope — concrete tool
//! implementations are external collaborators).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use super::{ToolHandler, ToolOutcome, ToolParamSchema, ToolSpec};

/// Echoes its `input` argument back verbatim. Used by the executor's own
/// tests as the simplest possible handler.
#[derive(Debug, Default)]
pub struct EchoTool;

#[async_trait]
impl ToolHandler for EchoTool {
    async fn call(&self, _ctx: CancellationToken, args: Map<String, Value>) -> Result<ToolOutcome, String> {
        let input = args
            .get("input")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(ToolOutcome::Text(input))
    }
}

impl EchoTool {
    pub fn spec() -> ToolSpec {
        let mut parameters = HashMap::new();
        parameters.insert(
            "input".to_string(),
            ToolParamSchema::new("string", "Text to echo back", true),
        );
        ToolSpec {
            name: "echo".to_string(),
            description: "Returns the given input unchanged.".to_string(),
            parameters,
            handler: Arc::new(EchoTool),
        }
    }
}

/// Returns the current UTC time as RFC3339. Demonstrates a zero-argument
/// tool handler.
#[derive(Debug, Default)]
pub struct ClockTool;

#[async_trait]
impl ToolHandler for ClockTool {
    async fn call(&self, _ctx: CancellationToken, _args: Map<String, Value>) -> Result<ToolOutcome, String> {
        Ok(ToolOutcome::Text(Utc::now().to_rfc3339()))
    }
}

impl ClockTool {
    pub fn spec() -> ToolSpec {
        ToolSpec {
            name: "clock".to_string(),
            description: "Returns the current UTC time.".to_string(),
            parameters: HashMap::new(),
            handler: Arc::new(ClockTool),
        }
    }
}

/// Evaluates a tiny arithmetic expression over integers: `+ - * /` and
/// parentheses, left-to-right with standard precedence. Demonstrates an
/// error-returning handler (division by zero, malformed input).
#[derive(Debug, Default)]
pub struct ExprTool;

#[async_trait]
impl ToolHandler for ExprTool {
    async fn call(&self, _ctx: CancellationToken, args: Map<String, Value>) -> Result<ToolOutcome, String> {
        let expr = args
            .get("expr")
            .and_then(Value::as_str)
            .ok_or_else(|| "missing required argument `expr`".to_string())?;
        let result = eval_expr(expr)?;
        Ok(ToolOutcome::Text(format!("Result: {result}")))
    }
}

impl ExprTool {
    pub fn spec() -> ToolSpec {
        let mut parameters = HashMap::new();
        parameters.insert(
            "expr".to_string(),
            ToolParamSchema::new("string", "Arithmetic expression, e.g. \"6*7\"", true),
        );
        ToolSpec {
            name: "calculator".to_string(),
            description: "Evaluates a basic arithmetic expression over integers.".to_string(),
            parameters,
            handler: Arc::new(ExprTool),
        }
    }
}

/// A small recursive-descent evaluator for `+ - * / ( )` over i64 integers.
fn eval_expr(input: &str) -> Result<i64, String> {
    let tokens = tokenize(input)?;
    let mut pos = 0;
    let value = parse_expr(&tokens, &mut pos)?;
    if pos != tokens.len() {
        return Err(format!("unexpected trailing input in expression: {input}"));
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(i64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            d if d.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let num_str: String = chars[start..i].iter().collect();
                let num = num_str
                    .parse::<i64>()
                    .map_err(|_| format!("invalid number: {num_str}"))?;
                tokens.push(Token::Num(num));
            }
            other => return Err(format!("unexpected character '{other}' in expression")),
        }
    }
    Ok(tokens)
}

fn parse_expr(tokens: &[Token], pos: &mut usize) -> Result<i64, String> {
    let mut value = parse_term(tokens, pos)?;
    loop {
        match tokens.get(*pos) {
            Some(Token::Plus) => {
                *pos += 1;
                value += parse_term(tokens, pos)?;
            }
            Some(Token::Minus) => {
                *pos += 1;
                value -= parse_term(tokens, pos)?;
            }
            _ => break,
        }
    }
    Ok(value)
}

fn parse_term(tokens: &[Token], pos: &mut usize) -> Result<i64, String> {
    let mut value = parse_factor(tokens, pos)?;
    loop {
        match tokens.get(*pos) {
            Some(Token::Star) => {
                *pos += 1;
                value *= parse_factor(tokens, pos)?;
            }
            Some(Token::Slash) => {
                *pos += 1;
                let divisor = parse_factor(tokens, pos)?;
                if divisor == 0 {
                    return Err("division by zero".to_string());
                }
                value /= divisor;
            }
            _ => break,
        }
    }
    Ok(value)
}

fn parse_factor(tokens: &[Token], pos: &mut usize) -> Result<i64, String> {
    match tokens.get(*pos) {
        Some(Token::Num(n)) => {
            *pos += 1;
            Ok(*n)
        }
        Some(Token::Minus) => {
            *pos += 1;
            Ok(-parse_factor(tokens, pos)?)
        }
        Some(Token::LParen) => {
            *pos += 1;
            let value = parse_expr(tokens, pos)?;
            match tokens.get(*pos) {
                Some(Token::RParen) => {
                    *pos += 1;
                    Ok(value)
                }
                _ => Err("expected closing parenthesis".to_string()),
            }
        }
        other => Err(format!("unexpected token: {other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_returns_input_verbatim() {
        let mut args = Map::new();
        args.insert("input".to_string(), Value::String("hello".to_string()));
        let result = EchoTool.call(CancellationToken::new(), args).await.unwrap();
        assert_eq!(result.render(), "hello");
    }

    #[tokio::test]
    async fn calculator_evaluates_multiplication() {
        let mut args = Map::new();
        args.insert("expr".to_string(), Value::String("6*7".to_string()));
        let result = ExprTool.call(CancellationToken::new(), args).await.unwrap();
        assert_eq!(result.render(), "Result: 42");
    }

    #[tokio::test]
    async fn calculator_rejects_division_by_zero() {
        let mut args = Map::new();
        args.insert("expr".to_string(), Value::String("1/0".to_string()));
        let err = ExprTool.call(CancellationToken::new(), args).await.unwrap_err();
        assert!(err.contains("division by zero"));
    }

    #[test]
    fn eval_expr_respects_precedence_and_parens() {
        assert_eq!(eval_expr("2 + 3 * 4").unwrap(), 14);
        assert_eq!(eval_expr("(2 + 3) * 4").unwrap(), 20);
        assert_eq!(eval_expr("-5 + 2").unwrap(), -3);
    }
}
