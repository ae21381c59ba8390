//! Expression tokenizer.

use rust_decimal::Decimal;

use super::ExpressionError;
use crate::numeric::parse_decimal;

/// Binary and unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Concat,
    And,
    Or,
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Neq,
    Neg,
}

impl Op {
    pub fn precedence(self) -> u8 {
        match self {
            Op::And | Op::Or => 0,
            Op::Gt | Op::Gte | Op::Lt | Op::Lte | Op::Eq | Op::Neq => 1,
            Op::Add | Op::Sub | Op::Concat => 2,
            Op::Mul | Op::Div => 3,
            Op::Pow | Op::Neg => 4,
        }
    }

    pub fn right_associative(self) -> bool {
        matches!(self, Op::Pow | Op::Neg)
    }

    pub fn is_unary(self) -> bool {
        matches!(self, Op::Neg)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(Decimal),
    Text(String),
    Variable(String),
    Function(String),
    Operator(Op),
    LParen,
    RParen,
    Comma,
}

impl Token {
    /// Whether a `-` following this token is binary.
    fn ends_operand(&self) -> bool {
        matches!(
            self,
            Token::Number(_) | Token::Text(_) | Token::Variable(_) | Token::RParen
        )
    }
}

fn allowed(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || c.is_whitespace()
        || matches!(
            c,
            '_' | '+' | '*' | '-' | '/' | '^' | '(' | ')' | ',' | '.' | '{' | '}' | ':' | '<'
                | '>' | '!' | '=' | '&' | '"' | '\\' | '@'
        )
}

/// Check length and character set before tokenizing.
pub fn validate(expr: &str, max_length: usize) -> Result<(), ExpressionError> {
    let length = expr.chars().count();
    if length > max_length {
        return Err(ExpressionError::TooLong {
            length,
            max: max_length,
        });
    }
    if let Some(ch) = expr.chars().find(|c| !allowed(*c)) {
        return Err(ExpressionError::InvalidCharacter { ch });
    }
    Ok(())
}

fn is_marker_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-' | '@')
}

pub fn tokenize(expr: &str) -> Result<Vec<Token>, ExpressionError> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens: Vec<Token> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        // Numbers
        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit()))
        {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let value = parse_decimal(&text).ok_or(ExpressionError::UnexpectedCharacter {
                ch: c,
                position: start,
            })?;
            tokens.push(Token::Number(value));
            continue;
        }

        // Quoted strings
        if c == '"' {
            let mut text = String::new();
            i += 1;
            let mut closed = false;
            while i < chars.len() {
                match chars[i] {
                    '\\' if i + 1 < chars.len() => {
                        text.push(chars[i + 1]);
                        i += 2;
                    }
                    '"' => {
                        closed = true;
                        i += 1;
                        break;
                    }
                    other => {
                        text.push(other);
                        i += 1;
                    }
                }
            }
            if !closed {
                return Err(ExpressionError::UnterminatedString);
            }
            tokens.push(Token::Text(text));
            continue;
        }

        // {{placeholder}}
        if c == '{' && chars.get(i + 1) == Some(&'{') {
            let start = i + 2;
            let mut j = start;
            while j + 1 < chars.len() && !(chars[j] == '}' && chars[j + 1] == '}') {
                j += 1;
            }
            if j + 1 >= chars.len() {
                return Err(ExpressionError::UnterminatedPlaceholder);
            }
            let name: String = chars[start..j].iter().collect();
            tokens.push(Token::Variable(name.trim().to_string()));
            i = j + 2;
            continue;
        }

        // @value.<id> / @table.<id> markers
        if c == '@' {
            let start = i;
            while i < chars.len() && is_marker_char(chars[i]) {
                i += 1;
            }
            tokens.push(Token::Variable(chars[start..i].iter().collect()));
            continue;
        }

        // Identifiers: functions, booleans, logical operators
        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect::<String>().to_lowercase();
            let next = chars[i..].iter().find(|c| !c.is_whitespace());
            match word.as_str() {
                "true" => tokens.push(Token::Number(Decimal::ONE)),
                "false" => tokens.push(Token::Number(Decimal::ZERO)),
                "and" if tokens.last().is_some_and(Token::ends_operand) => {
                    tokens.push(Token::Operator(Op::And))
                }
                "or" if tokens.last().is_some_and(Token::ends_operand) => {
                    tokens.push(Token::Operator(Op::Or))
                }
                _ if next == Some(&'(') => tokens.push(Token::Function(word)),
                _ => return Err(ExpressionError::UnexpectedIdentifier { name: word }),
            }
            continue;
        }

        let next = chars.get(i + 1).copied();
        let (token, width) = match (c, next) {
            ('>', Some('=')) => (Token::Operator(Op::Gte), 2),
            ('<', Some('=')) => (Token::Operator(Op::Lte), 2),
            ('=', Some('=')) => (Token::Operator(Op::Eq), 2),
            ('!', Some('=')) => (Token::Operator(Op::Neq), 2),
            ('>', _) => (Token::Operator(Op::Gt), 1),
            ('<', _) => (Token::Operator(Op::Lt), 1),
            ('=', _) => (Token::Operator(Op::Eq), 1),
            ('+', _) => (Token::Operator(Op::Add), 1),
            ('-', _) => {
                if tokens.last().is_some_and(Token::ends_operand) {
                    (Token::Operator(Op::Sub), 1)
                } else {
                    (Token::Operator(Op::Neg), 1)
                }
            }
            ('*', _) => (Token::Operator(Op::Mul), 1),
            ('/', _) => (Token::Operator(Op::Div), 1),
            ('^', _) => (Token::Operator(Op::Pow), 1),
            ('&', _) => (Token::Operator(Op::Concat), 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            (',', _) => (Token::Comma, 1),
            _ => return Err(ExpressionError::UnexpectedCharacter { ch: c, position: i }),
        };
        tokens.push(token);
        i += width;
    }

    Ok(tokens)
}
