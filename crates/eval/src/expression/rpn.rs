//! Shunting-yard conversion to reverse Polish notation.

use rust_decimal::Decimal;

use super::lexer::{Op, Token};
use super::ExpressionError;

#[derive(Debug, Clone, PartialEq)]
pub enum RpnItem {
    Number(Decimal),
    Text(String),
    Variable(String),
    Operator(Op),
    Call { name: String, argc: usize },
}

enum Pending {
    Operator(Op),
    LParen,
    Function(String),
}

/// Argument bookkeeping for one open parenthesis.
struct Frame {
    call: bool,
    commas: usize,
    empty: bool,
}

pub fn to_rpn(tokens: Vec<Token>) -> Result<Vec<RpnItem>, ExpressionError> {
    let mut output: Vec<RpnItem> = Vec::new();
    let mut stack: Vec<Pending> = Vec::new();
    let mut frames: Vec<Frame> = Vec::new();

    for token in tokens {
        if !matches!(token, Token::RParen) {
            if let Some(frame) = frames.last_mut() {
                frame.empty = false;
            }
        }

        match token {
            Token::Number(n) => output.push(RpnItem::Number(n)),
            Token::Text(t) => output.push(RpnItem::Text(t)),
            Token::Variable(v) => output.push(RpnItem::Variable(v)),
            Token::Function(name) => stack.push(Pending::Function(name)),
            Token::LParen => {
                let call = matches!(stack.last(), Some(Pending::Function(_)));
                stack.push(Pending::LParen);
                frames.push(Frame {
                    call,
                    commas: 0,
                    empty: true,
                });
            }
            Token::Comma => {
                drain_to_paren(&mut stack, &mut output);
                match frames.last_mut() {
                    Some(frame) if frame.call => frame.commas += 1,
                    _ => return Err(ExpressionError::MisplacedComma),
                }
            }
            Token::Operator(op) => {
                while let Some(Pending::Operator(top)) = stack.last() {
                    let top = *top;
                    // Unary operators bind to what follows; never pop for them.
                    let pops = !op.is_unary()
                        && (top.precedence() > op.precedence()
                            || (top.precedence() == op.precedence() && !op.right_associative()));
                    if !pops {
                        break;
                    }
                    output.push(RpnItem::Operator(top));
                    stack.pop();
                }
                stack.push(Pending::Operator(op));
            }
            Token::RParen => {
                drain_to_paren(&mut stack, &mut output);
                match stack.pop() {
                    Some(Pending::LParen) => {}
                    _ => return Err(ExpressionError::UnbalancedParentheses),
                }
                let frame = frames.pop().ok_or(ExpressionError::UnbalancedParentheses)?;
                if frame.call {
                    if let Some(Pending::Function(name)) = stack.pop() {
                        let argc = if frame.empty { 0 } else { frame.commas + 1 };
                        output.push(RpnItem::Call { name, argc });
                    }
                }
            }
        }
    }

    while let Some(pending) = stack.pop() {
        match pending {
            Pending::Operator(op) => output.push(RpnItem::Operator(op)),
            Pending::LParen | Pending::Function(_) => {
                return Err(ExpressionError::UnbalancedParentheses)
            }
        }
    }
    Ok(output)
}

fn drain_to_paren(stack: &mut Vec<Pending>, output: &mut Vec<RpnItem>) {
    while let Some(Pending::Operator(op)) = stack.last() {
        output.push(RpnItem::Operator(*op));
        stack.pop();
    }
}
