use super::error::FilterParseError;
use super::expression::{ContentPattern, Expression};
use super::token::{Token, TokenKind, tokenize};

/// Operators waiting on the operator stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    /// Open parenthesis, also used as the bottom-of-stack sentinel
    Sentinel,
    Or,
    And,
    Not,
}

impl Operator {
    fn precedence(self) -> u8 {
        match self {
            Operator::Sentinel => 0,
            Operator::Or => 2,
            Operator::And => 4,
            Operator::Not => 6,
        }
    }

    /// Precedence used when this operator is pushed. Binary operators push one
    /// below their own precedence so an equal operator already on the stack
    /// is reduced first (left associativity); `!` pushes at its own level so
    /// stacked negations wait for their operand.
    fn push_precedence(self) -> u8 {
        match self {
            Operator::Sentinel => 0,
            Operator::Or => 1,
            Operator::And => 3,
            Operator::Not => 6,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct StackedOperator {
    operator: Operator,
    offset: usize,
}

/// Operator-precedence parser for the grammar
///
/// ```text
/// E -> P { (&& | ||) P | P }
/// P -> content | ( E ) | ! P
/// ```
///
/// Two adjacent primaries are joined with an implicit `&&`.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    operators: Vec<StackedOperator>,
    operands: Vec<Expression>,
}

/// Tokenize and parse filter text into an expression tree
pub fn parse(text: &str) -> Result<Expression, FilterParseError> {
    Parser::new(tokenize(text)?).parse()
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last(), Some(Token::EndOfInput { .. })) {
            let offset = tokens.last().map(|t| t.offset() + 1).unwrap_or(0);
            tokens.push(Token::EndOfInput { offset });
        }

        Self {
            tokens,
            pos: 0,
            operators: Vec::new(),
            operands: Vec::new(),
        }
    }

    pub fn parse(mut self) -> Result<Expression, FilterParseError> {
        self.operators.push(StackedOperator {
            operator: Operator::Sentinel,
            offset: 0,
        });
        self.expression()?;
        self.expect(TokenKind::EndOfInput)?;

        let offset = self.next().offset();
        match (self.operands.pop(), self.operands.is_empty()) {
            (Some(expr), true) => Ok(expr),
            _ => Err(FilterParseError::Malformed {
                reason: "expected exactly one expression after parsing".to_string(),
                offset,
            }),
        }
    }

    fn next(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    fn consume(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), FilterParseError> {
        let next = self.next();
        if next.kind() == kind {
            self.consume();
            Ok(())
        } else {
            Err(FilterParseError::UnexpectedToken {
                found: next.kind(),
                expected: vec![kind],
                offset: next.offset(),
            })
        }
    }

    fn expression(&mut self) -> Result<(), FilterParseError> {
        self.primary()?;

        loop {
            let next = self.next();
            let (kind, offset, starts_primary) = (next.kind(), next.offset(), next.starts_primary());
            match kind {
                TokenKind::And => {
                    self.push_operator(Operator::And, offset)?;
                    self.consume();
                    self.primary()?;
                }
                TokenKind::Or => {
                    self.push_operator(Operator::Or, offset)?;
                    self.consume();
                    self.primary()?;
                }
                _ if starts_primary => {
                    self.push_operator(Operator::And, offset)?;
                    self.primary()?;
                }
                _ => break,
            }
        }

        while self.top_operator()?.operator != Operator::Sentinel {
            self.pop_operator()?;
        }

        Ok(())
    }

    fn primary(&mut self) -> Result<(), FilterParseError> {
        match self.next().clone() {
            Token::Content { pattern, offset } => {
                let pattern = ContentPattern::compile(&pattern, offset)?;
                self.operands.push(Expression::ContentMatch(pattern));
                self.consume();
            }
            Token::Open { offset } => {
                self.consume();
                self.operators.push(StackedOperator {
                    operator: Operator::Sentinel,
                    offset,
                });
                self.expression()?;
                self.expect(TokenKind::Close)?;

                let inner = self.pop_operand(offset)?;
                self.operands.push(Expression::Parenthesised(Box::new(inner)));
                match self.operators.pop() {
                    Some(StackedOperator {
                        operator: Operator::Sentinel,
                        ..
                    }) => {}
                    _ => {
                        return Err(FilterParseError::Malformed {
                            reason: "unbalanced parenthesis on operator stack".to_string(),
                            offset,
                        });
                    }
                }
            }
            Token::Not { offset } => {
                self.push_operator(Operator::Not, offset)?;
                self.consume();
                self.primary()?;
            }
            other => {
                return Err(FilterParseError::UnexpectedToken {
                    found: other.kind(),
                    expected: vec![TokenKind::Content, TokenKind::Open, TokenKind::Not],
                    offset: other.offset(),
                });
            }
        }

        Ok(())
    }

    fn push_operator(&mut self, operator: Operator, offset: usize) -> Result<(), FilterParseError> {
        while self.top_operator()?.operator.precedence() > operator.push_precedence() {
            self.pop_operator()?;
        }

        self.operators.push(StackedOperator { operator, offset });
        Ok(())
    }

    fn top_operator(&self) -> Result<StackedOperator, FilterParseError> {
        self.operators
            .last()
            .copied()
            .ok_or_else(|| FilterParseError::Malformed {
                reason: "operator stack is empty".to_string(),
                offset: self.next().offset(),
            })
    }

    fn pop_operand(&mut self, offset: usize) -> Result<Expression, FilterParseError> {
        self.operands.pop().ok_or_else(|| FilterParseError::Malformed {
            reason: "missing operand".to_string(),
            offset,
        })
    }

    fn pop_operator(&mut self) -> Result<(), FilterParseError> {
        let top = self.top_operator()?;
        self.operators.pop();

        let node = match top.operator {
            Operator::And | Operator::Or => {
                let rhs = self.pop_operand(top.offset)?;
                let lhs = self.pop_operand(top.offset)?;
                if top.operator == Operator::And {
                    Expression::And(Box::new(lhs), Box::new(rhs))
                } else {
                    Expression::Or(Box::new(lhs), Box::new(rhs))
                }
            }
            Operator::Not => Expression::Not(Box::new(self.pop_operand(top.offset)?)),
            Operator::Sentinel => {
                return Err(FilterParseError::Malformed {
                    reason: "attempted to reduce a parenthesis".to_string(),
                    offset: top.offset,
                });
            }
        };

        self.operands.push(node);
        Ok(())
    }
}
