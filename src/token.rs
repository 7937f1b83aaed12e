use std::fmt;
use std::mem;

#[allow(non_camel_case_types)]
#[derive(Debug, Clone)]
pub enum TokenType {
    // Single-character tokens.
    LEFT_PAREN,
    RIGHT_PAREN,
    LEFT_BRACE,
    RIGHT_BRACE,
    COMMA,
    DOT,
    MINUS,
    PLUS,
    SEMICOLON,
    SLASH,
    STAR,

    // One or two character tokens.
    BANG,
    BANG_EQUAL,
    EQUAL,
    EQUAL_EQUAL,
    GREATER,
    GREATER_EQUAL,
    LESS,
    LESS_EQUAL,

    // Literals.
    IDENTIFIER,
    STRING(String),
    NUMBER(f64),

    // Keywords.
    AND,
    BREAK,
    CLASS,
    CONTINUE,
    ELSE,
    FALSE,
    FUN,
    FOR,
    IF,
    NIL,
    OR,
    PRINT,
    RETURN,
    SUPER,
    THIS,
    TRUE,
    VAR,
    WHILE,

    // Special Characters
    EOF,
}

impl PartialEq for TokenType {
    // Literal variants compare equal regardless of payload; the parser probes
    // with placeholder payloads when it only cares about the token kind.
    fn eq(&self, other: &Self) -> bool {
        mem::discriminant(self) == mem::discriminant(other)
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub line: usize,
}

impl Token {
    pub fn new(token_type: TokenType, lexeme: String, line: usize) -> Self {
        Self {
            token_type,
            lexeme,
            line,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tmp: String = format!("{:?}", self.token_type);
        let type_name: &str = tmp.split('(').next().unwrap_or(&tmp);

        match &self.token_type {
            TokenType::STRING(literal) => {
                write!(f, "{} {} {}", type_name, self.lexeme, literal)
            }

            TokenType::NUMBER(literal) => {
                if literal.fract() == 0.0 {
                    write!(f, "{} {} {:.1}", type_name, self.lexeme, literal)
                } else {
                    write!(f, "{} {} {}", type_name, self.lexeme, literal)
                }
            }

            _ => write!(f, "{} {} null", type_name, self.lexeme),
        }
    }
}
