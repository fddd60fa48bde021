use std::fmt;
use std::sync::Arc;

/// Source position of a token: the source unit it came from plus a 1-based
/// line and column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Position {
    pub unit: Arc<str>,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(unit: Arc<str>, line: usize, column: usize) -> Self {
        Self { unit, line, column }
    }

    pub fn start_of(unit: &str) -> Self {
        Self {
            unit: Arc::from(unit),
            line: 1,
            column: 1,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.unit, self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    Integer(i32),
    Long(i64),
    Real(f64),
    Char(char),
    String(String),

    // Keywords
    Program,
    Unit,
    Uses,
    Interface,
    Implementation,
    Initialization,
    Finalization,
    Const,
    Type,
    Var,
    Function,
    Procedure,
    Forward,
    Begin,
    End,
    If,
    Then,
    Else,
    While,
    Do,
    For,
    To,
    Downto,
    Repeat,
    Until,
    Case,
    Of,
    Array,
    Record,
    Class,
    Nil,
    True,
    False,
    Break,
    Continue,
    Exit,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Not,
    Shl,
    Shr,
    In,

    // Operators
    Plus,         // +
    Minus,        // -
    Star,         // *
    Slash,        // /
    Assign,       // :=
    Equal,        // =
    NotEqual,     // <>
    Less,         // <
    LessEqual,    // <=
    Greater,      // >
    GreaterEqual, // >=
    Caret,        // ^
    At,           // @

    // Delimiters
    LParen,    // (
    RParen,    // )
    LBracket,  // [
    RBracket,  // ]
    Comma,     // ,
    Semicolon, // ;
    Colon,     // :
    Dot,       // .
    DotDot,    // ..

    // Structural
    Include(String),
    EOF,
}

impl TokenKind {
    pub fn keyword(word: &str) -> Option<Self> {
        let kind = match word.to_ascii_lowercase().as_str() {
            "program" => Self::Program,
            "unit" => Self::Unit,
            "uses" => Self::Uses,
            "interface" => Self::Interface,
            "implementation" => Self::Implementation,
            "initialization" => Self::Initialization,
            "finalization" => Self::Finalization,
            "const" => Self::Const,
            "type" => Self::Type,
            "var" => Self::Var,
            "function" => Self::Function,
            "procedure" => Self::Procedure,
            "forward" => Self::Forward,
            "begin" => Self::Begin,
            "end" => Self::End,
            "if" => Self::If,
            "then" => Self::Then,
            "else" => Self::Else,
            "while" => Self::While,
            "do" => Self::Do,
            "for" => Self::For,
            "to" => Self::To,
            "downto" => Self::Downto,
            "repeat" => Self::Repeat,
            "until" => Self::Until,
            "case" => Self::Case,
            "of" => Self::Of,
            "array" => Self::Array,
            "record" => Self::Record,
            "class" => Self::Class,
            "nil" => Self::Nil,
            "true" => Self::True,
            "false" => Self::False,
            "break" => Self::Break,
            "continue" => Self::Continue,
            "exit" => Self::Exit,
            "div" => Self::Div,
            "mod" => Self::Mod,
            "and" => Self::And,
            "or" => Self::Or,
            "xor" => Self::Xor,
            "not" => Self::Not,
            "shl" => Self::Shl,
            "shr" => Self::Shr,
            "in" => Self::In,
            _ => return None,
        };
        Some(kind)
    }

    /// Short human-readable form used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Self::Identifier(name) => format!("identifier '{name}'"),
            Self::Integer(value) => format!("integer {value}"),
            Self::Long(value) => format!("integer {value}"),
            Self::Real(value) => format!("real {value}"),
            Self::Char(value) => format!("character '{value}'"),
            Self::String(value) => format!("string '{value}'"),
            Self::Include(name) => format!("include directive '{name}'"),
            Self::EOF => "end of input".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Self::Program => "program",
            Self::Unit => "unit",
            Self::Uses => "uses",
            Self::Interface => "interface",
            Self::Implementation => "implementation",
            Self::Initialization => "initialization",
            Self::Finalization => "finalization",
            Self::Const => "const",
            Self::Type => "type",
            Self::Var => "var",
            Self::Function => "function",
            Self::Procedure => "procedure",
            Self::Forward => "forward",
            Self::Begin => "begin",
            Self::End => "end",
            Self::If => "if",
            Self::Then => "then",
            Self::Else => "else",
            Self::While => "while",
            Self::Do => "do",
            Self::For => "for",
            Self::To => "to",
            Self::Downto => "downto",
            Self::Repeat => "repeat",
            Self::Until => "until",
            Self::Case => "case",
            Self::Of => "of",
            Self::Array => "array",
            Self::Record => "record",
            Self::Class => "class",
            Self::Nil => "nil",
            Self::True => "true",
            Self::False => "false",
            Self::Break => "break",
            Self::Continue => "continue",
            Self::Exit => "exit",
            Self::Div => "div",
            Self::Mod => "mod",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Not => "not",
            Self::Shl => "shl",
            Self::Shr => "shr",
            Self::In => "in",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Assign => ":=",
            Self::Equal => "=",
            Self::NotEqual => "<>",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::Caret => "^",
            Self::At => "@",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::Comma => ",",
            Self::Semicolon => ";",
            Self::Colon => ":",
            Self::Dot => ".",
            Self::DotDot => "..",
            Self::Identifier(_)
            | Self::Integer(_)
            | Self::Long(_)
            | Self::Real(_)
            | Self::Char(_)
            | Self::String(_)
            | Self::Include(_)
            | Self::EOF => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, position: Position) -> Self {
        Self { kind, position }
    }

    pub fn kind(&self) -> &TokenKind {
        &self.kind
    }

    pub fn position(&self) -> &Position {
        &self.position
    }
}
