// Compiler Error Handling

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum CompilerError {
    // Text errors
    UnsupportedCharacter(char, String), // character, text key
    AlphabetExhausted,
    UnencodableSymbol(u8),
    CodeTableOverflow(usize), // forward distance that does not fit a byte
    CodeTreeTooDeep(usize),

    // Script errors
    UnknownOpcode(String, usize), // keyword, line
    UnterminatedScript(String, usize), // script name, line
    EmptyScript(String, usize),
    OpcodeOutsideScript(String, usize),
    MissingOperand(String, usize), // opcode, line
    InvalidOperand(String, usize), // operand text, line
    DuplicateScript(String, usize),

    // Declaration errors
    UnknownDirection(String),
    UnknownCommand(String),
    DuplicateSymbol(String),

    // Graphics errors
    TooManyColourClasses(usize),
    GraphicsError(String),

    // Page allocation errors
    ReservedPageOverflow(usize, usize), // used, capacity
    ElementTooLarge(String, usize, usize), // label, size, capacity
    UnresolvedLabel(String),
    TooManyPages(usize),

    // Configuration and IO errors
    ConfigError(String),
    IOError(String),
}

impl fmt::Display for CompilerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CompilerError::UnsupportedCharacter(ch, key) => {
                write!(f, "Unsupported character '{}' in text '{}'", ch, key)
            }
            CompilerError::AlphabetExhausted => {
                write!(
                    f,
                    "Text alphabet uses every byte value; no room for end and null tokens"
                )
            }
            CompilerError::UnencodableSymbol(symbol) => {
                write!(f, "Symbol {} is not in the code table", symbol)
            }
            CompilerError::CodeTableOverflow(distance) => {
                write!(
                    f,
                    "Code table child distance {} does not fit in one byte",
                    distance
                )
            }
            CompilerError::CodeTreeTooDeep(depth) => {
                write!(f, "Code tree depth {} is too deep for a heap layout", depth)
            }
            CompilerError::UnknownOpcode(keyword, line) => {
                write!(f, "Unknown opcode '{}' at line {}", keyword, line)
            }
            CompilerError::UnterminatedScript(name, line) => {
                write!(
                    f,
                    "Script '{}' does not end with a terminal opcode (line {})",
                    name, line
                )
            }
            CompilerError::EmptyScript(name, line) => {
                write!(f, "Script '{}' has no opcodes (line {})", name, line)
            }
            CompilerError::OpcodeOutsideScript(keyword, line) => {
                write!(
                    f,
                    "Opcode '{}' at line {} appears before any SCRIPT header",
                    keyword, line
                )
            }
            CompilerError::MissingOperand(keyword, line) => {
                write!(f, "Missing operand for '{}' at line {}", keyword, line)
            }
            CompilerError::InvalidOperand(operand, line) => {
                write!(f, "Invalid operand '{}' at line {}", operand, line)
            }
            CompilerError::DuplicateScript(name, line) => {
                write!(f, "Duplicate script '{}' at line {}", name, line)
            }
            CompilerError::UnknownDirection(name) => {
                write!(f, "Unknown direction '{}'", name)
            }
            CompilerError::UnknownCommand(name) => {
                write!(f, "Unknown player command '{}'", name)
            }
            CompilerError::DuplicateSymbol(name) => {
                write!(f, "Duplicate symbol '{}'", name)
            }
            CompilerError::TooManyColourClasses(count) => {
                write!(
                    f,
                    "{} distinct colour classes after merging; at most 255 fit the colour table",
                    count
                )
            }
            CompilerError::GraphicsError(msg) => {
                write!(f, "Graphics error: {}", msg)
            }
            CompilerError::ReservedPageOverflow(used, capacity) => {
                write!(
                    f,
                    "Reserved first-page elements take {} bytes; page capacity is {}",
                    used, capacity
                )
            }
            CompilerError::ElementTooLarge(label, size, capacity) => {
                write!(
                    f,
                    "Element '{}' is {} bytes; page capacity is {}",
                    label, size, capacity
                )
            }
            CompilerError::UnresolvedLabel(label) => {
                write!(f, "Reference to label '{}' which was never placed", label)
            }
            CompilerError::TooManyPages(count) => {
                write!(f, "{} pages do not fit an 8-bit page index", count)
            }
            CompilerError::ConfigError(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
            CompilerError::IOError(msg) => {
                write!(f, "IO error: {}", msg)
            }
        }
    }
}

impl std::error::Error for CompilerError {}

impl From<std::io::Error> for CompilerError {
    fn from(err: std::io::Error) -> Self {
        CompilerError::IOError(err.to_string())
    }
}

impl From<toml::de::Error> for CompilerError {
    fn from(err: toml::de::Error) -> Self {
        CompilerError::ConfigError(err.to_string())
    }
}
