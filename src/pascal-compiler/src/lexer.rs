use crate::error::CompileError;
use crate::text::LineIndex;
use logos::Logos;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexerError {
    /// A number stopped before a mandatory digit; carries the character that broke it.
    MalformedNumber(char),
    InvalidToken,
}

impl Default for LexerError {
    fn default() -> Self {
        LexerError::InvalidToken
    }
}

/// `12.`, `1E` and `1E+` enter the fraction or exponent path without reaching a digit.
fn malformed_number(lex: &mut logos::Lexer<TokenKind>) -> Result<(), LexerError> {
    let next = lex.remainder().chars().next().unwrap_or(' ');
    Err(LexerError::MalformedNumber(next))
}

#[derive(Logos, Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[logos(error = LexerError)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"\{[^{}]*\}")]
pub enum TokenKind {
    // trivia, resolved by the scanner
    #[regex(r"\{[^{}]*")]
    UnterminatedComment,

    // Keywords
    #[token("program")]
    Program,
    #[token("var")]
    Var,
    #[token("array")]
    Array,
    #[token("of")]
    Of,
    #[token("integer")]
    Integer,
    #[token("real")]
    Real,
    #[token("function")]
    Function,
    #[token("procedure")]
    Procedure,
    #[token("begin")]
    Begin,
    #[token("end")]
    End,
    #[token("if")]
    If,
    #[token("then")]
    Then,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("do")]
    Do,
    #[token("not")]
    Not,

    #[regex("[a-zA-Z][a-zA-Z0-9]*")]
    Identifier,

    #[regex("[0-9]+")]
    IntegerLiteral,

    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?|[0-9]+[eE][+-]?[0-9]+")]
    RealLiteral,

    #[regex(r"[0-9]+\.", malformed_number)]
    #[regex(r"[0-9]+(\.[0-9]+)?[eE][+-]?", malformed_number)]
    MalformedNumber,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("=")]
    Equal,
    #[token("<>")]
    NotEqual,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEqual,
    #[token(">")]
    Greater,
    #[token(">=")]
    GreaterEqual,
    #[token(":=")]
    Assign,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::UnterminatedComment => "comment",
            TokenKind::Program => "'program'",
            TokenKind::Var => "'var'",
            TokenKind::Array => "'array'",
            TokenKind::Of => "'of'",
            TokenKind::Integer => "'integer'",
            TokenKind::Real => "'real'",
            TokenKind::Function => "'function'",
            TokenKind::Procedure => "'procedure'",
            TokenKind::Begin => "'begin'",
            TokenKind::End => "'end'",
            TokenKind::If => "'if'",
            TokenKind::Then => "'then'",
            TokenKind::Else => "'else'",
            TokenKind::While => "'while'",
            TokenKind::Do => "'do'",
            TokenKind::Not => "'not'",
            TokenKind::Identifier => "identifier",
            TokenKind::IntegerLiteral => "integer literal",
            TokenKind::RealLiteral => "real literal",
            TokenKind::MalformedNumber => "number",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Equal => "'='",
            TokenKind::NotEqual => "'<>'",
            TokenKind::Less => "'<'",
            TokenKind::LessEqual => "'<='",
            TokenKind::Greater => "'>'",
            TokenKind::GreaterEqual => "'>='",
            TokenKind::Assign => "':='",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Comma => "','",
            TokenKind::Dot => "'.'",
            TokenKind::Semicolon => "';'",
            TokenKind::Colon => "':'",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexicalFault {
    pub character: char,
    pub line: usize,
}

impl From<LexicalFault> for CompileError {
    fn from(fault: LexicalFault) -> Self {
        CompileError::InvalidCharacter {
            character: fault.character,
            line: fault.line,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanResult {
    TokenAvailable(Token),
    TokenNotAvailable(LexicalFault),
    InputComplete,
}

/// Pull-based tokenizer over one source file.
///
/// The parser asks for one token at a time. Once the input is exhausted
/// every further call answers `InputComplete`.
pub struct Scanner<'source> {
    lexer: logos::Lexer<'source, TokenKind>,
    line_index: LineIndex,
}

impl<'source> Scanner<'source> {
    pub fn new(source: &'source str) -> Self {
        Self {
            lexer: TokenKind::lexer(source),
            line_index: LineIndex::new(source),
        }
    }

    pub fn next_token(&mut self) -> ScanResult {
        loop {
            let Some(result) = self.lexer.next() else {
                return ScanResult::InputComplete;
            };
            let span = self.lexer.span();
            let line = self.line_index.line(span.start);

            match result {
                Ok(TokenKind::UnterminatedComment) => {
                    // Runs to end of input: discard. Otherwise it stopped on a nested '{'.
                    if self.lexer.remainder().is_empty() {
                        continue;
                    }
                    return ScanResult::TokenNotAvailable(LexicalFault {
                        character: '{',
                        line: self.line_index.line(span.end),
                    });
                }
                Ok(kind) => {
                    return ScanResult::TokenAvailable(Token {
                        kind,
                        text: self.lexer.slice().to_string(),
                        line,
                    });
                }
                Err(error) => {
                    let character = match error {
                        LexerError::MalformedNumber(character) => character,
                        LexerError::InvalidToken => self
                            .lexer
                            .slice()
                            .chars()
                            .next()
                            .unwrap_or(char::REPLACEMENT_CHARACTER),
                    };
                    return ScanResult::TokenNotAvailable(LexicalFault { character, line });
                }
            }
        }
    }

    /// Line of the last character in the input.
    pub fn last_line(&self) -> usize {
        self.line_index.line_count()
    }
}

/// Scans the whole source eagerly, stopping at the first fault.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexicalFault> {
    let mut scanner = Scanner::new(source);
    let mut tokens = vec![];

    loop {
        match scanner.next_token() {
            ScanResult::TokenAvailable(token) => tokens.push(token),
            ScanResult::TokenNotAvailable(fault) => return Err(fault),
            ScanResult::InputComplete => return Ok(tokens),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn assign_operator_is_one_token() {
        let tokens = tokenize(":= ").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Assign);
        assert_eq!(tokens[0].text, ":=");
    }

    #[test]
    fn real_literal_keeps_its_text() {
        let tokens = tokenize("3.14").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::RealLiteral);
        assert_eq!(tokens[0].text, "3.14");

        assert_eq!(kinds("1.5E10 2e-3 7E+2"), vec![TokenKind::RealLiteral; 3]);
    }

    #[test]
    fn comments_are_skipped() {
        let tokens = tokenize("{ comment }x").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].text, "x");

        let tokens = tokenize("{ spans\n two lines }\ny").unwrap();
        assert_eq!(tokens[0].line, 3);
    }

    #[test]
    fn two_character_operators_use_maximal_munch() {
        assert_eq!(kinds("<>"), vec![TokenKind::NotEqual]);
        assert_eq!(kinds("<="), vec![TokenKind::LessEqual]);
        assert_eq!(kinds(">="), vec![TokenKind::GreaterEqual]);
        assert_eq!(kinds("< >"), vec![TokenKind::Less, TokenKind::Greater]);
        assert_eq!(kinds(": ="), vec![TokenKind::Colon, TokenKind::Equal]);
    }

    #[test]
    fn pushback_starts_the_next_token() {
        let tokens = tokenize("12)").unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].kind, TokenKind::IntegerLiteral);
        assert_eq!(tokens[0].text, "12");
        assert_eq!(tokens[1].kind, TokenKind::RParen);

        assert_eq!(
            kinds("x:=y+1;"),
            vec![
                TokenKind::Identifier,
                TokenKind::Assign,
                TokenKind::Identifier,
                TokenKind::Plus,
                TokenKind::IntegerLiteral,
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn keywords_are_case_sensitive() {
        assert_eq!(kinds("begin"), vec![TokenKind::Begin]);
        assert_eq!(kinds("Begin"), vec![TokenKind::Identifier]);
        assert_eq!(kinds("beginning"), vec![TokenKind::Identifier]);
        // read and write are ordinary identifiers
        assert_eq!(kinds("read write"), vec![TokenKind::Identifier; 2]);
    }

    #[test]
    fn malformed_numbers_report_the_breaking_character() {
        assert_eq!(
            tokenize("12.x"),
            Err(LexicalFault {
                character: 'x',
                line: 1
            })
        );
        assert_eq!(
            tokenize("1E+;"),
            Err(LexicalFault {
                character: ';',
                line: 1
            })
        );
    }

    #[test]
    fn invalid_characters_fault_with_their_line() {
        let source = "program t;\nbegin\n  x := @\nend.";
        assert_eq!(
            tokenize(source),
            Err(LexicalFault {
                character: '@',
                line: 3
            })
        );
        assert_eq!(tokenize("x_y").unwrap_err().character, '_');
    }

    #[test]
    fn brace_inside_comment_is_a_fault() {
        let fault = tokenize("{ outer { inner } }").unwrap_err();
        assert_eq!(fault.character, '{');
    }

    #[test]
    fn unterminated_comment_is_discarded() {
        assert_eq!(kinds("x { never closed"), vec![TokenKind::Identifier]);
    }

    #[test]
    fn input_complete_is_sticky() {
        let mut scanner = Scanner::new("x");
        assert!(matches!(scanner.next_token(), ScanResult::TokenAvailable(_)));
        assert_eq!(scanner.next_token(), ScanResult::InputComplete);
        assert_eq!(scanner.next_token(), ScanResult::InputComplete);
    }
}
