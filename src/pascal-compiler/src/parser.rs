use crate::ast::{
    BinaryOp, Declarations, Expression, ExpressionKind, Program, Sign, Statement, Subprogram,
    SubprogramKind, Variable,
};
use crate::error::{CompileError, CompileResult};
use crate::lexer::{ScanResult, Scanner, Token, TokenKind};
use crate::symbols::{ArrayBounds, DeclaredType, ScalarType, Symbol, SymbolKind, SymbolTable};

/// A successfully parsed and type-checked program together with its global symbols.
#[derive(Debug)]
pub struct Parse {
    pub program: Program,
    pub symbols: SymbolTable,
}

/// Parses the source code, building the syntax tree and symbol table.
/// The first lexical, syntax or type error aborts parsing.
pub fn parse(source: &str) -> CompileResult<Parse> {
    let mut parser = Parser::new(source)?;
    let program = parser.parse_program()?;
    Ok(Parse {
        program,
        symbols: parser.symbols,
    })
}

/// One link of a left-associative operator chain, waiting for its left operand.
struct PendingOperation {
    op: BinaryOp,
    right: Expression,
}

/// Attaches `first` at the bottom of the chain and folds upward.
///
/// The chain arrives innermost-last, as collected by the right-recursive
/// `*_part` rules, so it is walked in reverse.
fn fold_left(first: Expression, chain: Vec<PendingOperation>) -> Expression {
    chain
        .into_iter()
        .rev()
        .fold(first, |left, pending| {
            Expression::operation(pending.op, left, pending.right)
        })
}

fn relational_op(kind: TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::Equal => Some(BinaryOp::Equal),
        TokenKind::NotEqual => Some(BinaryOp::NotEqual),
        TokenKind::Less => Some(BinaryOp::Less),
        TokenKind::LessEqual => Some(BinaryOp::LessEqual),
        TokenKind::Greater => Some(BinaryOp::Greater),
        TokenKind::GreaterEqual => Some(BinaryOp::GreaterEqual),
        _ => None,
    }
}

fn additive_op(kind: TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::Plus => Some(BinaryOp::Add),
        TokenKind::Minus => Some(BinaryOp::Subtract),
        _ => None,
    }
}

fn multiplicative_op(kind: TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::Star => Some(BinaryOp::Multiply),
        TokenKind::Slash => Some(BinaryOp::Divide),
        _ => None,
    }
}

/// Recursive descent parser with one token of lookahead.
struct Parser<'source> {
    scanner: Scanner<'source>,
    /// The lookahead token; `None` once the input is complete.
    current: Option<Token>,
    symbols: SymbolTable,
}

impl<'source> Parser<'source> {
    fn new(source: &'source str) -> CompileResult<Self> {
        let mut parser = Self {
            scanner: Scanner::new(source),
            current: None,
            symbols: SymbolTable::new(),
        };
        parser.advance()?;
        Ok(parser)
    }

    /// Pulls the next token into the lookahead slot and returns the old one.
    fn advance(&mut self) -> CompileResult<Option<Token>> {
        let next = match self.scanner.next_token() {
            ScanResult::TokenAvailable(token) => Some(token),
            ScanResult::TokenNotAvailable(fault) => return Err(fault.into()),
            ScanResult::InputComplete => None,
        };
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn peek(&self) -> Option<TokenKind> {
        self.current.as_ref().map(|token| token.kind)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek() == Some(kind)
    }

    fn line(&self) -> usize {
        match &self.current {
            Some(token) => token.line,
            None => self.scanner.last_line(),
        }
    }

    /// Consumes the lookahead token whatever it is.
    fn bump(&mut self) -> CompileResult<Token> {
        match self.advance()? {
            Some(token) => Ok(token),
            None => Err(self.mismatch("a token")),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> CompileResult<Token> {
        if self.at(kind) {
            self.bump()
        } else {
            Err(self.mismatch(kind.to_string()))
        }
    }

    /// The error for finding the lookahead token where `expected` should be.
    fn mismatch(&self, expected: impl Into<String>) -> CompileError {
        let expected = expected.into();
        match &self.current {
            Some(token) => CompileError::TokenMismatch {
                expected,
                found: token.text.clone(),
                line: token.line,
            },
            None => CompileError::UnexpectedEndOfFile {
                expected,
                line: self.line(),
            },
        }
    }

    /// Runs `f` inside a fresh scope, popping it on every exit path.
    fn in_scope<T>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Self) -> CompileResult<T>,
    ) -> CompileResult<T> {
        self.symbols.push_scope(name);
        let result = f(self);
        self.symbols.pop_scope();
        result
    }

    /// Program -> 'program' ID ';' Declarations SubprogramDeclarations CompoundStatement '.'
    fn parse_program(&mut self) -> CompileResult<Program> {
        if !self.at(TokenKind::Program) {
            return Err(self.malformed_header());
        }
        self.bump()?;
        if !self.at(TokenKind::Identifier) {
            return Err(self.malformed_header());
        }
        let name = self.bump()?.text;
        self.symbols.insert(Symbol::program(&name));
        self.expect(TokenKind::Semicolon)?;

        let declarations = self.parse_declarations()?;
        let subprograms = self.parse_subprogram_declarations()?;
        let main_body = self.parse_compound_statement()?;
        self.expect(TokenKind::Dot)?;

        if let Some(token) = &self.current {
            return Err(CompileError::ExpectedEndOfFile {
                found: token.text.clone(),
                line: token.line,
            });
        }

        Ok(Program {
            name,
            declarations,
            subprograms,
            main_body,
        })
    }

    fn malformed_header(&self) -> CompileError {
        CompileError::MalformedProgramHeader {
            found: self
                .current
                .as_ref()
                .map_or_else(|| "end of file".to_string(), |token| token.text.clone()),
            line: self.line(),
        }
    }

    /// IdentifierList -> ID (',' ID)*
    fn parse_identifier_list(&mut self) -> CompileResult<Vec<String>> {
        let mut names = vec![self.expect(TokenKind::Identifier)?.text];
        while self.at(TokenKind::Comma) {
            self.bump()?;
            names.push(self.expect(TokenKind::Identifier)?.text);
        }
        Ok(names)
    }

    /// Declarations -> ('var' IdentifierList ':' Type ';')*
    fn parse_declarations(&mut self) -> CompileResult<Declarations> {
        let mut declarations = Declarations::default();

        while self.at(TokenKind::Var) {
            self.bump()?;
            let names = self.parse_identifier_list()?;
            self.expect(TokenKind::Colon)?;
            let declared = self.parse_type()?;
            self.expect(TokenKind::Semicolon)?;

            // the type is only known once the whole rule is read
            for name in names {
                self.symbols.insert(Symbol::declared(&name, declared));
                declarations
                    .variables
                    .push(Variable::new(name, Some(declared.scalar())));
            }
        }

        Ok(declarations)
    }

    /// Type -> StandardType | 'array' '[' INT ':' INT ']' 'of' StandardType
    fn parse_type(&mut self) -> CompileResult<DeclaredType> {
        if !self.at(TokenKind::Array) {
            return Ok(DeclaredType::Scalar(self.parse_standard_type()?));
        }

        self.bump()?;
        self.expect(TokenKind::LBracket)?;
        let start = self.parse_array_bound()?;
        self.expect(TokenKind::Colon)?;
        let end = self.parse_array_bound()?;
        self.expect(TokenKind::RBracket)?;
        self.expect(TokenKind::Of)?;
        let element = self.parse_standard_type()?;

        Ok(DeclaredType::Array {
            bounds: ArrayBounds { start, end },
            element,
        })
    }

    fn parse_array_bound(&mut self) -> CompileResult<i64> {
        let token = self.expect(TokenKind::IntegerLiteral)?;
        token
            .text
            .parse()
            .map_err(|_| CompileError::TokenMismatch {
                expected: "array bound".to_string(),
                found: token.text.clone(),
                line: token.line,
            })
    }

    /// StandardType -> 'integer' | 'real'
    fn parse_standard_type(&mut self) -> CompileResult<ScalarType> {
        let ty = match self.peek() {
            Some(TokenKind::Integer) => ScalarType::Integer,
            Some(TokenKind::Real) => ScalarType::Real,
            _ => {
                return Err(match &self.current {
                    Some(token) => CompileError::UnrecognizedType {
                        found: token.text.clone(),
                        line: token.line,
                    },
                    None => self.mismatch("'integer' or 'real'"),
                });
            }
        };
        self.bump()?;
        Ok(ty)
    }

    /// SubprogramDeclarations -> (SubprogramDeclaration ';')*
    fn parse_subprogram_declarations(&mut self) -> CompileResult<Vec<Subprogram>> {
        let mut subprograms = vec![];
        while matches!(
            self.peek(),
            Some(TokenKind::Function | TokenKind::Procedure)
        ) {
            subprograms.push(self.parse_subprogram()?);
            self.expect(TokenKind::Semicolon)?;
        }
        Ok(subprograms)
    }

    /// SubprogramDeclaration -> SubprogramHead Declarations SubprogramDeclarations CompoundStatement
    /// SubprogramHead -> 'function' ID Arguments ':' StandardType ';'
    ///                 | 'procedure' ID Arguments ';'
    fn parse_subprogram(&mut self) -> CompileResult<Subprogram> {
        let kind = match self.bump()?.kind {
            TokenKind::Function => SubprogramKind::Function,
            _ => SubprogramKind::Procedure,
        };
        let name = self.expect(TokenKind::Identifier)?.text;
        let parameters = self.parse_arguments()?;
        let param_types: Vec<ScalarType> = parameters
            .iter()
            .map(|(_, declared)| declared.scalar())
            .collect();

        let (return_type, symbol) = match kind {
            SubprogramKind::Function => {
                self.expect(TokenKind::Colon)?;
                let return_type = self.parse_standard_type()?;
                (
                    Some(return_type),
                    Symbol::function(&name, param_types, return_type),
                )
            }
            SubprogramKind::Procedure => (None, Symbol::procedure(&name, param_types)),
        };
        self.expect(TokenKind::Semicolon)?;

        // recorded in the enclosing scope before the body's scope opens
        self.symbols.insert(symbol);

        self.in_scope(&name, |parser| {
            for (parameter, declared) in &parameters {
                parser.symbols.insert(Symbol::declared(parameter, *declared));
            }
            let declarations = parser.parse_declarations()?;
            let subprograms = parser.parse_subprogram_declarations()?;
            let body = parser.parse_compound_statement()?;

            Ok(Subprogram {
                name: name.clone(),
                kind,
                parameters: parameters
                    .iter()
                    .map(|(parameter, declared)| {
                        Variable::new(parameter.clone(), Some(declared.scalar()))
                    })
                    .collect(),
                return_type,
                declarations,
                subprograms,
                body,
            })
        })
    }

    /// Arguments -> ('(' ParameterList ')')?
    /// ParameterList -> IdentifierList ':' Type (';' ParameterList)?
    fn parse_arguments(&mut self) -> CompileResult<Vec<(String, DeclaredType)>> {
        let mut parameters = vec![];
        if !self.at(TokenKind::LParen) {
            return Ok(parameters);
        }

        self.bump()?;
        loop {
            let names = self.parse_identifier_list()?;
            self.expect(TokenKind::Colon)?;
            let declared = self.parse_type()?;
            parameters.extend(names.into_iter().map(|name| (name, declared)));

            if !self.at(TokenKind::Semicolon) {
                break;
            }
            self.bump()?;
        }
        self.expect(TokenKind::RParen)?;

        Ok(parameters)
    }

    /// CompoundStatement -> 'begin' StatementList? 'end'
    /// StatementList -> Statement (';' Statement)*
    fn parse_compound_statement(&mut self) -> CompileResult<Vec<Statement>> {
        self.expect(TokenKind::Begin)?;
        let mut statements = vec![];

        if !self.at(TokenKind::End) {
            loop {
                if let Some(statement) = self.parse_statement()? {
                    statements.push(statement);
                }
                if !self.at(TokenKind::Semicolon) {
                    break;
                }
                self.bump()?;
                if self.at(TokenKind::End) {
                    let end = self.bump()?;
                    return Err(CompileError::CompoundStatementSemicolon {
                        found: end.text,
                        line: end.line,
                    });
                }
            }
        }

        self.expect(TokenKind::End)?;
        Ok(statements)
    }

    /// Statement -> IfStatement | WhileStatement | CompoundStatement
    ///            | ID ':=' Expression
    ///            | ID '[' Expression ']' (':=' Expression)?
    ///            | ID ('(' ExpressionList ')')?
    ///            | 'read' '(' ID ')' | 'write' '(' Expression ')'
    ///
    /// Array element and call statements are parsed and dropped, yielding `None`.
    fn parse_statement(&mut self) -> CompileResult<Option<Statement>> {
        match self.peek() {
            Some(TokenKind::If) => self.parse_if_statement().map(Some),
            Some(TokenKind::While) => self.parse_while_statement().map(Some),
            Some(TokenKind::Begin) => Ok(Some(Statement::Compound(
                self.parse_compound_statement()?,
            ))),
            Some(TokenKind::Identifier) => self.parse_identifier_statement(),
            _ => Err(self.mismatch("statement")),
        }
    }

    /// A statement in a branch position; dropped statements become empty blocks.
    fn parse_branch(&mut self) -> CompileResult<Statement> {
        Ok(self.parse_statement()?.unwrap_or_else(Statement::empty))
    }

    fn parse_identifier_statement(&mut self) -> CompileResult<Option<Statement>> {
        let token = self.bump()?;
        let symbol = self
            .symbols
            .lookup(&token.text)
            .map(|symbol| (symbol.kind, symbol.ty));

        match symbol {
            Some((SymbolKind::Variable, ty)) => {
                self.expect(TokenKind::Assign)?;
                let value = self.parse_expression()?;
                if ty == Some(ScalarType::Integer) && value.is_real() {
                    return Err(CompileError::AssignRealToInteger {
                        name: token.text,
                        line: token.line,
                    });
                }
                Ok(Some(Statement::Assignment {
                    target: Variable::new(token.text, ty),
                    value,
                }))
            }
            Some((SymbolKind::Array, _)) => {
                self.expect(TokenKind::LBracket)?;
                self.parse_expression()?;
                self.expect(TokenKind::RBracket)?;
                if self.at(TokenKind::Assign) {
                    self.bump()?;
                    self.parse_expression()?;
                }
                Ok(None)
            }
            Some((SymbolKind::Function | SymbolKind::Procedure, _)) => {
                if self.at(TokenKind::LParen) {
                    self.bump()?;
                    self.parse_expression_list()?;
                    self.expect(TokenKind::RParen)?;
                }
                Ok(None)
            }
            Some((SymbolKind::Program, _)) => Err(CompileError::TokenMismatch {
                expected: "statement".to_string(),
                found: token.text,
                line: token.line,
            }),
            None if token.text == "read" => self.parse_read().map(Some),
            None if token.text == "write" => self.parse_write().map(Some),
            None => Err(CompileError::UndeclaredVariable {
                name: token.text,
                line: token.line,
            }),
        }
    }

    /// 'read' '(' ID ')', with 'read' already consumed
    fn parse_read(&mut self) -> CompileResult<Statement> {
        self.expect(TokenKind::LParen)?;
        let token = self.expect(TokenKind::Identifier)?;
        let Some((kind, ty)) = self
            .symbols
            .lookup(&token.text)
            .map(|symbol| (symbol.kind, symbol.ty))
        else {
            return Err(CompileError::UndeclaredVariable {
                name: token.text,
                line: token.line,
            });
        };
        // Only plain variables have a data slot to read into.
        if kind != SymbolKind::Variable {
            return Err(CompileError::TokenMismatch {
                expected: "variable".to_string(),
                found: token.text,
                line: token.line,
            });
        }
        self.expect(TokenKind::RParen)?;

        Ok(Statement::Read {
            target: Variable::new(token.text, ty),
        })
    }

    /// 'write' '(' Expression ')', with 'write' already consumed
    fn parse_write(&mut self) -> CompileResult<Statement> {
        self.expect(TokenKind::LParen)?;
        let value = self.parse_expression()?;
        self.expect(TokenKind::RParen)?;
        Ok(Statement::Write { value })
    }

    /// IfStatement -> 'if' Expression 'then' Statement 'else' Statement
    fn parse_if_statement(&mut self) -> CompileResult<Statement> {
        self.expect(TokenKind::If)?;
        let condition = self.parse_condition()?;
        self.expect(TokenKind::Then)?;
        let then_branch = self.parse_branch()?;
        self.expect(TokenKind::Else)?;
        let else_branch = self.parse_branch()?;

        Ok(Statement::If {
            condition,
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    /// WhileStatement -> 'while' Expression 'do' Statement
    fn parse_while_statement(&mut self) -> CompileResult<Statement> {
        self.expect(TokenKind::While)?;
        let condition = self.parse_condition()?;
        self.expect(TokenKind::Do)?;
        let body = self.parse_branch()?;

        Ok(Statement::While {
            condition,
            body: Box::new(body),
        })
    }

    /// An expression used as a branch condition. No comparison inside it may
    /// mix a real operand with an integer one.
    fn parse_condition(&mut self) -> CompileResult<Expression> {
        let line = self.line();
        let condition = self.parse_expression()?;
        if let Some(comparison) = condition.mismatched_comparison() {
            let operator = match &comparison.kind {
                ExpressionKind::Operation { op, .. } => op.symbol(),
                _ => "?",
            };
            return Err(CompileError::RealIntegerComparison {
                operator: operator.to_string(),
                line,
            });
        }
        Ok(condition)
    }

    /// ExpressionList -> Expression (',' Expression)*
    fn parse_expression_list(&mut self) -> CompileResult<Vec<Expression>> {
        let mut expressions = vec![self.parse_expression()?];
        while self.at(TokenKind::Comma) {
            self.bump()?;
            expressions.push(self.parse_expression()?);
        }
        Ok(expressions)
    }

    /// Expression -> SimpleExpression (relop SimpleExpression)?
    fn parse_expression(&mut self) -> CompileResult<Expression> {
        let left = self.parse_simple_expression()?;
        let Some(op) = self.peek().and_then(relational_op) else {
            return Ok(left);
        };
        self.bump()?;
        let right = self.parse_simple_expression()?;
        Ok(Expression::operation(op, left, right))
    }

    /// SimpleExpression -> sign? Term SimplePart
    fn parse_simple_expression(&mut self) -> CompileResult<Expression> {
        let sign = match self.peek() {
            Some(TokenKind::Plus) => {
                self.bump()?;
                Sign::Plus
            }
            Some(TokenKind::Minus) => {
                self.bump()?;
                Sign::Minus
            }
            _ => Sign::Plus,
        };

        let mut first = self.parse_term()?;
        first.sign = sign.compose(first.sign);
        let chain = self.parse_simple_part()?;
        Ok(fold_left(first, chain))
    }

    /// SimplePart -> addop Term SimplePart | ε
    fn parse_simple_part(&mut self) -> CompileResult<Vec<PendingOperation>> {
        let Some(op) = self.peek().and_then(additive_op) else {
            return Ok(vec![]);
        };
        self.bump()?;
        let right = self.parse_term()?;
        let mut chain = self.parse_simple_part()?;
        chain.push(PendingOperation { op, right });
        Ok(chain)
    }

    /// Term -> Factor TermPart
    fn parse_term(&mut self) -> CompileResult<Expression> {
        let first = self.parse_factor()?;
        let chain = self.parse_term_part()?;
        Ok(fold_left(first, chain))
    }

    /// TermPart -> mulop Factor TermPart | ε
    fn parse_term_part(&mut self) -> CompileResult<Vec<PendingOperation>> {
        let Some(op) = self.peek().and_then(multiplicative_op) else {
            return Ok(vec![]);
        };
        self.bump()?;
        let right = self.parse_factor()?;
        let mut chain = self.parse_term_part()?;
        chain.push(PendingOperation { op, right });
        Ok(chain)
    }

    /// Factor -> ID | ID '[' Expression ']' | ID '(' ExpressionList ')'
    ///         | INT | REAL | '(' Expression ')' | 'not' Factor
    fn parse_factor(&mut self) -> CompileResult<Expression> {
        match self.peek() {
            Some(TokenKind::Identifier) => self.parse_identifier_factor(),
            Some(TokenKind::IntegerLiteral) => {
                let token = self.bump()?;
                Ok(Expression::value(token.text, ScalarType::Integer))
            }
            Some(TokenKind::RealLiteral) => {
                let token = self.bump()?;
                Ok(Expression::value(token.text, ScalarType::Real))
            }
            Some(TokenKind::LParen) => {
                self.bump()?;
                let expression = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(expression)
            }
            Some(TokenKind::Not) => {
                self.bump()?;
                let mut factor = self.parse_factor()?;
                factor.negated = !factor.negated;
                Ok(factor)
            }
            _ => Err(self.mismatch("expression")),
        }
    }

    /// Array elements and calls are not evaluated; they stand in as a zero
    /// of the element or return type.
    fn parse_identifier_factor(&mut self) -> CompileResult<Expression> {
        let token = self.bump()?;
        let Some((kind, ty, value_type)) = self
            .symbols
            .lookup(&token.text)
            .map(|symbol| (symbol.kind, symbol.ty, symbol.value_type()))
        else {
            return Err(CompileError::UndeclaredVariable {
                name: token.text,
                line: token.line,
            });
        };

        if self.at(TokenKind::LBracket) {
            self.bump()?;
            self.parse_expression()?;
            self.expect(TokenKind::RBracket)?;
            return Ok(Expression::zero(value_type));
        }
        if self.at(TokenKind::LParen) {
            self.bump()?;
            self.parse_expression_list()?;
            self.expect(TokenKind::RParen)?;
            return Ok(Expression::zero(value_type));
        }
        if kind.is_callable() {
            return Ok(Expression::zero(value_type));
        }

        Ok(Expression::variable(Variable::new(token.text, ty)))
    }
}
