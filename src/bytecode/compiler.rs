//! Single-pass bytecode compiler.
//!
//! Parsing and code generation are one recursive-descent traversal: each
//! precedence level parses its operands and emits the operator's opcode as
//! soon as the right operand is done. No syntax tree is built.
//!
//! Errors put the compiler into panic mode, which suppresses further reports
//! until the statement loop resynchronizes on a `;` or a statement keyword.

use tracing::debug;

use crate::bytecode::chunk::{Chunk, MAX_CONSTANTS};
use crate::bytecode::instruction::OpCode;
use crate::bytecode::value::Value;
use crate::error::{CompileError, CompileErrors};
use crate::lexer::{Scanner, Token, TokenKind};

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileErrors>;

/// The bytecode compiler.
pub struct Compiler<'t, 'c> {
    tokens: &'t [Token],
    /// Index of the next unconsumed token.
    current: usize,
    /// Index of the most recently consumed token.
    previous: Option<usize>,
    chunk: &'c mut Chunk,
    errors: Vec<CompileError>,
    panic_mode: bool,
}

impl<'t, 'c> Compiler<'t, 'c> {
    /// Compile a token stream into `chunk`.
    ///
    /// The chunk always ends with RETURN, even when errors were recorded.
    pub fn compile(tokens: &[Token], chunk: &mut Chunk) -> CompileResult<()> {
        if tokens.last().map(|t| t.kind) != Some(TokenKind::Eof) {
            let mut owned = tokens.to_vec();
            let eof = match tokens.last() {
                Some(last) => Token::eof(last.span.end, last.line(), last.column()),
                None => Token::eof(0, 1, 1),
            };
            owned.push(eof);
            return Compiler::compile(&owned, chunk);
        }

        let mut compiler = Compiler {
            tokens,
            current: 0,
            previous: None,
            chunk,
            errors: Vec::new(),
            panic_mode: false,
        };
        compiler.skip_error_tokens();

        loop {
            compiler.skip_newlines();
            if compiler.check(TokenKind::Eof) {
                break;
            }
            compiler.declaration();
        }

        compiler.emit_op(OpCode::Return);

        debug!(
            target: "replit::compiler",
            bytes = compiler.chunk.len(),
            constants = compiler.chunk.constants.len(),
            errors = compiler.errors.len(),
            "compiled chunk"
        );

        if compiler.errors.is_empty() {
            Ok(())
        } else {
            Err(CompileErrors(compiler.errors))
        }
    }

    // ===== Declarations & statements =====

    fn declaration(&mut self) {
        let start = self.current;

        if self.match_token(TokenKind::Let) {
            self.let_declaration();
        } else {
            self.statement();
        }

        if self.panic_mode {
            self.synchronize(start);
        }
    }

    fn let_declaration(&mut self) {
        if !self.check(TokenKind::Identifier) {
            self.error_at_current("Expected variable name");
            return;
        }
        let name = self.advance().lexeme.clone();
        let global = self.make_constant(Value::string(name));

        if self.match_token(TokenKind::Equal) {
            self.expression();
        } else {
            self.emit_constant(Value::Nil);
        }

        self.expect(
            TokenKind::Semicolon,
            "Expected ';' after variable declaration",
        );
        self.emit_op_operand(OpCode::DefineGlobal, global);
    }

    fn statement(&mut self) {
        self.skip_newlines();

        if self.match_token(TokenKind::Print) {
            self.print_statement();
        } else if self.match_token(TokenKind::If) {
            self.if_statement();
        } else if self.match_token(TokenKind::While) {
            self.while_statement();
        } else if self.match_token(TokenKind::LeftBrace) {
            self.block();
        } else {
            self.expression_statement();
        }
    }

    fn print_statement(&mut self) {
        self.expression();
        self.expect(TokenKind::Semicolon, "Expected ';' after value");
        self.emit_op(OpCode::Print);
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.expect(TokenKind::Semicolon, "Expected ';' after expression");
        self.emit_op(OpCode::Pop);
    }

    fn block(&mut self) {
        loop {
            self.skip_newlines();
            if self.check(TokenKind::RightBrace) || self.check(TokenKind::Eof) {
                break;
            }
            self.declaration();
        }

        self.expect(TokenKind::RightBrace, "Expected '}' after block");
    }

    fn if_statement(&mut self) {
        self.expect(TokenKind::LeftParen, "Expected '(' after 'if'");
        self.expression();
        self.expect(TokenKind::RightParen, "Expected ')' after condition");

        let then_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.statement();

        let else_jump = self.emit_jump(OpCode::Jump);
        self.patch_jump(then_jump);
        self.emit_op(OpCode::Pop);

        self.skip_newlines();
        if self.match_token(TokenKind::Else) {
            self.statement();
        }
        self.patch_jump(else_jump);
    }

    fn while_statement(&mut self) {
        let loop_start = self.chunk.current_offset();

        self.expect(TokenKind::LeftParen, "Expected '(' after 'while'");
        self.expression();
        self.expect(TokenKind::RightParen, "Expected ')' after condition");

        let exit_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.statement();
        self.emit_loop(loop_start);

        self.patch_jump(exit_jump);
        self.emit_op(OpCode::Pop);
    }

    // ===== Expressions, lowest precedence first =====

    fn expression(&mut self) {
        self.or_expression(true);

        // A valid assignment target would already have consumed the '='.
        if self.check(TokenKind::Equal) {
            self.error_at_current("Invalid assignment target");
        }
    }

    fn or_expression(&mut self, can_assign: bool) {
        self.and_expression(can_assign);

        while self.match_token(TokenKind::Or) {
            let else_jump = self.emit_jump(OpCode::JumpIfFalse);
            let end_jump = self.emit_jump(OpCode::Jump);
            self.patch_jump(else_jump);
            self.emit_op(OpCode::Pop);
            self.and_expression(false);
            self.patch_jump(end_jump);
        }
    }

    fn and_expression(&mut self, can_assign: bool) {
        self.equality(can_assign);

        while self.match_token(TokenKind::And) {
            let end_jump = self.emit_jump(OpCode::JumpIfFalse);
            self.emit_op(OpCode::Pop);
            self.equality(false);
            self.patch_jump(end_jump);
        }
    }

    fn equality(&mut self, can_assign: bool) {
        self.comparison(can_assign);

        loop {
            if self.match_token(TokenKind::EqualEqual) {
                self.comparison(false);
                self.emit_op(OpCode::Equal);
            } else if self.match_token(TokenKind::BangEqual) {
                self.comparison(false);
                self.emit_op(OpCode::Equal);
                self.emit_op(OpCode::Not);
            } else {
                break;
            }
        }
    }

    fn comparison(&mut self, can_assign: bool) {
        self.term(can_assign);

        loop {
            let operator = self.peek().kind;
            if !matches!(
                operator,
                TokenKind::Greater
                    | TokenKind::GreaterEqual
                    | TokenKind::Less
                    | TokenKind::LessEqual
            ) {
                break;
            }
            self.advance();
            self.term(false);

            match operator {
                TokenKind::Greater => self.emit_op(OpCode::Greater),
                TokenKind::GreaterEqual => {
                    self.emit_op(OpCode::Less);
                    self.emit_op(OpCode::Not);
                }
                TokenKind::Less => self.emit_op(OpCode::Less),
                _ => {
                    self.emit_op(OpCode::Greater);
                    self.emit_op(OpCode::Not);
                }
            }
        }
    }

    fn term(&mut self, can_assign: bool) {
        self.factor(can_assign);

        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => OpCode::Add,
                TokenKind::Minus => OpCode::Subtract,
                _ => break,
            };
            self.advance();
            self.factor(false);
            self.emit_op(op);
        }
    }

    fn factor(&mut self, can_assign: bool) {
        self.unary(can_assign);

        loop {
            let op = match self.peek().kind {
                TokenKind::Star => OpCode::Multiply,
                TokenKind::Slash => OpCode::Divide,
                TokenKind::Percent => OpCode::Modulo,
                _ => break,
            };
            self.advance();
            self.unary(false);
            self.emit_op(op);
        }
    }

    fn unary(&mut self, can_assign: bool) {
        let op = match self.peek().kind {
            TokenKind::Bang => OpCode::Not,
            TokenKind::Minus => OpCode::Negate,
            _ => return self.primary(can_assign),
        };
        self.advance();
        self.unary(false);
        self.emit_op(op);
    }

    fn primary(&mut self, can_assign: bool) {
        match self.peek().kind {
            TokenKind::True => {
                self.advance();
                self.emit_constant(Value::Bool(true));
            }
            TokenKind::False => {
                self.advance();
                self.emit_constant(Value::Bool(false));
            }
            TokenKind::Nil => {
                self.advance();
                self.emit_constant(Value::Nil);
            }
            TokenKind::Number => {
                let token = self.advance();
                match token.lexeme.parse::<f64>() {
                    Ok(n) => self.emit_constant(Value::Number(n)),
                    Err(_) => self.error_at_previous("Invalid number"),
                }
            }
            TokenKind::String => {
                let token = self.advance();
                let lexeme = token.lexeme.as_str();
                let text = &lexeme[1..lexeme.len() - 1];
                self.emit_constant(Value::string(text));
            }
            TokenKind::Identifier => {
                let name = self.advance().lexeme.clone();
                self.named_variable(name, can_assign);
            }
            TokenKind::LeftParen => {
                self.advance();
                self.expression();
                self.expect(TokenKind::RightParen, "Expected ')' after expression");
            }
            _ => self.error_at_current("Expected expression"),
        }
    }

    fn named_variable(&mut self, name: String, can_assign: bool) {
        let global = self.make_constant(Value::string(name));

        if can_assign && self.match_token(TokenKind::Equal) {
            self.expression();
            self.emit_op_operand(OpCode::SetGlobal, global);
        } else {
            self.emit_op_operand(OpCode::GetGlobal, global);
        }
    }

    // ===== Error recovery =====

    /// Skip to the next statement boundary, staying silent until it is reached.
    fn synchronize(&mut self, start: usize) {
        // The statement loop must always make progress.
        if self.current == start && !self.check(TokenKind::Eof) {
            self.step();
        }

        while !self.check(TokenKind::Eof) {
            if self.previous().map(|t| t.kind) == Some(TokenKind::Semicolon) {
                break;
            }
            if self.peek().kind.starts_statement() {
                break;
            }
            self.step();
        }

        self.panic_mode = false;
        self.skip_error_tokens();
    }

    fn error_at(&mut self, index: usize, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.errors
            .push(CompileError::at_token(&self.tokens[index], message));
    }

    fn error_at_current(&mut self, message: &str) {
        self.error_at(self.current, message);
    }

    fn error_at_previous(&mut self, message: &str) {
        let index = self.previous.unwrap_or(self.current);
        self.error_at(index, message);
    }

    // ===== Token manipulation =====

    fn advance(&mut self) -> &'t Token {
        let consumed = self.current;
        self.step();
        self.skip_error_tokens();
        let tokens = self.tokens;
        &tokens[consumed]
    }

    /// Consume the current token, error tokens included, without reporting anything.
    fn step(&mut self) {
        self.previous = Some(self.current);
        if self.current + 1 < self.tokens.len() {
            self.current += 1;
        }
    }

    /// Report and step over scanner error tokens so the parser never sees them.
    fn skip_error_tokens(&mut self) {
        while self.tokens[self.current].kind == TokenKind::Error {
            let message = self.tokens[self.current].lexeme.clone();
            self.error_at_current(&message);
            self.current += 1;
        }
    }

    fn skip_newlines(&mut self) {
        while self.match_token(TokenKind::Newline) {}
    }

    fn peek(&self) -> &'t Token {
        let tokens = self.tokens;
        &tokens[self.current]
    }

    fn previous(&self) -> Option<&'t Token> {
        let tokens = self.tokens;
        self.previous.map(|i| &tokens[i])
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, message: &str) {
        if self.check(kind) {
            self.advance();
        } else {
            self.error_at_current(message);
        }
    }

    // ===== Bytecode emission =====

    fn line(&self) -> u32 {
        self.previous().unwrap_or_else(|| self.peek()).line()
    }

    fn emit_op(&mut self, op: OpCode) {
        let line = self.line();
        self.chunk.write_op(op, line);
    }

    fn emit_op_operand(&mut self, op: OpCode, operand: u8) {
        let line = self.line();
        self.chunk.write_op(op, line);
        self.chunk.write_byte(operand, line);
    }

    fn make_constant(&mut self, value: Value) -> u8 {
        let index = self.chunk.add_constant(value);
        if index >= MAX_CONSTANTS {
            self.error_at_previous("Too many constants in one chunk");
            return 0;
        }
        index as u8
    }

    fn emit_constant(&mut self, value: Value) {
        let index = self.make_constant(value);
        self.emit_op_operand(OpCode::Constant, index);
    }

    /// Emit a jump with a placeholder offset and return the operand's position.
    fn emit_jump(&mut self, op: OpCode) -> usize {
        let line = self.line();
        self.chunk.write_op(op, line);
        let offset = self.chunk.current_offset();
        self.chunk.write_u16(0xFFFF, line);
        offset
    }

    fn patch_jump(&mut self, offset: usize) {
        let jump = self.chunk.current_offset() - offset - 2;
        match u16::try_from(jump) {
            Ok(jump) => self.chunk.patch_u16(offset, jump),
            Err(_) => self.error_at_previous("Too much code to jump over"),
        }
    }

    fn emit_loop(&mut self, loop_start: usize) {
        let line = self.line();
        self.chunk.write_op(OpCode::Loop, line);
        let offset = self.chunk.current_offset() - loop_start + 2;
        match u16::try_from(offset) {
            Ok(offset) => self.chunk.write_u16(offset, line),
            Err(_) => {
                self.error_at_previous("Loop body too large");
                self.chunk.write_u16(0, line);
            }
        }
    }
}

/// Lex and compile source text into a fresh chunk.
pub fn compile_source(source: &str) -> CompileResult<Chunk> {
    let tokens = Scanner::new(source).scan_tokens();
    let mut chunk = Chunk::new();
    Compiler::compile(&tokens, &mut chunk)?;
    Ok(chunk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorLocation;
    use pretty_assertions::assert_eq;

    fn ops(ops: &[OpCode]) -> Vec<u8> {
        ops.iter().map(|op| *op as u8).collect()
    }

    fn compile_errors(source: &str) -> Vec<CompileError> {
        match compile_source(source) {
            Ok(_) => Vec::new(),
            Err(errors) => errors.0,
        }
    }

    #[test]
    fn test_compile_print_expression() {
        let chunk = compile_source("print 1 + 2;").unwrap();
        assert_eq!(
            chunk.code,
            vec![
                OpCode::Constant as u8,
                0,
                OpCode::Constant as u8,
                1,
                OpCode::Add as u8,
                OpCode::Print as u8,
                OpCode::Return as u8,
            ]
        );
        assert_eq!(chunk.constants, vec![Value::Number(1.0), Value::Number(2.0)]);
        assert_eq!(chunk.lines.len(), chunk.code.len());
    }

    #[test]
    fn test_precedence_emits_factor_first() {
        // 1 + 2 * 3 evaluates the multiplication before the addition
        let chunk = compile_source("1 + 2 * 3;").unwrap();
        assert_eq!(
            &chunk.code[6..],
            &ops(&[OpCode::Multiply, OpCode::Add, OpCode::Pop, OpCode::Return])[..]
        );
    }

    #[test]
    fn test_left_associative() {
        let chunk = compile_source("print 8 - 4 - 2;").unwrap();
        assert_eq!(
            chunk.code,
            vec![
                OpCode::Constant as u8,
                0,
                OpCode::Constant as u8,
                1,
                OpCode::Subtract as u8,
                OpCode::Constant as u8,
                2,
                OpCode::Subtract as u8,
                OpCode::Print as u8,
                OpCode::Return as u8,
            ]
        );
    }

    #[test]
    fn test_derived_comparisons() {
        let chunk = compile_source("1 != 2;").unwrap();
        assert_eq!(&chunk.code[4..6], &ops(&[OpCode::Equal, OpCode::Not])[..]);

        let chunk = compile_source("1 >= 2;").unwrap();
        assert_eq!(&chunk.code[4..6], &ops(&[OpCode::Less, OpCode::Not])[..]);

        let chunk = compile_source("1 <= 2;").unwrap();
        assert_eq!(&chunk.code[4..6], &ops(&[OpCode::Greater, OpCode::Not])[..]);
    }

    #[test]
    fn test_string_constant_strips_quotes() {
        let chunk = compile_source("print \"hi\";").unwrap();
        assert_eq!(chunk.constants, vec![Value::string("hi")]);
    }

    #[test]
    fn test_let_defines_global() {
        let chunk = compile_source("let x = 1;").unwrap();
        assert_eq!(
            chunk.code,
            vec![
                OpCode::Constant as u8,
                1,
                OpCode::DefineGlobal as u8,
                0,
                OpCode::Return as u8,
            ]
        );
        assert_eq!(chunk.constants[0], Value::string("x"));
    }

    #[test]
    fn test_let_without_initializer_is_nil() {
        let chunk = compile_source("let x;").unwrap();
        assert_eq!(chunk.constants[1], Value::Nil);
    }

    #[test]
    fn test_top_level_newlines_are_skipped() {
        let chunk = compile_source("\n\nprint 1;\n\nprint 2;\n").unwrap();
        assert_eq!(chunk.code.iter().filter(|b| **b == OpCode::Print as u8).count(), 2);
    }

    #[test]
    fn test_always_ends_with_return() {
        let mut chunk = Chunk::new();
        let tokens = Scanner::new("print ;").scan_tokens();
        assert!(Compiler::compile(&tokens, &mut chunk).is_err());
        assert_eq!(chunk.code.last(), Some(&(OpCode::Return as u8)));

        let mut chunk = Chunk::new();
        assert!(Compiler::compile(&[], &mut chunk).is_ok());
        assert_eq!(chunk.code, ops(&[OpCode::Return]));
    }

    #[test]
    fn test_unterminated_string_reported() {
        let errors = compile_errors("print \"abc");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Unterminated string");
        assert_eq!(errors[0].location, ErrorLocation::Lexical);
    }

    #[test]
    fn test_panic_mode_reports_once_per_statement() {
        // Three problems in one statement, one diagnostic.
        let errors = compile_errors("print ) ) );");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Expected expression");
    }

    #[test]
    fn test_recovers_at_statement_boundary() {
        let errors = compile_errors("print 1);\nprint 2;\n) ;\nprint 3;");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].line, 1);
        assert_eq!(errors[0].location, ErrorLocation::AtLexeme(")".to_string()));
        assert_eq!(errors[1].line, 3);
    }

    #[test]
    fn test_resync_on_keyword() {
        let errors = compile_errors("print + print 1; print *;");
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_unhandled_keyword_does_not_hang() {
        let errors = compile_errors("return 1;\nfn;\nfor");
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[2].location, ErrorLocation::AtLexeme("for".to_string()));
    }

    #[test]
    fn test_lexical_error_inside_skipped_statement_stays_quiet() {
        let errors = compile_errors("print ) @ ;\nprint );");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].line, 1);
        assert_eq!(errors[0].message, "Expected expression");
        assert_eq!(errors[1].line, 2);
        assert_eq!(errors[1].location, ErrorLocation::AtLexeme(")".to_string()));
    }

    #[test]
    fn test_lexical_error_after_sync_point_is_reported() {
        let errors = compile_errors("print );\n@ print 1;");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[1].message, "Unexpected character");
        assert_eq!(errors[1].location, ErrorLocation::Lexical);
        assert_eq!(errors[1].line, 2);
    }

    #[test]
    fn test_error_at_end() {
        let errors = compile_errors("print 1");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].location, ErrorLocation::AtEnd);
        assert_eq!(errors[0].message, "Expected ';' after value");
    }

    #[test]
    fn test_invalid_assignment_target() {
        let errors = compile_errors("1 + 2 = 3;");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Invalid assignment target");
    }

    #[test]
    fn test_too_many_constants() {
        let source: String = (0..257).map(|i| format!("{};", i)).collect();
        let errors = compile_errors(&source);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Too many constants in one chunk");

        let source: String = (0..256).map(|i| format!("{};", i)).collect();
        assert!(compile_source(&source).is_ok());
    }

    #[test]
    fn test_if_else_jumps_are_patched() {
        let chunk = compile_source("if (true) print 1; else print 2;").unwrap();
        // CONSTANT 0, JUMP_IF_FALSE lo hi
        assert_eq!(chunk.code[2], OpCode::JumpIfFalse as u8);
        let then_jump = chunk.read_u16(3).unwrap() as usize;
        // Lands on the POP that starts the else branch.
        assert_eq!(chunk.code[5 + then_jump], OpCode::Pop as u8);
    }

    #[test]
    fn test_while_loops_back_to_condition() {
        let chunk = compile_source("while (false) print 1;").unwrap();
        let loop_at = chunk
            .code
            .iter()
            .position(|b| *b == OpCode::Loop as u8)
            .unwrap();
        let back = chunk.read_u16(loop_at + 1).unwrap() as usize;
        assert_eq!(loop_at + 3 - back, 0);
    }
}
