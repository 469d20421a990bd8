use tracing::debug;

use crate::diagnostics::{Diagnostic, ErrorKind, Phase};
use crate::lexer::{Lexer, Position, Token, TokenKind};

use super::{
    BinOp, Block, Call, CaseArm, ConstDecl, Decl, Designator, Expr, ExprKind, FieldDecl, Ident,
    ParamDecl, Program, RoutineDecl, Selector, Stmt, StmtKind, TypeDecl, TypeSpec, UnOp, VarDecl,
};

type ParseResult<T> = Result<T, Diagnostic>;

/// A program tree, possibly partial, and everything reported while building
/// it. Lexical diagnostics appear in the order their tokens were reached.
#[derive(Debug)]
pub struct ParseOutcome {
    pub program: Program,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseOutcome {
    pub fn has_errors(&self) -> bool {
        crate::diagnostics::has_errors(&self.diagnostics)
    }
}

/// LL(1) recursive-descent parser with one token of lookahead.
///
/// Grammar violations are reported and followed by panic-mode recovery:
/// tokens are skipped up to the next `;`, `end`, `begin` or declaration
/// keyword, and parsing resumes from there.
#[derive(Debug)]
pub struct Parser {
    lexer: Lexer,
    current: Token,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        let mut parser = Self {
            lexer: Lexer::new(source),
            current: Token::new(TokenKind::Eof, Position::new(1, 1)),
            diagnostics: vec![],
        };
        parser.current = parser.next_significant();
        parser
    }

    pub fn parse(mut self) -> ParseOutcome {
        let program = self.parse_program();
        debug!(
            name = %program.name.name,
            diagnostics = self.diagnostics.len(),
            "parsed program"
        );
        ParseOutcome {
            program,
            diagnostics: self.diagnostics,
        }
    }

    /// Next token from the lexer, recording error tokens on the way.
    fn next_significant(&mut self) -> Token {
        loop {
            match self.lexer.next() {
                Some(Token {
                    kind: TokenKind::Error(kind),
                    pos,
                }) => self.diagnostics.push(Diagnostic::error(kind, pos)),
                Some(token) => return token,
                None => return Token::new(TokenKind::Eof, self.current.pos),
            }
        }
    }

    fn advance(&mut self) -> Token {
        if self.current.kind == TokenKind::Eof {
            return self.current.clone();
        }
        let next = self.next_significant();
        std::mem::replace(&mut self.current, next)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.current.kind.same_kind(kind)
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_expected(&[&kind.to_string()]))
        }
    }

    fn expect_ident(&mut self) -> ParseResult<Ident> {
        if let TokenKind::Ident(name) = &self.current.kind {
            let ident = Ident {
                name: name.clone(),
                pos: self.current.pos,
            };
            self.advance();
            Ok(ident)
        } else {
            Err(self.error_expected(&["identifier"]))
        }
    }

    fn error_expected(&self, expected: &[&str]) -> Diagnostic {
        let expected = expected.iter().map(|s| s.to_string()).collect();
        let kind = match &self.current.kind {
            TokenKind::Eof => ErrorKind::UnexpectedEof { expected },
            found => ErrorKind::UnexpectedToken {
                found: found.to_string(),
                expected,
            },
        };
        Diagnostic::error(kind, self.current.pos)
    }

    /// Records a syntax error unless one was already reported at the same
    /// position.
    fn report(&mut self, diagnostic: Diagnostic) {
        let repeated = self
            .diagnostics
            .last()
            .is_some_and(|last| last.pos == diagnostic.pos && last.phase() == Phase::Syntactic);
        if !repeated {
            debug!(%diagnostic, "syntax error");
            self.diagnostics.push(diagnostic);
        }
    }

    /// Skips tokens up to the next synchronization point.
    fn synchronize(&mut self) {
        while !self.current.kind.is_sync_point() {
            self.advance();
        }
    }

    /// Reports, resynchronizes and drops the `;` closing the broken part.
    fn recover(&mut self, diagnostic: Diagnostic) {
        self.report(diagnostic);
        self.synchronize();
        self.consume(&TokenKind::Semicolon);
    }

    /// program = "program" ident [ "(" ident { "," ident } ")" ] ";" block "." EOF
    fn parse_program(&mut self) -> Program {
        let pos = self.current.pos;
        let name = match self.parse_program_header() {
            Ok(name) => name,
            Err(d) => {
                self.recover(d);
                Ident {
                    name: String::new(),
                    pos,
                }
            }
        };

        let block = self.parse_block();

        if let Err(d) = self
            .expect(&TokenKind::Dot)
            .and_then(|_| self.expect(&TokenKind::Eof))
        {
            self.report(d);
        }

        Program { name, block }
    }

    fn parse_program_header(&mut self) -> ParseResult<Ident> {
        self.expect(&TokenKind::Program)?;
        let name = self.expect_ident()?;
        if self.consume(&TokenKind::OpenParen) {
            self.parse_ident_list()?;
            self.expect(&TokenKind::CloseParen)?;
        }
        self.expect(&TokenKind::Semicolon)?;
        Ok(name)
    }

    /// block = { const_sec | type_sec | var_sec | routine } compound
    fn parse_block(&mut self) -> Block {
        let mut decls = vec![];
        loop {
            match self.current.kind {
                TokenKind::Const => self.parse_const_section(&mut decls),
                TokenKind::Type => self.parse_type_section(&mut decls),
                TokenKind::Var => self.parse_var_section(&mut decls),
                TokenKind::Procedure | TokenKind::Function => {
                    let routine = self.parse_routine();
                    decls.push(Decl::Routine(routine));
                }
                _ => break,
            }
        }

        let body = match self.parse_compound() {
            Ok(body) => body,
            Err(d) => {
                self.report(d);
                self.synchronize();
                if self.check(&TokenKind::Begin) {
                    self.parse_compound().unwrap_or_else(|d| {
                        self.report(d);
                        vec![]
                    })
                } else {
                    vec![]
                }
            }
        };

        Block { decls, body }
    }

    /// const_sec = "const" ( ident "=" expr ";" )+
    fn parse_const_section(&mut self, decls: &mut Vec<Decl>) {
        self.advance();
        loop {
            match self.parse_const_decl() {
                Ok(decl) => decls.push(Decl::Const(decl)),
                Err(d) => self.recover(d),
            }
            if !matches!(self.current.kind, TokenKind::Ident(_)) {
                break;
            }
        }
    }

    fn parse_const_decl(&mut self) -> ParseResult<ConstDecl> {
        let name = self.expect_ident()?;
        self.expect(&TokenKind::Equal)?;
        let value = self.parse_expr()?;
        self.expect(&TokenKind::Semicolon)?;
        Ok(ConstDecl { name, value })
    }

    /// type_sec = "type" ( ident "=" type ";" )+
    fn parse_type_section(&mut self, decls: &mut Vec<Decl>) {
        self.advance();
        loop {
            match self.parse_type_decl() {
                Ok(decl) => decls.push(Decl::Type(decl)),
                Err(d) => self.recover(d),
            }
            if !matches!(self.current.kind, TokenKind::Ident(_)) {
                break;
            }
        }
    }

    fn parse_type_decl(&mut self) -> ParseResult<TypeDecl> {
        let name = self.expect_ident()?;
        self.expect(&TokenKind::Equal)?;
        let spec = self.parse_type()?;
        self.expect(&TokenKind::Semicolon)?;
        Ok(TypeDecl { name, spec })
    }

    /// var_sec = "var" ( idlist ":" type ";" )+
    fn parse_var_section(&mut self, decls: &mut Vec<Decl>) {
        self.advance();
        loop {
            match self.parse_var_decl() {
                Ok(decl) => decls.push(Decl::Var(decl)),
                Err(d) => self.recover(d),
            }
            if !matches!(self.current.kind, TokenKind::Ident(_)) {
                break;
            }
        }
    }

    fn parse_var_decl(&mut self) -> ParseResult<VarDecl> {
        let names = self.parse_ident_list()?;
        self.expect(&TokenKind::Colon)?;
        let spec = self.parse_type()?;
        self.expect(&TokenKind::Semicolon)?;
        Ok(VarDecl { names, spec })
    }

    fn parse_ident_list(&mut self) -> ParseResult<Vec<Ident>> {
        let mut names = vec![self.expect_ident()?];
        while self.consume(&TokenKind::Comma) {
            names.push(self.expect_ident()?);
        }
        Ok(names)
    }

    /// type = ident
    ///      | "array" "[" expr ".." expr { "," expr ".." expr } "]" "of" type
    ///      | "record" field { ";" field } [ ";" ] "end"
    fn parse_type(&mut self) -> ParseResult<TypeSpec> {
        let pos = self.current.pos;
        match self.current.kind {
            TokenKind::Ident(_) => Ok(TypeSpec::Named(self.expect_ident()?)),
            TokenKind::Array => {
                self.advance();
                self.expect(&TokenKind::OpenSquareBrace)?;
                let mut ranges = vec![];
                loop {
                    let low = self.parse_expr()?;
                    self.expect(&TokenKind::DotDot)?;
                    let high = self.parse_expr()?;
                    ranges.push((low, high));
                    if !self.consume(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::CloseSquareBrace)?;
                self.expect(&TokenKind::Of)?;
                let elem = Box::new(self.parse_type()?);
                Ok(TypeSpec::Array { ranges, elem, pos })
            }
            TokenKind::Record => {
                self.advance();
                let mut fields = vec![];
                while !self.check(&TokenKind::End) {
                    let names = self.parse_ident_list()?;
                    self.expect(&TokenKind::Colon)?;
                    let spec = self.parse_type()?;
                    fields.push(FieldDecl { names, spec });
                    if !self.consume(&TokenKind::Semicolon) {
                        break;
                    }
                }
                self.expect(&TokenKind::End)?;
                Ok(TypeSpec::Record { fields, pos })
            }
            _ => Err(self.error_expected(&["type"])),
        }
    }

    /// routine = "procedure" ident [ params ] ";" block ";"
    ///         | "function" ident [ params ] ":" type ";" block ";"
    fn parse_routine(&mut self) -> RoutineDecl {
        let pos = self.current.pos;
        let (name, params, ret) = match self.parse_routine_header() {
            Ok(header) => header,
            Err(d) => {
                self.recover(d);
                let name = Ident {
                    name: String::new(),
                    pos,
                };
                (name, vec![], None)
            }
        };

        let block = self.parse_block();
        if let Err(d) = self.expect(&TokenKind::Semicolon) {
            self.report(d);
        }

        RoutineDecl {
            name,
            params,
            ret,
            block,
            id: None,
        }
    }

    fn parse_routine_header(
        &mut self,
    ) -> ParseResult<(Ident, Vec<ParamDecl>, Option<TypeSpec>)> {
        let is_function = self.advance().kind == TokenKind::Function;
        let name = self.expect_ident()?;

        let mut params = vec![];
        if self.consume(&TokenKind::OpenParen) {
            loop {
                let by_ref = self.consume(&TokenKind::Var);
                let names = self.parse_ident_list()?;
                self.expect(&TokenKind::Colon)?;
                let spec = self.parse_type()?;
                params.push(ParamDecl {
                    names,
                    spec,
                    by_ref,
                });
                if !self.consume(&TokenKind::Semicolon) {
                    break;
                }
            }
            self.expect(&TokenKind::CloseParen)?;
        }

        let ret = if is_function {
            self.expect(&TokenKind::Colon)?;
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect(&TokenKind::Semicolon)?;

        Ok((name, params, ret))
    }

    /// compound = "begin" stmt { ";" stmt } "end"
    fn parse_compound(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect(&TokenKind::Begin)?;
        let stmts = self.parse_stmt_sequence(&TokenKind::End);
        self.expect(&TokenKind::End)?;
        Ok(stmts)
    }

    /// Statements separated by `;`, up to `terminator` (not consumed).
    fn parse_stmt_sequence(&mut self, terminator: &TokenKind) -> Vec<Stmt> {
        let mut stmts = vec![];
        loop {
            match self.parse_stmt() {
                Ok(stmt) => stmts.push(stmt),
                Err(d) => {
                    self.report(d);
                    self.synchronize();
                }
            }

            if self.consume(&TokenKind::Semicolon) {
                continue;
            }
            if self.check(terminator) {
                break;
            }

            let d = self.error_expected(&["';'", &terminator.to_string()]);
            self.report(d);
            self.synchronize();
            if self.consume(&TokenKind::Semicolon) || self.check(&TokenKind::Begin) {
                continue;
            }
            break;
        }
        stmts
    }

    /// stmt = [ compound | ident_stmt | if | while | repeat | for | case | exit ]
    fn parse_stmt(&mut self) -> ParseResult<Stmt> {
        let pos = self.current.pos;
        let kind = match self.current.kind {
            TokenKind::Begin => StmtKind::Compound(self.parse_compound()?),
            TokenKind::Ident(_) => self.parse_ident_stmt()?,
            TokenKind::If => self.parse_if()?,
            TokenKind::While => self.parse_while()?,
            TokenKind::Repeat => self.parse_repeat()?,
            TokenKind::For => self.parse_for()?,
            TokenKind::Case => self.parse_case()?,
            TokenKind::Exit => self.parse_exit()?,
            TokenKind::Semicolon | TokenKind::End | TokenKind::Until | TokenKind::Else => {
                StmtKind::Empty
            }
            _ => return Err(self.error_expected(&["statement"])),
        };
        Ok(Stmt::new(kind, pos))
    }

    /// ident_stmt = designator ":=" expr | ident [ "(" [ expr { "," expr } ] ")" ]
    fn parse_ident_stmt(&mut self) -> ParseResult<StmtKind> {
        let ident = self.expect_ident()?;
        match self.current.kind {
            TokenKind::OpenParen => {
                let args = self.parse_args()?;
                Ok(StmtKind::Call(Call::new(ident.name, args, ident.pos)))
            }
            TokenKind::Semicolon | TokenKind::End | TokenKind::Else | TokenKind::Until => {
                Ok(StmtKind::Call(Call::new(ident.name, vec![], ident.pos)))
            }
            _ => {
                let target = self.parse_selectors(Designator::new(ident.name, ident.pos))?;
                self.expect(&TokenKind::Assign)?;
                let value = self.parse_expr()?;
                Ok(StmtKind::Assign { target, value })
            }
        }
    }

    /// if = "if" expr "then" stmt [ "else" stmt ]
    fn parse_if(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        let cond = self.parse_expr()?;
        self.expect(&TokenKind::Then)?;
        let then_stmt = Box::new(self.parse_stmt()?);
        let else_stmt = if self.consume(&TokenKind::Else) {
            Some(Box::new(self.parse_stmt()?))
        } else {
            None
        };
        Ok(StmtKind::If {
            cond,
            then_stmt,
            else_stmt,
        })
    }

    /// while = "while" expr "do" stmt
    fn parse_while(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        let cond = self.parse_expr()?;
        self.expect(&TokenKind::Do)?;
        let body = Box::new(self.parse_stmt()?);
        Ok(StmtKind::While { cond, body })
    }

    /// repeat = "repeat" stmt { ";" stmt } "until" expr
    fn parse_repeat(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        let body = self.parse_stmt_sequence(&TokenKind::Until);
        self.expect(&TokenKind::Until)?;
        let cond = self.parse_expr()?;
        Ok(StmtKind::Repeat { body, cond })
    }

    /// for = "for" ident ":=" expr ( "to" | "downto" ) expr "do" stmt
    fn parse_for(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        let ident = self.expect_ident()?;
        self.expect(&TokenKind::Assign)?;
        let start = self.parse_expr()?;
        let downto = if self.consume(&TokenKind::To) {
            false
        } else if self.consume(&TokenKind::Downto) {
            true
        } else {
            return Err(self.error_expected(&["'to'", "'downto'"]));
        };
        let end = self.parse_expr()?;
        self.expect(&TokenKind::Do)?;
        let body = Box::new(self.parse_stmt()?);
        Ok(StmtKind::For {
            var: Designator::new(ident.name, ident.pos),
            start,
            end,
            downto,
            body,
            limit: None,
        })
    }

    /// case = "case" expr "of" arm { ";" arm } [ ";" ] [ "else" stmt { ";" stmt } ] "end"
    /// arm  = expr { "," expr } ":" stmt
    fn parse_case(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        let selector = self.parse_expr()?;
        self.expect(&TokenKind::Of)?;

        let mut arms = vec![];
        let mut default = None;
        loop {
            if self.check(&TokenKind::End) {
                break;
            }
            if self.consume(&TokenKind::Else) {
                default = Some(self.parse_stmt_sequence(&TokenKind::End));
                break;
            }
            match self.parse_case_arm() {
                Ok(arm) => arms.push(arm),
                Err(d) => {
                    self.report(d);
                    self.synchronize();
                }
            }
            if self.consume(&TokenKind::Semicolon) || self.check(&TokenKind::Else) {
                continue;
            }
            break;
        }
        self.expect(&TokenKind::End)?;

        Ok(StmtKind::Case {
            selector,
            arms,
            default,
            temp: None,
        })
    }

    fn parse_case_arm(&mut self) -> ParseResult<CaseArm> {
        let mut labels = vec![self.parse_expr()?];
        while self.consume(&TokenKind::Comma) {
            labels.push(self.parse_expr()?);
        }
        self.expect(&TokenKind::Colon)?;
        let body = self.parse_stmt()?;
        Ok(CaseArm { labels, body })
    }

    /// exit = "exit" [ "(" expr ")" ]
    fn parse_exit(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        if self.consume(&TokenKind::OpenParen) {
            let value = self.parse_expr()?;
            self.expect(&TokenKind::CloseParen)?;
            Ok(StmtKind::Exit(Some(value)))
        } else {
            Ok(StmtKind::Exit(None))
        }
    }

    /// args = "(" [ expr { "," expr } ] ")"
    fn parse_args(&mut self) -> ParseResult<Vec<Expr>> {
        self.expect(&TokenKind::OpenParen)?;
        let mut args = vec![];
        if !self.consume(&TokenKind::CloseParen) {
            args.push(self.parse_expr()?);
            while self.consume(&TokenKind::Comma) {
                args.push(self.parse_expr()?);
            }
            self.expect(&TokenKind::CloseParen)?;
        }
        Ok(args)
    }

    /// designator = ident { "[" expr { "," expr } "]" | "." ident }
    fn parse_selectors(&mut self, mut designator: Designator) -> ParseResult<Designator> {
        loop {
            if self.consume(&TokenKind::OpenSquareBrace) {
                loop {
                    let index = self.parse_expr()?;
                    designator.selectors.push(Selector::Index(Box::new(index)));
                    if !self.consume(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::CloseSquareBrace)?;
            } else if self.consume(&TokenKind::Dot) {
                let field = self.expect_ident()?;
                designator.selectors.push(Selector::Field {
                    name: field.name,
                    pos: field.pos,
                });
            } else {
                return Ok(designator);
            }
        }
    }

    /// expr = simple [ ( "=" | "<>" | "<" | "<=" | ">" | ">=" ) simple ]
    pub fn parse_expr(&mut self) -> ParseResult<Expr> {
        let lhs = self.parse_simple()?;
        let op = match self.current.kind {
            TokenKind::Equal => BinOp::Equal,
            TokenKind::NotEqual => BinOp::NotEqual,
            TokenKind::LessThan => BinOp::LessThan,
            TokenKind::LessEqual => BinOp::LessEqual,
            TokenKind::GreaterThan => BinOp::GreaterThan,
            TokenKind::GreaterEqual => BinOp::GreaterEqual,
            _ => return Ok(lhs),
        };
        let pos = self.advance().pos;
        let rhs = self.parse_simple()?;
        Ok(Expr::new(
            ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)),
            pos,
        ))
    }

    /// simple = term { ( "+" | "-" | "or" ) term }
    fn parse_simple(&mut self) -> ParseResult<Expr> {
        let mut node = self.parse_term()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                TokenKind::Or => BinOp::Or,
                _ => return Ok(node),
            };
            let pos = self.advance().pos;
            let rhs = self.parse_term()?;
            node = Expr::new(ExprKind::Binary(op, Box::new(node), Box::new(rhs)), pos);
        }
    }

    /// term = factor { ( "*" | "/" | "div" | "mod" | "and" ) factor }
    fn parse_term(&mut self) -> ParseResult<Expr> {
        let mut node = self.parse_factor()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Div => BinOp::IntDiv,
                TokenKind::Mod => BinOp::Mod,
                TokenKind::And => BinOp::And,
                _ => return Ok(node),
            };
            let pos = self.advance().pos;
            let rhs = self.parse_factor()?;
            node = Expr::new(ExprKind::Binary(op, Box::new(node), Box::new(rhs)), pos);
        }
    }

    /// factor = ( "-" | "+" | "not" ) factor
    ///        | literal
    ///        | "(" expr ")"
    ///        | designator
    ///        | ident "(" args ")"
    fn parse_factor(&mut self) -> ParseResult<Expr> {
        let pos = self.current.pos;
        let unary = match self.current.kind {
            TokenKind::Minus => Some(UnOp::Neg),
            TokenKind::Plus => Some(UnOp::Plus),
            TokenKind::Not => Some(UnOp::Not),
            _ => None,
        };
        if let Some(op) = unary {
            self.advance();
            let operand = self.parse_factor()?;
            return Ok(Expr::new(ExprKind::Unary(op, Box::new(operand)), pos));
        }

        let kind = match self.current.kind.clone() {
            TokenKind::IntLit(n) => ExprKind::Int(n),
            TokenKind::RealLit(x) => ExprKind::Real(x),
            TokenKind::StrLit(s) => ExprKind::Str(s),
            TokenKind::OpenParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::CloseParen)?;
                return Ok(expr);
            }
            TokenKind::Ident(_) => {
                let ident = self.expect_ident()?;
                let kind = if self.check(&TokenKind::OpenParen) {
                    let args = self.parse_args()?;
                    ExprKind::Call(Call::new(ident.name, args, ident.pos))
                } else {
                    let designator = Designator::new(ident.name, ident.pos);
                    ExprKind::Designator(self.parse_selectors(designator)?)
                };
                return Ok(Expr::new(kind, pos));
            }
            _ => return Err(self.error_expected(&["expression"])),
        };
        self.advance();
        Ok(Expr::new(kind, pos))
    }
}
