//! Logic program text format: the parser and pretty-printer for the wire
//! format described in the external interfaces — declarations, rules, and
//! facts, one statement per period-terminated sentence, `#` line comments,
//! whitespace insignificant outside strings.

use crate::error::{Error, Result};
use crate::rule::{AggFn, AggPipeline, AtomPattern, BodyLiteral, CompOp, Rule};
use crate::schema::{Owner, PredicateDecl, Visibility};
use crate::symbol::SymbolTable;
use crate::term::{Term, TermType};

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Ident(String),
    Var(String),
    AtomLit(String),
    Str(String),
    Int(i64),
    Float(f64),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Period,
    Bang,
    TurnstileIs, // :-
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Pipe, // |>
    Do,
    Let,
    FnCall(String), // fn:name
    KwDecl,
}

fn tokenize(src: &str) -> Result<Vec<Token>> {
    let mut chars: Vec<char> = src.chars().collect();
    chars.push('\0');
    let mut i = 0usize;
    let mut out = Vec::new();

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\0' => break,
            c if c.is_whitespace() => i += 1,
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '(' => {
                out.push(Token::LParen);
                i += 1;
            }
            ')' => {
                out.push(Token::RParen);
                i += 1;
            }
            '[' => {
                out.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                out.push(Token::RBracket);
                i += 1;
            }
            '{' => {
                out.push(Token::LBrace);
                i += 1;
            }
            '}' => {
                out.push(Token::RBrace);
                i += 1;
            }
            ',' => {
                out.push(Token::Comma);
                i += 1;
            }
            '.' => {
                out.push(Token::Period);
                i += 1;
            }
            ':' => {
                if chars.get(i + 1) == Some(&'-') {
                    out.push(Token::TurnstileIs);
                    i += 2;
                } else {
                    out.push(Token::Colon);
                    i += 1;
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    out.push(Token::Ne);
                    i += 2;
                } else {
                    out.push(Token::Bang);
                    i += 1;
                }
            }
            '=' => {
                out.push(Token::Eq);
                i += 1;
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    out.push(Token::Le);
                    i += 2;
                } else {
                    out.push(Token::Lt);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    out.push(Token::Ge);
                    i += 2;
                } else {
                    out.push(Token::Gt);
                    i += 1;
                }
            }
            '|' => {
                if chars.get(i + 1) == Some(&'>') {
                    out.push(Token::Pipe);
                    i += 2;
                } else {
                    return Err(Error::Parse(format!("unexpected character '|' at byte {i}")));
                }
            }
            '/' => {
                let mut j = i + 1;
                while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_') {
                    j += 1;
                }
                if j == i + 1 {
                    return Err(Error::Parse("empty atom literal after '/'".to_string()));
                }
                out.push(Token::AtomLit(chars[i + 1..j].iter().collect()));
                i = j;
            }
            '"' => {
                let mut j = i + 1;
                let mut s = String::new();
                loop {
                    if j >= chars.len() || chars[j] == '\0' {
                        return Err(Error::Parse("unterminated string literal".to_string()));
                    }
                    if chars[j] == '"' {
                        j += 1;
                        break;
                    }
                    if chars[j] == '\\' && j + 1 < chars.len() {
                        s.push(match chars[j + 1] {
                            'n' => '\n',
                            't' => '\t',
                            '"' => '"',
                            '\\' => '\\',
                            other => other,
                        });
                        j += 2;
                    } else {
                        s.push(chars[j]);
                        j += 1;
                    }
                }
                out.push(Token::Str(s));
                i = j;
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).map(|c| c.is_ascii_digit()).unwrap_or(false)) => {
                let mut j = i + 1;
                let mut is_float = false;
                while j < chars.len()
                    && (chars[j].is_ascii_digit() || (chars[j] == '.' && !is_float && chars.get(j + 1).map(|c| c.is_ascii_digit()).unwrap_or(false)))
                {
                    if chars[j] == '.' {
                        is_float = true;
                    }
                    j += 1;
                }
                let text: String = chars[i..j].iter().collect();
                if is_float {
                    out.push(Token::Float(text.parse().map_err(|_| {
                        Error::Parse(format!("invalid float literal '{text}'"))
                    })?));
                } else {
                    out.push(Token::Int(text.parse().map_err(|_| {
                        Error::Parse(format!("invalid int literal '{text}'"))
                    })?));
                }
                i = j;
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut j = i + 1;
                while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_') {
                    j += 1;
                }
                let word: String = chars[i..j].iter().collect();
                // `fn:name` function-call tokens inside aggregation pipelines.
                if word == "fn" && chars.get(j) == Some(&':') {
                    let mut k = j + 1;
                    while k < chars.len() && (chars[k].is_alphanumeric() || chars[k] == '_') {
                        k += 1;
                    }
                    out.push(Token::FnCall(chars[j + 1..k].iter().collect()));
                    i = k;
                    continue;
                }
                match word.as_str() {
                    "true" => out.push(Token::Ident("true".into())),
                    "false" => out.push(Token::Ident("false".into())),
                    "Decl" => out.push(Token::KwDecl),
                    "do" => out.push(Token::Do),
                    "let" => out.push(Token::Let),
                    _ => {
                        let is_var = word.chars().next().map(|c| c.is_uppercase() || c == '_').unwrap_or(false);
                        if is_var {
                            out.push(Token::Var(word));
                        } else {
                            out.push(Token::Ident(word));
                        }
                    }
                }
                i = j;
            }
            other => {
                return Err(Error::Parse(format!("unexpected character '{other}'")));
            }
        }
    }
    Ok(out)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    table: &'a SymbolTable,
}

#[derive(Debug)]
pub enum Statement {
    Decl(PredicateDecl),
    Rule(Rule),
    Fact(crate::fact::Fact),
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        match self.advance() {
            Some(t) if &t == expected => Ok(()),
            Some(t) => Err(Error::Parse(format!("expected {expected:?}, got {t:?}"))),
            None => Err(Error::Parse(format!("expected {expected:?}, got end of input"))),
        }
    }

    fn parse_statements(&mut self) -> Result<Vec<Statement>> {
        let mut out = Vec::new();
        while self.peek().is_some() {
            out.push(self.parse_statement()?);
        }
        Ok(out)
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        if matches!(self.peek(), Some(Token::KwDecl)) {
            return self.parse_decl();
        }
        // Either `head.` (fact) or `head :- body.` (rule).
        let head = self.parse_atom_pattern()?;
        match self.peek() {
            Some(Token::TurnstileIs) => {
                self.advance();
                let body = self.parse_body()?;
                self.expect(&Token::Period)?;
                if head.vars().is_empty() && body.is_empty() {
                    // unreachable in practice; kept for clarity
                }
                Ok(Statement::Rule(Rule {
                    head,
                    body,
                    source_text: String::new(),
                }))
            }
            Some(Token::Period) => {
                self.advance();
                if head.args.iter().any(|t| !t.is_ground()) {
                    return Err(Error::Parse("facts must be ground (no variables)".into()));
                }
                Ok(Statement::Fact(crate::fact::Fact::new(head.predicate, head.args)))
            }
            other => Err(Error::Parse(format!("expected ':-' or '.', got {other:?}"))),
        }
    }

    fn parse_decl(&mut self) -> Result<Statement> {
        self.advance(); // Decl
        let name = self.expect_ident()?;
        self.expect(&Token::LParen)?;
        let mut types = Vec::new();
        if !matches!(self.peek(), Some(Token::RParen)) {
            loop {
                types.push(self.parse_type()?);
                if matches!(self.peek(), Some(Token::Comma)) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;
        self.expect(&Token::Period)?;
        let arg_enums = vec![None; types.len()];
        Ok(Statement::Decl(PredicateDecl {
            predicate: self.table.intern(&name),
            arity: types.len(),
            arg_types: types,
            owner: Owner::User,
            visibility: Visibility::Extensional,
            docstring: String::new(),
            core_owned: false,
            arg_enums,
        }))
    }

    fn parse_type(&mut self) -> Result<TermType> {
        let name = self.expect_ident()?;
        match name.as_str() {
            "atom" => Ok(TermType::Atom),
            "string" => Ok(TermType::Str),
            "int" => Ok(TermType::Int),
            "float" => Ok(TermType::Float),
            "bool" => Ok(TermType::Bool),
            "struct" => Ok(TermType::Struct),
            "any" => Ok(TermType::Any),
            _ => Err(Error::Parse(format!("unknown type '{name}'"))),
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.advance() {
            Some(Token::Ident(s)) => Ok(s),
            other => Err(Error::Parse(format!("expected identifier, got {other:?}"))),
        }
    }

    fn parse_atom_pattern(&mut self) -> Result<AtomPattern> {
        let name = self.expect_ident()?;
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        if !matches!(self.peek(), Some(Token::RParen)) {
            loop {
                args.push(self.parse_term()?);
                if matches!(self.peek(), Some(Token::Comma)) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;
        Ok(AtomPattern {
            predicate: self.table.intern(&name),
            args,
        })
    }

    fn parse_term(&mut self) -> Result<Term> {
        match self.advance() {
            Some(Token::Var(v)) => Ok(Term::Var(v)),
            Some(Token::AtomLit(a)) => Ok(Term::Atom(self.table.intern(&a))),
            Some(Token::Str(s)) => Ok(Term::Str(s)),
            Some(Token::Int(i)) => Ok(Term::Int(i)),
            Some(Token::Float(f)) => Ok(Term::Float(f)),
            Some(Token::Ident(s)) if s == "true" => Ok(Term::Bool(true)),
            Some(Token::Ident(s)) if s == "false" => Ok(Term::Bool(false)),
            Some(Token::LBracket) => {
                let mut items = Vec::new();
                if !matches!(self.peek(), Some(Token::RBracket)) {
                    loop {
                        items.push(self.parse_term()?);
                        if matches!(self.peek(), Some(Token::Comma)) {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(&Token::RBracket)?;
                Ok(Term::List(items))
            }
            Some(Token::LBrace) => {
                let mut fields = Vec::new();
                if !matches!(self.peek(), Some(Token::RBrace)) {
                    loop {
                        let key = match self.advance() {
                            Some(Token::AtomLit(a)) => self.table.intern(&a),
                            other => {
                                return Err(Error::Parse(format!(
                                    "expected /key in struct, got {other:?}"
                                )))
                            }
                        };
                        self.expect(&Token::Colon)?;
                        let value = self.parse_term()?;
                        fields.push((key, value));
                        if matches!(self.peek(), Some(Token::Comma)) {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(&Token::RBrace)?;
                Ok(Term::Struct(fields))
            }
            other => Err(Error::Parse(format!("expected term, got {other:?}"))),
        }
    }

    fn parse_body(&mut self) -> Result<Vec<BodyLiteral>> {
        let mut out = Vec::new();
        loop {
            if matches!(self.peek(), Some(Token::Pipe)) {
                self.advance();
                out.push(BodyLiteral::Aggregate(self.parse_aggregate()?));
                break;
            }
            out.push(self.parse_body_literal()?);
            if matches!(self.peek(), Some(Token::Comma)) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(out)
    }

    fn parse_body_literal(&mut self) -> Result<BodyLiteral> {
        if matches!(self.peek(), Some(Token::Bang)) {
            self.advance();
            return Ok(BodyLiteral::Negative(self.parse_atom_pattern()?));
        }
        // Disambiguate atom vs comparison by trying atom first, falling back.
        let save = self.pos;
        if let Ok(atom) = self.parse_atom_pattern() {
            return Ok(BodyLiteral::Positive(atom));
        }
        self.pos = save;
        let lhs = self.parse_term()?;
        let op = match self.advance() {
            Some(Token::Eq) => CompOp::Eq,
            Some(Token::Ne) => CompOp::Ne,
            Some(Token::Lt) => CompOp::Lt,
            Some(Token::Le) => CompOp::Le,
            Some(Token::Gt) => CompOp::Gt,
            Some(Token::Ge) => CompOp::Ge,
            other => return Err(Error::Parse(format!("expected comparison operator, got {other:?}"))),
        };
        let rhs = self.parse_term()?;
        Ok(BodyLiteral::Comparison(lhs, op, rhs))
    }

    fn parse_aggregate(&mut self) -> Result<AggPipeline> {
        self.expect(&Token::Do)?;
        match self.advance() {
            Some(Token::FnCall(name)) if name == "group_by" => {}
            other => return Err(Error::Parse(format!("expected fn:group_by, got {other:?}"))),
        }
        self.expect(&Token::LParen)?;
        let mut group_by = Vec::new();
        if !matches!(self.peek(), Some(Token::RParen)) {
            loop {
                match self.advance() {
                    Some(Token::Var(v)) => group_by.push(v),
                    other => return Err(Error::Parse(format!("expected variable, got {other:?}"))),
                }
                if matches!(self.peek(), Some(Token::Comma)) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;
        self.expect(&Token::Comma)?;
        self.expect(&Token::Let)?;
        let result_var = match self.advance() {
            Some(Token::Var(v)) => v,
            other => return Err(Error::Parse(format!("expected variable, got {other:?}"))),
        };
        self.expect(&Token::Eq)?;
        let agg_fn = match self.advance() {
            Some(Token::FnCall(name)) => match name.as_str() {
                "count" => AggFn::Count,
                "sum" => AggFn::Sum,
                "min" => AggFn::Min,
                "max" => AggFn::Max,
                "collect" => AggFn::Collect,
                other => return Err(Error::Parse(format!("unknown aggregation function '{other}'"))),
            },
            other => return Err(Error::Parse(format!("expected fn:<agg>, got {other:?}"))),
        };
        self.expect(&Token::LParen)?;
        let agg_arg = match self.advance() {
            Some(Token::Var(v)) => v,
            other => return Err(Error::Parse(format!("expected variable, got {other:?}"))),
        };
        self.expect(&Token::RParen)?;
        Ok(AggPipeline {
            group_by,
            result_var,
            agg_fn,
            agg_arg,
        })
    }
}

pub fn parse_program(src: &str, table: &SymbolTable) -> Result<Vec<Statement>> {
    let tokens = tokenize(src)?;
    let mut parser = Parser { tokens, pos: 0, table };
    parser.parse_statements()
}

/// Parse exactly one rule (used by `hot_load_rule`/`sandbox_validate`, which
/// accept a single rule text, not a whole program).
pub fn parse_single_rule(src: &str, table: &SymbolTable) -> Result<Rule> {
    let statements = parse_program(src, table)?;
    match statements.as_slice() {
        [Statement::Rule(rule)] => {
            let mut rule = rule.clone();
            rule.source_text = src.trim().to_string();
            Ok(rule)
        }
        [Statement::Fact(_)] => Err(Error::Parse(
            "expected a rule (head :- body.), got a fact with no body".to_string(),
        )),
        [] => Err(Error::Parse("empty rule text".to_string())),
        _ => Err(Error::Parse("expected exactly one rule".to_string())),
    }
}
