//! Surface syntax for terms: a small Lean-flavoured parser and pretty printer.
//!
//! Grammar (lowest precedence first):
//!
//! ```text
//! term  ::= 'fun' group+ '=>' term | '∀' group+ ',' term | infix
//! infix ::= app ( op infix )*        -- → 25r, ∨ 30r, ∧ 35r, = 50, + 65l
//! app   ::= atom atom*
//! atom  ::= ident | '(' term ')'
//! group ::= '(' ident+ ':' term ')'
//! ```
//!
//! Identifiers resolve to bound variables first, then to hypotheses of the
//! local context, and otherwise to constants. `a = b`, `a ∧ b`, `a ∨ b` and
//! `a + b` are notation for `Eq a b`, `And a b`, `Or a b` and `HAdd.hAdd a b`.

use std::fmt;

use crate::context::LocalContext;
use crate::error::ElabError;
use crate::expr::{Binder, Expr, Name};

use std::sync::Arc;

const MAX_PREC: u32 = 1024;
const ARROW_PREC: u32 = 25;

/// Infix notation: (symbol, constant, precedence, right associative).
const INFIX: &[(&str, &str, u32, bool)] = &[
    ("∨", "Or", 30, true),
    ("∧", "And", 35, true),
    ("=", "Eq", 50, false),
    ("+", "HAdd.hAdd", 65, false),
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    LParen,
    RParen,
    Colon,
    Comma,
    FatArrow,
    Arrow,
    Forall,
    Fun,
    Op(&'static str),
}

fn is_ident_start(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_ident_rest(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '\'' | '!' | '?')
}

fn tokenize(src: &str) -> Result<Vec<(usize, Token)>, ElabError> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();
    while let Some(&(pos, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let token = match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            ':' => Token::Colon,
            ',' => Token::Comma,
            '→' => Token::Arrow,
            '∀' => Token::Forall,
            'λ' => Token::Fun,
            '∧' => Token::Op("∧"),
            '∨' => Token::Op("∨"),
            '+' => Token::Op("+"),
            '=' => {
                chars.next();
                if matches!(chars.peek(), Some(&(_, '>'))) {
                    chars.next();
                    tokens.push((pos, Token::FatArrow));
                } else {
                    tokens.push((pos, Token::Op("=")));
                }
                continue;
            }
            '-' => {
                chars.next();
                if !matches!(chars.peek(), Some(&(_, '>'))) {
                    return Err(parse_error(pos, "expected '->'"));
                }
                chars.next();
                tokens.push((pos, Token::Arrow));
                continue;
            }
            c if is_ident_start(c) => {
                let mut ident = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if !is_ident_rest(c) {
                        break;
                    }
                    ident.push(c);
                    chars.next();
                }
                let token = match ident.as_str() {
                    "fun" => Token::Fun,
                    "forall" => Token::Forall,
                    _ => Token::Ident(ident),
                };
                tokens.push((pos, token));
                continue;
            }
            other => return Err(parse_error(pos, &format!("unexpected character '{other}'"))),
        };
        chars.next();
        tokens.push((pos, token));
    }
    Ok(tokens)
}

fn parse_error(offset: usize, message: &str) -> ElabError {
    ElabError::Parse {
        offset,
        message: message.to_string(),
    }
}

struct Parser<'a> {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
    lctx: &'a LocalContext,
    /// Names of enclosing binders, innermost last.
    scope: Vec<Name>,
}

#[derive(Clone, Copy)]
enum BindingKind {
    Lam,
    Pi,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(o, _)| *o)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), ElabError> {
        if self.peek() == Some(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(parse_error(self.offset(), &format!("expected {what}")))
        }
    }

    fn term(&mut self, min_prec: u32) -> Result<Expr, ElabError> {
        let mut lhs = match self.peek() {
            Some(Token::Fun) => return self.binding(BindingKind::Lam),
            Some(Token::Forall) => return self.binding(BindingKind::Pi),
            _ => self.app()?,
        };
        loop {
            let (symbol, prec, right_assoc) = match self.peek() {
                Some(Token::Arrow) => ("→", ARROW_PREC, true),
                Some(Token::Op(op)) => match INFIX.iter().find(|(sym, ..)| sym == op) {
                    Some(&(sym, _, prec, right)) => (sym, prec, right),
                    None => break,
                },
                _ => break,
            };
            if prec < min_prec {
                break;
            }
            self.pos += 1;
            let next_min = if right_assoc { prec } else { prec + 1 };
            if symbol == "→" {
                // The codomain lives under an anonymous binder no identifier can name.
                self.scope.push(Name::new(""));
                let rhs = self.term(next_min);
                self.scope.pop();
                lhs = Expr::Pi(
                    Binder {
                        name: Name::new("a"),
                        ty: Arc::new(lhs),
                    },
                    Arc::new(rhs?),
                );
            } else {
                let rhs = self.term(next_min)?;
                let constant = INFIX
                    .iter()
                    .find(|(sym, ..)| *sym == symbol)
                    .map_or(symbol, |&(_, c, ..)| c);
                lhs = Expr::mk_app(Expr::constant(constant), [lhs, rhs]);
            }
        }
        Ok(lhs)
    }

    fn app(&mut self) -> Result<Expr, ElabError> {
        let mut head = self.atom()?;
        loop {
            match self.peek() {
                Some(Token::Ident(_)) | Some(Token::LParen) => {
                    let arg = self.atom()?;
                    head = Expr::app(head, arg);
                }
                Some(Token::Fun) => {
                    let arg = self.binding(BindingKind::Lam)?;
                    return Ok(Expr::app(head, arg));
                }
                _ => return Ok(head),
            }
        }
    }

    fn atom(&mut self) -> Result<Expr, ElabError> {
        let offset = self.offset();
        match self.advance() {
            Some(Token::Ident(name)) => Ok(self.resolve(&name)),
            Some(Token::LParen) => {
                let e = self.term(0)?;
                self.expect(Token::RParen, "')'")?;
                Ok(e)
            }
            _ => Err(parse_error(offset, "expected a term")),
        }
    }

    fn resolve(&self, name: &str) -> Expr {
        if let Some(idx) = self.scope.iter().rposition(|n| n.as_str() == name) {
            return Expr::BVar((self.scope.len() - 1 - idx) as u32);
        }
        match self.lctx.find_by_name(name) {
            Some(decl) => Expr::FVar(decl.fvar),
            None => Expr::constant(name),
        }
    }

    fn binding(&mut self, kind: BindingKind) -> Result<Expr, ElabError> {
        self.pos += 1;
        let mut binders: Vec<(Name, Expr)> = Vec::new();
        while self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let mut names = Vec::new();
            while let Some(Token::Ident(name)) = self.peek() {
                names.push(Name::from(name.as_str()));
                self.pos += 1;
            }
            if names.is_empty() {
                return Err(parse_error(self.offset(), "expected binder name"));
            }
            self.expect(Token::Colon, "':' in binder")?;
            let ty = self.term(0)?;
            self.expect(Token::RParen, "')' after binder type")?;
            for (k, name) in names.into_iter().enumerate() {
                binders.push((name.clone(), ty.lift_loose_bvars(0, k as u32)));
                self.scope.push(name);
            }
        }
        if binders.is_empty() {
            return Err(parse_error(self.offset(), "expected binder group '(x : T)'"));
        }
        match kind {
            BindingKind::Lam => self.expect(Token::FatArrow, "'=>'")?,
            BindingKind::Pi => self.expect(Token::Comma, "','")?,
        }
        let mut body = self.term(0)?;
        for _ in 0..binders.len() {
            self.scope.pop();
        }
        for (name, ty) in binders.into_iter().rev() {
            body = match kind {
                BindingKind::Lam => Expr::lam(name, ty, body),
                BindingKind::Pi => Expr::pi(name, ty, body),
            };
        }
        Ok(body)
    }
}

/// Parse `src` in `lctx`.
pub fn parse_term(src: &str, lctx: &LocalContext) -> Result<Expr, ElabError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: src.len(),
        lctx,
        scope: Vec::new(),
    };
    let e = parser.term(0)?;
    if parser.pos < parser.tokens.len() {
        return Err(parse_error(parser.offset(), "unexpected token after term"));
    }
    Ok(e)
}

struct Printer<'a> {
    lctx: &'a LocalContext,
    names: Vec<Name>,
}

impl<'a> Printer<'a> {
    fn fresh(&self, base: &Name) -> Name {
        let taken = |n: &str| {
            self.names.iter().any(|m| m.as_str() == n) || self.lctx.find_by_name(n).is_some()
        };
        if !taken(base.as_str()) {
            return base.clone();
        }
        (1..)
            .map(|i| Name::from(format!("{base}_{i}")))
            .find(|n| !taken(n.as_str()))
            .unwrap_or_else(|| base.clone())
    }

    fn expr(&mut self, e: &Expr, prec: u32) -> String {
        let (out, own) = self.expr_core(e);
        if own < prec {
            format!("({out})")
        } else {
            out
        }
    }

    fn expr_core(&mut self, e: &Expr) -> (String, u32) {
        match e {
            Expr::BVar(i) => {
                let name = self
                    .names
                    .len()
                    .checked_sub(1 + *i as usize)
                    .map(|idx| self.names[idx].to_string());
                (name.unwrap_or_else(|| format!("#{i}")), u32::MAX)
            }
            Expr::FVar(f) => match self.lctx.find(*f) {
                Some(decl) => (decl.user_name.to_string(), u32::MAX),
                None => (f.to_string(), u32::MAX),
            },
            Expr::MVar(_) => ("?_".to_string(), u32::MAX),
            Expr::Const(n) => (n.to_string(), u32::MAX),
            Expr::Sorry { .. } => ("sorry".to_string(), u32::MAX),
            Expr::App(..) => self.app(e),
            Expr::Lam(..) => self.binding(e, true),
            Expr::Pi(binder, body) if !body.has_loose_bvar(0) => {
                let dom = self.expr(&binder.ty, ARROW_PREC + 1);
                self.names.push(Name::new(""));
                let codom = self.expr(body, ARROW_PREC);
                self.names.pop();
                (format!("{dom} → {codom}"), ARROW_PREC)
            }
            Expr::Pi(..) => self.binding(e, false),
        }
    }

    fn app(&mut self, e: &Expr) -> (String, u32) {
        let head = e.app_fn();
        let args = e.app_args();
        if let (Expr::Const(c), [lhs, rhs]) = (head, args.as_slice()) {
            if let Some(&(sym, _, prec, right)) =
                INFIX.iter().find(|(_, name, ..)| *name == c.as_str())
            {
                let (lp, rp) = if right { (prec + 1, prec) } else { (prec, prec + 1) };
                let (lp, rp) = if sym == "=" { (prec + 1, prec + 1) } else { (lp, rp) };
                let l = self.expr(lhs, lp);
                let r = self.expr(rhs, rp);
                return (format!("{l} {sym} {r}"), prec);
            }
        }
        let mut out = self.expr(head, MAX_PREC);
        for arg in args {
            out.push(' ');
            out.push_str(&self.expr(arg, MAX_PREC + 1));
        }
        (out, MAX_PREC)
    }

    /// `fun (x : A) (y : B) => b` / `∀ (x : A) (y : B), b`, merging nested binders.
    fn binding(&mut self, e: &Expr, lam: bool) -> (String, u32) {
        let mut out = String::from(if lam { "fun" } else { "∀" });
        let mut pushed = 0;
        let mut cur = e;
        loop {
            let (binder, body) = match (cur, lam) {
                (Expr::Lam(b, body), true) => (b, body),
                (Expr::Pi(b, body), false) if body.has_loose_bvar(0) => (b, body),
                _ => break,
            };
            let ty = self.expr(&binder.ty, 0);
            let name = self.fresh(&binder.name);
            out.push_str(&format!(" ({name} : {ty})"));
            self.names.push(name);
            pushed += 1;
            cur = body.as_ref();
        }
        out.push_str(if lam { " => " } else { ", " });
        out.push_str(&self.expr(cur, 0));
        for _ in 0..pushed {
            self.names.pop();
        }
        (out, 0)
    }
}

/// Render `e` with hypotheses named from `lctx`.
pub fn pp_expr(e: &Expr, lctx: &LocalContext) -> String {
    let mut printer = Printer {
        lctx,
        names: Vec::new(),
    };
    printer.expr(e, 0)
}

/// Render a goal as `h : T` lines followed by `⊢ target`.
pub fn pp_goal(lctx: &LocalContext, target: &Expr) -> String {
    let mut lines: Vec<String> = lctx
        .iter()
        .map(|d| format!("{} : {}", d.user_name, pp_expr(&d.ty, lctx)))
        .collect();
    lines.push(format!("⊢ {}", pp_expr(target, lctx)));
    lines.join("\n")
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&pp_expr(self, &LocalContext::new()))
    }
}
