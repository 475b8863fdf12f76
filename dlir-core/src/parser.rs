//! Parser for DLIR programs
//!
//! Grammar:
//!
//! ```text
//! program ::= { clause }
//! clause  ::= atom ( '.' | '?' | ':-' premise { ',' premise } '.' )
//! premise ::= 'not' atom | term ( '=' | '!=' ) term | atom
//! atom    ::= name [ '(' term { ',' term } ')' ]
//! term    ::= name | digits | '"' string '"' | Variable | '_'
//! ```
//!
//! Identifiers starting with a lowercase letter or `_` are constants or
//! predicate symbols depending on position, identifiers starting with an
//! uppercase letter are variables, and a lone `_` is an anonymous variable. `%` starts a comment
//! that runs to the end of the line.
//!
//! Parsing happens in two phases: nom combinators produce a borrowed raw
//! syntax tree, which is then lowered into the IR while checking arities
//! and range restriction.

use crate::datalog::diagnostics::Span;
use crate::datalog::types::{
    Atom, Clause, PredicateSymbol, Premise, Program, Query, Term, Variable,
};
use crate::error::{DlirError, Result};
use crate::types::Constant;
use ahash::AHashMap;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while};
use nom::character::complete::{char, digit1, multispace1, none_of, not_line_ending, one_of, satisfy};
use nom::combinator::{consumed, cut, eof, map, not, opt, recognize, value, verify};
use nom::error::{context, VerboseError, VerboseErrorKind};
use nom::multi::{fold_many0, many0, many0_count};
use nom::sequence::{delimited, pair, preceded, terminated, tuple};
use nom::{IResult, Offset};
use std::collections::BTreeSet;
use tracing::debug;

type PResult<'a, O> = IResult<&'a str, O, VerboseError<&'a str>>;

#[derive(Debug, Clone)]
enum RawTerm<'a> {
    Constant(String),
    Variable(&'a str),
    Wildcard(&'a str),
}

#[derive(Debug, Clone)]
struct RawAtom<'a> {
    name: &'a str,
    terms: Vec<RawTerm<'a>>,
    at: &'a str,
}

#[derive(Debug, Clone)]
enum RawPremise<'a> {
    Positive(RawAtom<'a>),
    Negated(RawAtom<'a>),
    Equality(RawTerm<'a>, RawTerm<'a>),
    Inequality(RawTerm<'a>, RawTerm<'a>),
}

#[derive(Debug, Clone)]
enum RawEnd<'a> {
    Fact,
    Query,
    Rule(Vec<RawPremise<'a>>),
}

#[derive(Debug, Clone)]
struct RawClause<'a> {
    head: RawAtom<'a>,
    end: RawEnd<'a>,
    at: &'a str,
}

#[derive(Debug, Clone, Copy)]
enum Comparison {
    Equal,
    NotEqual,
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Whitespace and `%` comments
fn ws(input: &str) -> PResult<'_, ()> {
    value(
        (),
        many0_count(alt((
            multispace1,
            recognize(pair(char('%'), not_line_ending)),
        ))),
    )(input)
}

fn lex<'a, O, F>(parser: F) -> impl FnMut(&'a str) -> PResult<'a, O>
where
    F: FnMut(&'a str) -> PResult<'a, O>,
{
    preceded(ws, parser)
}

fn symbol<'a>(c: char) -> impl FnMut(&'a str) -> PResult<'a, char> {
    preceded(ws, char(c))
}

fn identifier(input: &str) -> PResult<'_, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
        take_while(is_ident_char),
    ))(input)
}

fn keyword_not(input: &str) -> PResult<'_, &str> {
    terminated(tag("not"), not(satisfy(is_ident_char)))(input)
}

/// Predicate symbol or constant; `_name` counts as lowercase
fn lower_name(input: &str) -> PResult<'_, &str> {
    verify(identifier, |s: &str| {
        s.starts_with(|c: char| c.is_ascii_lowercase() || c == '_')
            && s != "_"
            && s != "not"
    })(input)
}

fn variable_name(input: &str) -> PResult<'_, &str> {
    verify(identifier, |s: &str| s.starts_with(|c: char| c.is_ascii_uppercase()))(input)
}

fn wildcard(input: &str) -> PResult<'_, &str> {
    terminated(tag("_"), not(satisfy(is_ident_char)))(input)
}

fn quoted(input: &str) -> PResult<'_, String> {
    delimited(
        char('"'),
        fold_many0(
            alt((
                none_of("\\\"\n"),
                preceded(
                    char('\\'),
                    alt((
                        value('"', char('"')),
                        value('\\', char('\\')),
                        value('\n', char('n')),
                    )),
                ),
            )),
            String::new,
            |mut text, c| {
                text.push(c);
                text
            },
        ),
        cut(char('"')),
    )(input)
}

fn term(input: &str) -> PResult<'_, RawTerm<'_>> {
    context(
        "term",
        alt((
            map(quoted, RawTerm::Constant),
            map(digit1, |digits: &str| RawTerm::Constant(digits.to_string())),
            map(wildcard, RawTerm::Wildcard),
            map(variable_name, RawTerm::Variable),
            map(lower_name, |name: &str| RawTerm::Constant(name.to_string())),
        )),
    )(input)
}

fn term_list(input: &str) -> PResult<'_, Vec<RawTerm<'_>>> {
    map(
        pair(lex(term), many0(preceded(symbol(','), cut(lex(term))))),
        |(first, rest)| {
            let mut terms = vec![first];
            terms.extend(rest);
            terms
        },
    )(input)
}

fn atom(input: &str) -> PResult<'_, RawAtom<'_>> {
    map(
        consumed(pair(
            context("predicate name", lower_name),
            opt(preceded(
                symbol('('),
                cut(terminated(term_list, symbol(')'))),
            )),
        )),
        |(at, (name, terms))| RawAtom {
            name,
            terms: terms.unwrap_or_default(),
            at,
        },
    )(input)
}

fn comparison(input: &str) -> PResult<'_, Comparison> {
    alt((
        value(Comparison::NotEqual, tag("!=")),
        value(Comparison::Equal, tag("=")),
    ))(input)
}

fn premise(input: &str) -> PResult<'_, RawPremise<'_>> {
    context(
        "premise",
        alt((
            map(preceded(keyword_not, cut(lex(atom))), RawPremise::Negated),
            map(
                tuple((term, lex(comparison), cut(lex(term)))),
                |(left, op, right)| match op {
                    Comparison::Equal => RawPremise::Equality(left, right),
                    Comparison::NotEqual => RawPremise::Inequality(left, right),
                },
            ),
            map(atom, RawPremise::Positive),
        )),
    )(input)
}

fn premise_list(input: &str) -> PResult<'_, Vec<RawPremise<'_>>> {
    map(
        pair(lex(premise), many0(preceded(symbol(','), cut(lex(premise))))),
        |(first, rest)| {
            let mut premises = vec![first];
            premises.extend(rest);
            premises
        },
    )(input)
}

fn clause(input: &str) -> PResult<'_, RawClause<'_>> {
    map(
        consumed(pair(
            context("clause head", atom),
            context(
                "'.', '?' or ':-'",
                preceded(
                    ws,
                    alt((
                        map(char('.'), |_| RawEnd::Fact),
                        map(char('?'), |_| RawEnd::Query),
                        map(
                            preceded(tag(":-"), cut(terminated(premise_list, symbol('.')))),
                            RawEnd::Rule,
                        ),
                    )),
                ),
            ),
        )),
        |(at, (head, end))| RawClause { head, end, at },
    )(input)
}

/// Convert a nom error into a `SyntaxError` located in `source`
fn syntax_error(source: &str, error: VerboseError<&str>) -> DlirError {
    let Some((rest, kind)) = error.errors.first() else {
        return DlirError::SyntaxError {
            message: "unexpected input".to_string(),
            token: "end of input".to_string(),
            span: Span::locate(source, source.len(), 0),
        };
    };

    let contexts = || {
        error.errors.iter().filter_map(|(at, kind)| match kind {
            VerboseErrorKind::Context(ctx) => Some((*at, *ctx)),
            _ => None,
        })
    };
    let expected = match kind {
        VerboseErrorKind::Char(c) => Some(format!("'{}'", c)),
        _ => contexts()
            .filter(|(at, _)| at.len() == rest.len())
            .last()
            .or_else(|| contexts().next())
            .map(|(_, ctx)| ctx.to_string()),
    };
    let message = match expected {
        Some(expected) => format!("expected {}", expected),
        None => "unexpected input".to_string(),
    };

    let token_len = token_length(rest);
    let token = if rest.is_empty() {
        "end of input".to_string()
    } else {
        format!("'{}'", &rest[..token_len])
    };

    DlirError::SyntaxError {
        message,
        token,
        span: Span::locate(source, source.offset(rest), token_len),
    }
}

fn token_length(rest: &str) -> usize {
    match rest.chars().next() {
        None => 0,
        Some(c) if is_ident_char(c) => rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len()),
        Some(_) if rest.starts_with(":-") || rest.starts_with("!=") => 2,
        Some(c) => c.len_utf8(),
    }
}

fn parse_raw(source: &str) -> Result<Vec<RawClause<'_>>> {
    let mut clauses = Vec::new();
    let mut input = source;

    loop {
        let (rest, ()) = ws(input).map_err(|e| nom_error(source, e))?;
        if rest.is_empty() {
            return Ok(clauses);
        }
        let (rest, raw) = clause(rest).map_err(|e| nom_error(source, e))?;
        clauses.push(raw);
        input = rest;
    }
}

fn nom_error(source: &str, error: nom::Err<VerboseError<&str>>) -> DlirError {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => syntax_error(source, e),
        nom::Err::Incomplete(_) => syntax_error(source, VerboseError { errors: Vec::new() }),
    }
}

enum Lowered {
    Clause(Clause),
    Query(Query),
}

/// Second phase: raw syntax to IR, with arity and safety checks
struct Lowering<'s> {
    source: &'s str,
    arities: AHashMap<&'s str, usize>,
}

impl<'s> Lowering<'s> {
    fn new(source: &'s str) -> Self {
        Lowering {
            source,
            arities: AHashMap::new(),
        }
    }

    fn span(&self, fragment: &str) -> Span {
        Span::locate(self.source, self.source.offset(fragment), fragment.len())
    }

    fn predicate(&mut self, raw: &RawAtom<'s>) -> Result<PredicateSymbol> {
        let found = raw.terms.len();
        match self.arities.get(raw.name) {
            Some(&expected) if expected != found => Err(DlirError::ArityMismatchError {
                predicate: raw.name.to_string(),
                expected,
                found,
                span: self.span(raw.at),
            }),
            Some(_) => Ok(PredicateSymbol::new(raw.name, found)),
            None => {
                self.arities.insert(raw.name, found);
                Ok(PredicateSymbol::new(raw.name, found))
            }
        }
    }

    fn term(raw: &RawTerm<'s>, anonymous: &mut usize) -> Term {
        match raw {
            RawTerm::Constant(text) => Term::Constant(Constant::new(text.as_str())),
            RawTerm::Variable(name) => Term::Variable(Variable::new(*name)),
            RawTerm::Wildcard(_) => {
                let var = Variable::anonymous(*anonymous);
                *anonymous += 1;
                Term::Variable(var)
            }
        }
    }

    fn atom(&mut self, raw: &RawAtom<'s>, anonymous: &mut usize) -> Result<Atom> {
        let predicate = self.predicate(raw)?;
        let terms = raw
            .terms
            .iter()
            .map(|t| Self::term(t, anonymous))
            .collect();
        Ok(Atom { predicate, terms })
    }

    fn clause(&mut self, raw: &RawClause<'s>) -> Result<Lowered> {
        let mut anonymous = 0;
        let head = self.atom(&raw.head, &mut anonymous)?;
        let span = self.span(raw.at);

        let raw_body = match &raw.end {
            RawEnd::Query => return Ok(Lowered::Query(Query { atom: head, span })),
            RawEnd::Fact => &[][..],
            RawEnd::Rule(premises) => premises.as_slice(),
        };

        let mut body = Vec::with_capacity(raw_body.len());
        for premise in raw_body {
            body.push(match premise {
                RawPremise::Positive(atom) => Premise::Positive(self.atom(atom, &mut anonymous)?),
                RawPremise::Negated(atom) => Premise::Negated(self.atom(atom, &mut anonymous)?),
                RawPremise::Equality(left, right) => Premise::Equality(
                    Self::term(left, &mut anonymous),
                    Self::term(right, &mut anonymous),
                ),
                RawPremise::Inequality(left, right) => Premise::Inequality(
                    Self::term(left, &mut anonymous),
                    Self::term(right, &mut anonymous),
                ),
            });
        }

        let clause = Clause { head, body, span };
        self.check_safety(raw, raw_body, &clause)?;
        Ok(Lowered::Clause(clause))
    }

    /// Range restriction: named variables of the head, of negated atoms and
    /// of comparisons must occur in a positive premise. Wildcards are not
    /// allowed in the head or in comparisons.
    fn check_safety(&self, raw: &RawClause<'s>, raw_body: &[RawPremise<'s>], clause: &Clause) -> Result<()> {
        let bound: BTreeSet<&str> = clause
            .positive_variables()
            .into_iter()
            .map(Variable::name)
            .collect();

        let head = raw.head.terms.iter().map(|t| (t, false));
        let filters = raw_body.iter().flat_map(|premise| match premise {
            RawPremise::Positive(_) => Vec::new(),
            RawPremise::Negated(atom) => atom.terms.iter().map(|t| (t, true)).collect(),
            RawPremise::Equality(left, right) | RawPremise::Inequality(left, right) => {
                vec![(left, false), (right, false)]
            }
        });

        for (term, wildcard_allowed) in head.chain(filters) {
            let unbound = match term {
                RawTerm::Variable(name) if !bound.contains(name) => Some(*name),
                RawTerm::Wildcard(at) if !wildcard_allowed => Some(*at),
                _ => None,
            };
            if let Some(variable) = unbound {
                return Err(DlirError::UnsafeRuleError {
                    variable: variable.to_string(),
                    clause: clause.to_string(),
                    span: self.span(variable),
                });
            }
        }

        Ok(())
    }
}

/// Parse program text into clauses and query clauses
///
/// Fails on the first syntax, arity or safety error in textual order.
pub fn parse_program(source: &str) -> Result<Program> {
    let raw = parse_raw(source)?;
    let mut lowering = Lowering::new(source);
    let mut program = Program::default();

    for raw_clause in &raw {
        match lowering.clause(raw_clause)? {
            Lowered::Clause(clause) => program.clauses.push(clause),
            Lowered::Query(query) => program.queries.push(query),
        }
    }

    debug!(
        clauses = program.clauses.len(),
        queries = program.queries.len(),
        "parsed program"
    );
    Ok(program)
}

/// Parse a single atom, optionally terminated by `?` or `.`
///
/// Variables are allowed anywhere; the atom is not checked against the
/// arities of any program.
pub fn parse_query(text: &str) -> Result<Atom> {
    let (_, raw) = terminated(
        lex(atom),
        tuple((ws, opt(one_of("?.")), ws, context("end of query", eof))),
    )(text)
    .map_err(|e| nom_error(text, e))?;

    Lowering::new(text).atom(&raw, &mut 0)
}
