//! # Parser Combinators
//!
//! Any `Fn(&[I], usize) -> ParseResult<O>` is a [`Parser`], so each
//! combinator below is a plain function returning a closure. Only [`lazy`]
//! needs a named type: recursive grammar rules refer to themselves through
//! it, and a closure would capture the rule's own return type.

use std::cell::Cell;
use std::fmt;

use super::core::{ParseError, ParseErrorKind, ParseResult, Parser};

impl<I, O, F> Parser<I, O> for F
where
    F: Fn(&[I], usize) -> ParseResult<O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        self(input, pos)
    }
}

fn unexpected<I: fmt::Display>(expected: &str, found: Option<&I>, position: usize) -> ParseError {
    let expected = expected.to_string();
    let kind = match found {
        Some(found) => ParseErrorKind::Unexpected {
            expected,
            found: found.to_string(),
        },
        None => ParseErrorKind::EndOfInput { expected },
    };
    ParseError::new(kind, position)
}

/// One token equal to `value`.
pub fn equal<I>(value: I) -> impl Parser<I, I>
where
    I: Clone + PartialEq + fmt::Display,
{
    move |input: &[I], pos: usize| -> ParseResult<I> {
        match input.get(pos) {
            Some(found) if *found == value => Ok((pos + 1, found.clone())),
            found => Err(unexpected(&value.to_string(), found, pos)),
        }
    }
}

/// One token that `f` maps to a value.
pub fn satisfy<I, O, F>(f: F, expected: &'static str) -> impl Parser<I, O>
where
    I: fmt::Display,
    F: Fn(&I) -> Option<O>,
{
    move |input: &[I], pos: usize| -> ParseResult<O> {
        match input.get(pos).map(|found| (found, f(found))) {
            Some((_, Some(value))) => Ok((pos + 1, value)),
            Some((found, None)) => Err(unexpected(expected, Some(found), pos)),
            None => Err(unexpected::<I>(expected, None, pos)),
        }
    }
}

/// Only at the end of input.
pub fn eof<I: fmt::Display>() -> impl Parser<I, ()> {
    |input: &[I], pos: usize| -> ParseResult<()> {
        match input.get(pos) {
            None => Ok((pos, ())),
            found => Err(unexpected("end of input", found, pos)),
        }
    }
}

/// The first alternative that succeeds.
///
/// When all fail, the error of the alternative that got furthest wins, so
/// diagnostics point inside the construct the input most likely meant.
pub fn choice<I, O>(parsers: Vec<Box<dyn Parser<I, O>>>) -> impl Parser<I, O> {
    move |input: &[I], pos: usize| -> ParseResult<O> {
        let mut furthest: Option<ParseError> = None;
        for parser in &parsers {
            match parser.parse(input, pos) {
                Ok(result) => return Ok(result),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    if furthest
                        .as_ref()
                        .is_none_or(|f| e.position > f.position)
                    {
                        furthest = Some(e);
                    }
                }
            }
        }
        match furthest {
            Some(e) if e.position > pos => Err(e),
            _ => Err(ParseError::new(ParseErrorKind::NoAlternative, pos)),
        }
    }
}

pub fn preceded<I, A, B>(first: impl Parser<I, A>, second: impl Parser<I, B>) -> impl Parser<I, B> {
    move |input: &[I], pos: usize| -> ParseResult<B> {
        let (pos, _) = first.parse(input, pos)?;
        second.parse(input, pos)
    }
}

pub fn delimited<I, O>(
    left: impl Parser<I, ()>,
    inner: impl Parser<I, O>,
    right: impl Parser<I, ()>,
) -> impl Parser<I, O> {
    move |input: &[I], pos: usize| -> ParseResult<O> {
        let (pos, _) = left.parse(input, pos)?;
        let (pos, value) = inner.parse(input, pos)?;
        let (pos, _) = right.parse(input, pos)?;
        Ok((pos, value))
    }
}

pub fn tuple2<I, A, B>(a: impl Parser<I, A>, b: impl Parser<I, B>) -> impl Parser<I, (A, B)> {
    move |input: &[I], pos: usize| -> ParseResult<(A, B)> {
        let (pos, first) = a.parse(input, pos)?;
        let (pos, second) = b.parse(input, pos)?;
        Ok((pos, (first, second)))
    }
}

pub fn tuple3<I, A, B, C>(
    a: impl Parser<I, A>,
    b: impl Parser<I, B>,
    c: impl Parser<I, C>,
) -> impl Parser<I, (A, B, C)> {
    move |input: &[I], pos: usize| -> ParseResult<(A, B, C)> {
        let (pos, first) = a.parse(input, pos)?;
        let (pos, second) = b.parse(input, pos)?;
        let (pos, third) = c.parse(input, pos)?;
        Ok((pos, (first, second, third)))
    }
}

pub fn map<I, A, B>(parser: impl Parser<I, A>, f: impl Fn(A) -> B) -> impl Parser<I, B> {
    move |input: &[I], pos: usize| -> ParseResult<B> {
        parser.parse(input, pos).map(|(pos, value)| (pos, f(value)))
    }
}

pub fn as_unit<I, O>(parser: impl Parser<I, O>) -> impl Parser<I, ()> {
    map(parser, |_| ())
}

/// Absent only when `parser` fails without consuming anything.
pub fn optional<I, O>(parser: impl Parser<I, O>) -> impl Parser<I, Option<O>> {
    move |input: &[I], pos: usize| -> ParseResult<Option<O>> {
        match parser.parse(input, pos) {
            Ok((next, value)) => Ok((next, Some(value))),
            Err(e) if e.committed(pos) => Err(e),
            Err(_) => Ok((pos, None)),
        }
    }
}

/// Zero or more; stops when an item fails where it started or consumes
/// nothing. An item that fails part way through is an error.
pub fn many<I, O>(parser: impl Parser<I, O>) -> impl Parser<I, Vec<O>> {
    move |input: &[I], mut pos: usize| -> ParseResult<Vec<O>> {
        let mut items = Vec::new();
        loop {
            match parser.parse(input, pos) {
                Ok((next, item)) if next > pos => {
                    items.push(item);
                    pos = next;
                }
                Err(e) if e.committed(pos) => return Err(e),
                _ => return Ok((pos, items)),
            }
        }
    }
}

/// Items until `end` matches; `end` is consumed. An item that fails before
/// `end` is found is an error, reported as the item's own error.
pub fn many_till<I, O>(item: impl Parser<I, O>, end: impl Parser<I, ()>) -> impl Parser<I, Vec<O>> {
    move |input: &[I], mut pos: usize| -> ParseResult<Vec<O>> {
        let mut items = Vec::new();
        loop {
            if let Ok((next, ())) = end.parse(input, pos) {
                return Ok((next, items));
            }
            let (next, value) = item.parse(input, pos)?;
            if next == pos {
                return Err(ParseError::new(ParseErrorKind::NoProgress, pos));
            }
            items.push(value);
            pos = next;
        }
    }
}

/// Possibly empty; a trailing separator is an error.
pub fn separated_list<I, O>(
    item: impl Parser<I, O>,
    separator: impl Parser<I, ()>,
) -> impl Parser<I, Vec<O>> {
    move |input: &[I], pos: usize| -> ParseResult<Vec<O>> {
        let (mut pos, first) = match item.parse(input, pos) {
            Ok(parsed) => parsed,
            Err(e) if e.committed(pos) => return Err(e),
            Err(_) => return Ok((pos, Vec::new())),
        };
        let mut items = vec![first];
        while let Ok((after_separator, ())) = separator.parse(input, pos) {
            let (next, value) = item.parse(input, after_separator)?;
            items.push(value);
            pos = next;
        }
        Ok((pos, items))
    }
}

/// Names the rule in the error's rule trail.
pub fn with_context<I, O>(parser: impl Parser<I, O>, context: &'static str) -> impl Parser<I, O> {
    move |input: &[I], pos: usize| -> ParseResult<O> {
        parser.parse(input, pos).map_err(|e| e.within(context))
    }
}

/// How many [`lazy`] rules may be active at once on one thread.
pub const MAX_NESTING: usize = 256;

thread_local! {
    static NESTING: Cell<usize> = const { Cell::new(0) };
}

struct NestingGuard;

impl NestingGuard {
    fn enter(pos: usize) -> Result<Self, ParseError> {
        let depth = NESTING.with(|nesting| {
            let depth = nesting.get() + 1;
            nesting.set(depth);
            depth
        });
        let guard = NestingGuard;
        if depth > MAX_NESTING {
            return Err(ParseError::new(
                ParseErrorKind::TooDeep { limit: MAX_NESTING },
                pos,
            ));
        }
        Ok(guard)
    }
}

impl Drop for NestingGuard {
    fn drop(&mut self) {
        NESTING.with(|nesting| nesting.set(nesting.get().saturating_sub(1)));
    }
}

pub struct Lazy<F>(F);

/// Builds the rule on every use. Every recursive rule goes through here,
/// so this is also where input nested past [`MAX_NESTING`] is refused.
pub fn lazy<F>(rule: F) -> Lazy<F> {
    Lazy(rule)
}

impl<I, O, F, P> Parser<I, O> for Lazy<F>
where
    F: Fn() -> P,
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        let _guard = NestingGuard::enter(pos)?;
        (self.0)().parse(input, pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal() {
        let input = vec![1, 2, 3];
        assert_eq!(equal(1).parse(&input, 0), Ok((1, 1)));
        let err = equal(1).parse(&input, 1).unwrap_err();
        assert_eq!(err.position, 1);
        assert!(matches!(err.kind, ParseErrorKind::Unexpected { .. }));
        let err = equal(1).parse(&input, 3).unwrap_err();
        assert_eq!(err.position, 3);
        assert!(matches!(err.kind, ParseErrorKind::EndOfInput { .. }));
    }

    #[test]
    fn test_satisfy() {
        let even = satisfy(|n: &i32| (n % 2 == 0).then_some(n / 2), "even number");
        assert_eq!(even.parse(&[8], 0), Ok((1, 4)));
        assert_eq!(
            even.parse(&[3], 0).unwrap_err().kind,
            ParseErrorKind::Unexpected {
                expected: "even number".to_string(),
                found: "3".to_string(),
            }
        );
    }

    #[test]
    fn test_choice_reports_furthest_error() {
        let input = vec![1, 2, 9];
        let parser = choice(vec![
            Box::new(map(tuple2(equal(1), equal(3)), |_| 0)),
            Box::new(map(tuple3(equal(1), equal(2), equal(3)), |_| 1)),
        ]);
        assert_eq!(parser.parse(&input, 0).unwrap_err().position, 2);

        let parser = choice::<i32, i32>(vec![Box::new(equal(5)), Box::new(equal(6))]);
        assert_eq!(
            parser.parse(&input, 0),
            Err(ParseError::new(ParseErrorKind::NoAlternative, 0))
        );
    }

    #[test]
    fn test_many_and_separated_list() {
        let input = vec![1, 0, 1, 0, 1, 7];
        assert_eq!(
            separated_list(equal(1), as_unit(equal(0))).parse(&input, 0),
            Ok((5, vec![1, 1, 1]))
        );
        assert_eq!(
            separated_list(equal(2), as_unit(equal(0))).parse(&input, 0),
            Ok((0, vec![]))
        );
        // trailing separator
        assert!(separated_list(equal(1), as_unit(equal(0))).parse(&[1, 0], 0).is_err());

        assert_eq!(many(equal(1)).parse(&[1, 1, 2], 0), Ok((2, vec![1, 1])));
    }

    #[test]
    fn test_many_till_reports_item_error() {
        let parser = many_till(equal(1), as_unit(equal(0)));
        assert_eq!(parser.parse(&[1, 1, 0, 5], 0), Ok((3, vec![1, 1])));
        let err = parser.parse(&[1, 2, 0], 0).unwrap_err();
        assert_eq!(err.position, 1);
        assert!(matches!(err.kind, ParseErrorKind::Unexpected { .. }));
        assert_eq!(many_till(equal(1), eof()).parse(&[1, 1], 0), Ok((2, vec![1, 1])));
    }

    #[test]
    fn test_delimited_and_optional() {
        let input = vec![0, 5, 9];
        let parser = delimited(as_unit(equal(0)), equal(5), as_unit(equal(9)));
        assert_eq!(parser.parse(&input, 0), Ok((3, 5)));
        assert_eq!(optional(equal(4)).parse(&input, 0), Ok((0, None)));
        assert_eq!(preceded(equal(0), equal(5)).parse(&input, 0), Ok((2, 5)));
    }

    fn pair() -> impl Parser<i32, (i32, i32)> {
        tuple2(equal(0), equal(1))
    }

    #[test]
    fn test_partial_item_is_an_error() {
        let (pos, pairs) = many(pair()).parse(&[0, 1, 0, 1, 2], 0).unwrap();
        assert_eq!((pos, pairs.len()), (4, 2));
        assert_eq!(many(pair()).parse(&[0, 1, 0, 2], 0).unwrap_err().position, 3);

        assert_eq!(optional(pair()).parse(&[2], 0), Ok((0, None)));
        assert_eq!(optional(pair()).parse(&[0, 2], 0).unwrap_err().position, 1);

        let list = separated_list(pair(), as_unit(equal(9)));
        assert_eq!(list.parse(&[0, 3], 0).unwrap_err().position, 1);
        assert_eq!(list.parse(&[3], 0), Ok((0, vec![])));
    }

    fn nested() -> impl Parser<i32, usize> {
        choice(vec![
            Box::new(map(preceded(equal(0), lazy(nested)), |depth| depth + 1)),
            Box::new(map(equal(1), |_| 0)),
        ])
    }

    #[test]
    fn test_nesting_limit() {
        let mut input = vec![0; 10];
        input.push(1);
        assert_eq!(lazy(nested).parse(&input, 0), Ok((11, 10)));

        let mut input = vec![0; MAX_NESTING * 2];
        input.push(1);
        let err = lazy(nested).parse(&input, 0).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::TooDeep { limit: MAX_NESTING });
        assert_eq!(err.position, MAX_NESTING);

        // the depth count unwinds with the failed parse
        let (_, depth) = lazy(nested).parse(&input[MAX_NESTING + 10..], 0).unwrap();
        assert_eq!(depth, MAX_NESTING - 10);
    }

    #[test]
    fn test_rule_trail() {
        let parser = with_context(with_context(equal(1), "inner"), "outer");
        let err = parser.parse(&[2], 0).unwrap_err();
        assert_eq!(err.rules, vec!["outer", "inner"]);
    }
}
