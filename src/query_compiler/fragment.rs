//! Fragment tokenizer
//!
//! Splits raw query fragment text into plain SQL text, `?` parameter
//! markers, `{prop}.{prop}` property paths and `{*repository,Entity}`
//! junction tokens. Anything that does not parse as a token is kept as
//! literal text, so malformed braces fall through to the database
//! untouched instead of failing the compile.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till1},
    character::complete::{anychar, char},
    combinator::map,
    multi::separated_list1,
    sequence::{delimited, separated_pair},
    IResult, Parser,
};

/// One lexical piece of a query fragment.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FragmentPiece {
    /// Literal SQL text, passed through verbatim.
    Text(String),
    /// A `?` parameter marker, typed by the preceding property path.
    Marker,
    /// A `{a}.{b}.{c}` property path, one segment per braced token.
    Path(Vec<String>),
    /// A `{*repository,Entity}` junction membership token.
    Junction { repository: String, entity: String },
}

fn path_segment(input: &str) -> IResult<&str, String> {
    map(
        delimited(char('{'), take_till1(|c| c == '}'), char('}')),
        |segment: &str| segment.to_owned(),
    )
    .parse(input)
}

fn path_block(input: &str) -> IResult<&str, FragmentPiece> {
    map(separated_list1(char('.'), path_segment), FragmentPiece::Path).parse(input)
}

fn junction_block(input: &str) -> IResult<&str, FragmentPiece> {
    map(
        delimited(
            tag("{*"),
            separated_pair(
                take_till1(|c| c == ',' || c == '}'),
                char(','),
                take_till1(|c| c == '}'),
            ),
            char('}'),
        ),
        |(repository, entity): (&str, &str)| FragmentPiece::Junction {
            repository: repository.trim().to_owned(),
            entity: entity.trim().to_owned(),
        },
    )
    .parse(input)
}

fn marker(input: &str) -> IResult<&str, FragmentPiece> {
    map(char('?'), |_| FragmentPiece::Marker).parse(input)
}

fn plain_text(input: &str) -> IResult<&str, FragmentPiece> {
    map(take_till1(|c| c == '{' || c == '?'), |text: &str| {
        FragmentPiece::Text(text.to_owned())
    })
    .parse(input)
}

fn fallback_char(input: &str) -> IResult<&str, FragmentPiece> {
    map(anychar, |c| FragmentPiece::Text(c.to_string())).parse(input)
}

fn piece(input: &str) -> IResult<&str, FragmentPiece> {
    alt((junction_block, path_block, marker, plain_text, fallback_char)).parse(input)
}

fn push_piece(pieces: &mut Vec<FragmentPiece>, piece: FragmentPiece) {
    if let (Some(FragmentPiece::Text(last)), FragmentPiece::Text(text)) =
        (pieces.last_mut(), &piece)
    {
        last.push_str(text);
        return;
    }
    pieces.push(piece);
}

/// Tokenizes a fragment into pieces, never failing: unparseable input
/// degrades to literal text.
pub(crate) fn tokenize(input: &str) -> Vec<FragmentPiece> {
    let mut pieces = Vec::new();
    let mut rest = input;
    while !rest.is_empty() {
        match piece(rest) {
            Ok((tail, parsed)) => {
                push_piece(&mut pieces, parsed);
                rest = tail;
            }
            Err(_) => {
                push_piece(&mut pieces, FragmentPiece::Text(rest.to_owned()));
                break;
            }
        }
    }
    pieces
}

/// Renders path segments back to their `{a}.{b}` source form for messages.
pub(crate) fn render_path(segments: &[String]) -> String {
    segments
        .iter()
        .map(|segment| format!("{{{segment}}}"))
        .collect::<Vec<_>>()
        .join(".")
}
