//! Content-stream tokenizer.
//!
//! Turns a decoded page content stream into a sequence of operators, each
//! tagged with the exact byte range it occupied in the stream. The patcher
//! (§4.H) needs those ranges to splice replacement `Tj`/`TJ` operands back in
//! without re-serializing operators it doesn't touch.

use crate::content::operators::{Operator, TextElement};
use crate::error::Result;
use crate::object::Object;
use crate::parser::parse_object;
use nom::bytes::complete::take_while1;
use nom::character::complete::multispace0;
use nom::IResult;
use std::ops::Range;

/// An operator together with the byte range (relative to the start of the
/// stream) it was parsed from, including its operands and trailing operator
/// keyword.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedOperator {
    /// The parsed operator.
    pub operator: Operator,
    /// `[range.start, range.end)` within the original stream bytes.
    pub range: Range<usize>,
}

/// Parse a full content stream into its operators.
///
/// Mirrors a PDF content-stream tokenizer's usual leniency: a token that
/// fails to parse is skipped one byte at a time rather than aborting the
/// whole stream, since malformed streams are common in the wild. Callers
/// that need the "leave the stream untouched on catastrophic failure"
/// guarantee (the patcher, §4.H) implement that by comparing how much of
/// `data` this function actually consumed into operators, not by treating
/// an `Err` here as the only failure signal.
pub fn parse_content_stream(data: &[u8]) -> Result<Vec<PositionedOperator>> {
    let mut operators = Vec::new();
    let mut input = data;

    while !input.is_empty() {
        let (rest, _) = multispace0::<_, nom::error::Error<&[u8]>>(input).unwrap_or((input, &[]));
        if rest.is_empty() {
            break;
        }
        let start = data.len() - rest.len();
        match parse_operator_with_operands(rest) {
            Ok((remaining, operator)) => {
                let end = data.len() - remaining.len();
                operators.push(PositionedOperator {
                    operator,
                    range: start..end,
                });
                input = remaining;
            },
            Err(_) => {
                input = &rest[1.min(rest.len())..];
            },
        }
    }

    Ok(operators)
}

fn parse_operator_with_operands(input: &[u8]) -> IResult<&[u8], Operator> {
    let mut operands = Vec::new();
    let mut remaining = input;

    loop {
        let (after_space, _) = multispace0(remaining)?;
        if after_space.is_empty() {
            return Err(nom::Err::Error(nom::error::Error::new(
                remaining,
                nom::error::ErrorKind::Eof,
            )));
        }

        if is_operator_start(after_space[0]) {
            let (after_name, name) = parse_operator_name(after_space)?;
            if name == "BI" {
                return parse_inline_image(after_name);
            }
            return Ok((after_name, build_operator(name, operands)));
        }

        let (after_object, object) = parse_object(after_space)
            .map_err(|_| nom::Err::Error(nom::error::Error::new(after_space, nom::error::ErrorKind::Fail)))?;
        operands.push(object);
        remaining = after_object;
    }
}

fn is_operator_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'\'' || byte == b'"' || byte == b'*'
}

fn parse_operator_name(input: &[u8]) -> IResult<&[u8], &str> {
    let (input, name_bytes) =
        take_while1(|c: u8| c.is_ascii_alphanumeric() || c == b'\'' || c == b'"' || c == b'*')(input)?;

    let name = std::str::from_utf8(name_bytes)
        .map_err(|_| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Char)))?;

    Ok((input, name))
}

/// Skip an inline image (`BI ... ID ... EI`). Its binary payload is opaque
/// to the span extractor and the patcher never rewrites it, so it is
/// dropped into `Operator::Other` with no operands rather than decoded.
fn parse_inline_image(input: &[u8]) -> IResult<&[u8], Operator> {
    let id_pos = find_subsequence(input, b"ID").ok_or_else(|| {
        nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Fail))
    })?;
    let after_id = &input[id_pos + 2..];
    let ei_pos = find_subsequence(after_id, b"EI").ok_or_else(|| {
        nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Fail))
    })?;
    let after_ei = &after_id[ei_pos + 2..];
    Ok((
        after_ei,
        Operator::Other {
            name: "BI".to_string(),
            operands: Vec::new(),
        },
    ))
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn build_operator(name: &str, operands: Vec<Object>) -> Operator {
    match name {
        "Td" => Operator::Td {
            tx: get_number(&operands, 0).unwrap_or(0.0),
            ty: get_number(&operands, 1).unwrap_or(0.0),
        },
        "TD" => Operator::TD {
            tx: get_number(&operands, 0).unwrap_or(0.0),
            ty: get_number(&operands, 1).unwrap_or(0.0),
        },
        "Tm" => Operator::Tm {
            a: get_number(&operands, 0).unwrap_or(1.0),
            b: get_number(&operands, 1).unwrap_or(0.0),
            c: get_number(&operands, 2).unwrap_or(0.0),
            d: get_number(&operands, 3).unwrap_or(1.0),
            e: get_number(&operands, 4).unwrap_or(0.0),
            f: get_number(&operands, 5).unwrap_or(0.0),
        },
        "T*" => Operator::TStar,

        "Tj" => Operator::Tj {
            text: get_string(&operands, 0).unwrap_or_default(),
        },
        "TJ" => {
            let array = if let Some(array) = get_array(&operands, 0) {
                array
                    .iter()
                    .filter_map(|obj| match obj {
                        Object::String(s) => Some(TextElement::String(s.clone())),
                        Object::Integer(i) => Some(TextElement::Offset(*i as f32)),
                        Object::Real(r) => Some(TextElement::Offset(*r as f32)),
                        _ => None,
                    })
                    .collect()
            } else {
                Vec::new()
            };
            Operator::TJ { array }
        },
        "'" => Operator::Quote {
            text: get_string(&operands, 0).unwrap_or_default(),
        },
        "\"" => Operator::DoubleQuote {
            word_space: get_number(&operands, 0).unwrap_or(0.0),
            char_space: get_number(&operands, 1).unwrap_or(0.0),
            text: get_string(&operands, 2).unwrap_or_default(),
        },

        "Tc" => Operator::Tc {
            char_space: get_number(&operands, 0).unwrap_or(0.0),
        },
        "Tw" => Operator::Tw {
            word_space: get_number(&operands, 0).unwrap_or(0.0),
        },
        "Tz" => Operator::Tz {
            scale: get_number(&operands, 0).unwrap_or(100.0),
        },
        "TL" => Operator::TL {
            leading: get_number(&operands, 0).unwrap_or(0.0),
        },
        "Tf" => Operator::Tf {
            font: get_name(&operands, 0).unwrap_or("").to_string(),
            size: get_number(&operands, 1).unwrap_or(12.0),
        },
        "Tr" => Operator::Tr {
            render: get_integer(&operands, 0).unwrap_or(0) as u8,
        },
        "Ts" => Operator::Ts {
            rise: get_number(&operands, 0).unwrap_or(0.0),
        },

        "BT" => Operator::BeginText,
        "ET" => Operator::EndText,
        "q" => Operator::SaveState,
        "Q" => Operator::RestoreState,
        "cm" => Operator::Cm {
            a: get_number(&operands, 0).unwrap_or(1.0),
            b: get_number(&operands, 1).unwrap_or(0.0),
            c: get_number(&operands, 2).unwrap_or(0.0),
            d: get_number(&operands, 3).unwrap_or(1.0),
            e: get_number(&operands, 4).unwrap_or(0.0),
            f: get_number(&operands, 5).unwrap_or(0.0),
        },

        "rg" => Operator::SetFillRgb {
            r: get_number(&operands, 0).unwrap_or(0.0),
            g: get_number(&operands, 1).unwrap_or(0.0),
            b: get_number(&operands, 2).unwrap_or(0.0),
        },
        "RG" => Operator::SetStrokeRgb {
            r: get_number(&operands, 0).unwrap_or(0.0),
            g: get_number(&operands, 1).unwrap_or(0.0),
            b: get_number(&operands, 2).unwrap_or(0.0),
        },
        "g" => Operator::SetFillGray {
            gray: get_number(&operands, 0).unwrap_or(0.0),
        },
        "G" => Operator::SetStrokeGray {
            gray: get_number(&operands, 0).unwrap_or(0.0),
        },
        "k" => Operator::SetFillCmyk {
            c: get_number(&operands, 0).unwrap_or(0.0),
            m: get_number(&operands, 1).unwrap_or(0.0),
            y: get_number(&operands, 2).unwrap_or(0.0),
            k: get_number(&operands, 3).unwrap_or(0.0),
        },
        "K" => Operator::SetStrokeCmyk {
            c: get_number(&operands, 0).unwrap_or(0.0),
            m: get_number(&operands, 1).unwrap_or(0.0),
            y: get_number(&operands, 2).unwrap_or(0.0),
            k: get_number(&operands, 3).unwrap_or(0.0),
        },
        "sc" | "scn" => Operator::SetFillColor {
            components: numeric_components(&operands),
        },
        "SC" | "SCN" => Operator::SetStrokeColor {
            components: numeric_components(&operands),
        },

        _ => Operator::Other {
            name: name.to_string(),
            operands,
        },
    }
}

fn numeric_components(operands: &[Object]) -> Vec<f32> {
    operands
        .iter()
        .filter_map(|obj| match obj {
            Object::Real(r) => Some(*r as f32),
            Object::Integer(i) => Some(*i as f32),
            _ => None,
        })
        .collect()
}

fn get_number(operands: &[Object], index: usize) -> Option<f32> {
    operands.get(index).and_then(|obj| match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    })
}

fn get_integer(operands: &[Object], index: usize) -> Option<i64> {
    operands.get(index).and_then(|obj| obj.as_integer())
}

fn get_string(operands: &[Object], index: usize) -> Option<Vec<u8>> {
    operands
        .get(index)
        .and_then(|obj| obj.as_string().map(|s| s.to_vec()))
}

fn get_name(operands: &[Object], index: usize) -> Option<&str> {
    operands.get(index).and_then(|obj| obj.as_name())
}

fn get_array(operands: &[Object], index: usize) -> Option<&Vec<Object>> {
    operands.get(index).and_then(|obj| obj.as_array())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_tj() {
        let data = b"BT /F1 12 Tf 100 700 Td (Hello) Tj ET";
        let ops = parse_content_stream(data).unwrap();
        let names: Vec<_> = ops.iter().map(|p| &p.operator).collect();
        assert!(matches!(names[0], Operator::BeginText));
        assert!(matches!(names[1], Operator::Tf { .. }));
        assert!(matches!(names[2], Operator::Td { .. }));
        assert!(matches!(names[3], Operator::Tj { .. }));
        assert!(matches!(names[4], Operator::EndText));
    }

    #[test]
    fn test_tj_byte_range_covers_operand_and_keyword() {
        let data = b"(Hello) Tj";
        let ops = parse_content_stream(data).unwrap();
        assert_eq!(ops.len(), 1);
        let range = ops[0].range.clone();
        assert_eq!(&data[range], &data[..]);
    }

    #[test]
    fn test_tj_array_elements() {
        let data = b"[(Hi) -250 (There)] TJ";
        let ops = parse_content_stream(data).unwrap();
        match &ops[0].operator {
            Operator::TJ { array } => {
                assert_eq!(array.len(), 3);
                assert_eq!(array[0], TextElement::String(b"Hi".to_vec()));
                assert_eq!(array[1], TextElement::Offset(-250.0));
                assert_eq!(array[2], TextElement::String(b"There".to_vec()));
            },
            other => panic!("expected TJ, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_operator_is_other() {
        let data = b"1 0 0 1 0 0 cm /GS1 gs";
        let ops = parse_content_stream(data).unwrap();
        assert!(matches!(ops[0].operator, Operator::Cm { .. }));
        match &ops[1].operator {
            Operator::Other { name, .. } => assert_eq!(name, "gs"),
            other => panic!("expected Other, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_token_is_skipped_not_fatal() {
        let data = b"(Hello) Tj \x01\x02 (World) Tj";
        let ops = parse_content_stream(data).unwrap();
        let tj_count = ops
            .iter()
            .filter(|p| matches!(p.operator, Operator::Tj { .. }))
            .count();
        assert_eq!(tj_count, 2);
    }

    #[test]
    fn test_inline_image_is_skipped_whole() {
        let data = b"BI /W 1 /H 1 /BPC 8 /CS /G ID \xff EI (After) Tj";
        let ops = parse_content_stream(data).unwrap();
        assert!(matches!(ops[0].operator, Operator::Other { .. }));
        assert!(matches!(ops[1].operator, Operator::Tj { .. }));
    }
}
