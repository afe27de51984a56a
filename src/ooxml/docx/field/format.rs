//! Rendering merge values through field switches.
//!
//! Switches apply in instruction order, each one to the output of the
//! previous one:
//!
//! - `\b` / `\f` wrap a non-empty result in literal text
//! - `\#` applies a numeric picture (`0.00`, `#,##0`, `##%`, `N2`, `P1`)
//! - `\@` applies a date-time picture (`d MMMM yyyy`, `HH:mm`, `'at' h am/pm`)
//! - `\*` changes text case (`Caps`, `FirstCap`, `Upper`, `Lower`)

use crate::ooxml::docx::field::instruction::Switch;
use crate::ooxml::docx::merge::value::Value;
use crate::ooxml::docx::warning::{Diagnostics, Warning};
use chrono::NaiveDateTime;

/// Render `value` through `switches`.
pub fn format_value(value: &Value, switches: &[Switch], diagnostics: &mut Diagnostics) -> String {
    let mut current = value.clone();

    for switch in switches {
        current = match switch {
            Switch::Before(text) => decorate(value, &current, |s| format!("{}{}", text, s)),
            Switch::After(text) => decorate(value, &current, |s| format!("{}{}", s, text)),
            Switch::Number(picture) => match format_number(&current, picture) {
                Ok(Some(text)) => Value::Text(text),
                Ok(None) => current,
                Err(()) => {
                    diagnostics.warn(Warning::InvalidNumberFormat {
                        pattern: picture.clone(),
                    });
                    current
                },
            },
            Switch::Date(picture) => match current.as_datetime() {
                Some(dt) if !picture.is_empty() => Value::Text(format_date(dt, picture, diagnostics)),
                _ => current,
            },
            Switch::Format(option) => match apply_case(&current.to_string(), option) {
                Some(text) => Value::Text(text),
                None => current,
            },
        };
    }

    current.to_string()
}

/// Wrap the rendered value, or render nothing when the merged value is
/// falsy or renders empty.
fn decorate(value: &Value, current: &Value, wrap: impl FnOnce(&str) -> String) -> Value {
    let rendered = current.to_string();
    if !value.is_truthy() || rendered.is_empty() {
        Value::Text(String::new())
    } else {
        Value::Text(wrap(&rendered))
    }
}

// ---- numbers -----------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum NumberCore {
    /// `N<d>`
    Fixed(usize),
    /// `P<d>`
    Percent(usize),
    /// `0`, `#`, grouping and decimal characters, optional trailing `%`
    Digits {
        decimals: usize,
        grouping: Option<char>,
        min_int_digits: usize,
        percent: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct NumberPicture<'a> {
    prefix: &'a str,
    core: NumberCore,
    suffix: &'a str,
}

const GROUPING_CHARS: [char; 3] = [',', '\'', '\u{a0}'];

fn is_digit_core_char(c: char) -> bool {
    matches!(c, '0' | '#' | '.') || GROUPING_CHARS.contains(&c)
}

/// Locate the numeric core of a picture; the text around it is literal.
fn parse_number_picture(picture: &str) -> Option<NumberPicture<'_>> {
    let chars: Vec<(usize, char)> = picture.char_indices().collect();
    let byte_at = |k: usize| chars.get(k).map_or(picture.len(), |&(i, _)| i);

    for (k, &(start, c)) in chars.iter().enumerate() {
        let next = chars.get(k + 1).map(|&(_, c)| c);

        if matches!(c, 'N' | 'P') && next.is_some_and(|n| n.is_ascii_digit()) {
            let end_k = k + 1 + chars[k + 1..].iter().take_while(|(_, c)| c.is_ascii_digit()).count();
            let places = picture[byte_at(k + 1)..byte_at(end_k)].parse().ok()?;
            let core = if c == 'N' {
                NumberCore::Fixed(places)
            } else {
                NumberCore::Percent(places)
            };
            return Some(NumberPicture {
                prefix: &picture[..start],
                core,
                suffix: &picture[byte_at(end_k)..],
            });
        }

        if matches!(c, '0' | '#') || (c == '.' && matches!(next, Some('0' | '#'))) {
            let mut end_k = k + chars[k..].iter().take_while(|(_, c)| is_digit_core_char(*c)).count();
            let body = &picture[start..byte_at(end_k)];
            let percent = chars.get(end_k).is_some_and(|&(_, c)| c == '%');
            if percent {
                end_k += 1;
            }

            let mut halves = body.split('.');
            let int_part = halves.next().unwrap_or_default();
            let frac_part = halves.next().unwrap_or_default();
            if halves.next().is_some() {
                return None;
            }

            let core = NumberCore::Digits {
                decimals: frac_part.chars().filter(|c| matches!(c, '0' | '#')).count(),
                grouping: int_part.chars().find(|c| GROUPING_CHARS.contains(c)),
                min_int_digits: int_part.chars().filter(|&c| c == '0').count().max(1),
                percent,
            };
            return Some(NumberPicture {
                prefix: &picture[..start],
                core,
                suffix: &picture[byte_at(end_k)..],
            });
        }
    }

    None
}

/// Apply a numeric picture.
///
/// `Ok(None)` means the value is not numeric and passes through unchanged;
/// `Err(())` means the picture itself is unusable.
fn format_number(value: &Value, picture: &str) -> Result<Option<String>, ()> {
    let parsed = parse_number_picture(picture).ok_or(())?;
    let Some(number) = value.as_number() else {
        return Ok(None);
    };

    let body = match parsed.core {
        NumberCore::Fixed(decimals) => format_number_text(number, decimals, None, 1),
        NumberCore::Percent(decimals) => {
            format!("{}%", format_number_text(number * 100.0, decimals, None, 1))
        },
        NumberCore::Digits {
            decimals,
            grouping,
            min_int_digits,
            percent,
        } => {
            if percent {
                format!(
                    "{}%",
                    format_number_text(number * 100.0, decimals, grouping, min_int_digits)
                )
            } else {
                format_number_text(number, decimals, grouping, min_int_digits)
            }
        },
    };

    Ok(Some(format!("{}{}{}", parsed.prefix, body, parsed.suffix)))
}

fn format_number_text(
    value: f64,
    decimals: usize,
    grouping: Option<char>,
    min_int_digits: usize,
) -> String {
    let core = format_abs_value(value.abs(), decimals, grouping, min_int_digits);
    let is_zero = core.chars().all(|c| !c.is_ascii_digit() || c == '0');
    let sign = if value.is_sign_negative() && !is_zero { "-" } else { "" };
    format!("{sign}{core}")
}

fn format_abs_value(
    abs_value: f64,
    decimals: usize,
    grouping: Option<char>,
    min_int_digits: usize,
) -> String {
    let formatted = format!("{:.*}", decimals, abs_value);
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((int_part, frac)) => (int_part, Some(frac)),
        None => (formatted.as_str(), None),
    };

    let padded = format!("{:0>width$}", int_part, width = min_int_digits);
    let int_text = match grouping {
        Some(separator) => insert_grouping(&padded, separator),
        None => padded,
    };

    match frac_part {
        Some(frac) if decimals > 0 => format!("{}.{}", int_text, frac),
        _ => int_text,
    }
}

fn insert_grouping(digits: &str, separator: char) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }
    let mut result = String::with_capacity(digits.len() + digits.len() / 3 * separator.len_utf8());
    let chars: Vec<char> = digits.chars().collect();
    for (idx, ch) in chars.iter().enumerate() {
        if idx > 0 && (chars.len() - idx).is_multiple_of(3) {
            result.push(separator);
        }
        result.push(*ch);
    }
    result
}

// ---- dates -------------------------------------------------------------

/// Picture tokens, longest first, with their chrono specifiers.
const DATE_TOKENS: &[(&str, &str)] = &[
    ("MMMM", "%B"),
    ("dddd", "%A"),
    ("DDDD", "%A"),
    ("yyyy", "%Y"),
    ("YYYY", "%Y"),
    ("MMM", "%b"),
    ("ddd", "%a"),
    ("DDD", "%a"),
    ("MM", "%m"),
    ("dd", "%d"),
    ("DD", "%d"),
    ("yy", "%y"),
    ("YY", "%y"),
    ("hh", "%I"),
    ("HH", "%H"),
    ("mm", "%M"),
    ("ss", "%S"),
    ("M", "%-m"),
    ("d", "%-d"),
    ("D", "%-d"),
    ("y", "%Y"),
    ("Y", "%Y"),
    ("h", "%-I"),
    ("H", "%-H"),
    ("m", "%-M"),
    ("s", "%-S"),
];

/// Translate a Word date-time picture into a chrono format string.
///
/// Returns the translation and whether the picture was well-formed.
fn translate_date_picture(picture: &str) -> (String, bool) {
    let mut spec = String::with_capacity(picture.len() * 2);
    let mut rest = picture;
    let mut well_formed = true;

    'outer: while let Some(c) = rest.chars().next() {
        if c == '\'' {
            let literal = &rest[1..];
            let (text, remainder) = match literal.find('\'') {
                Some(end) => (&literal[..end], &literal[end + 1..]),
                None => {
                    well_formed = false;
                    (literal, "")
                },
            };
            push_literal(&mut spec, text);
            rest = remainder;
            continue;
        }

        // any case is accepted; a lowercase `a` asks for lowercase output
        if rest.get(..5).is_some_and(|t| t.eq_ignore_ascii_case("am/pm")) {
            spec.push_str(if c == 'a' { "%P" } else { "%p" });
            rest = &rest[5..];
            continue;
        }

        for (token, specifier) in DATE_TOKENS {
            if let Some(remainder) = rest.strip_prefix(token) {
                spec.push_str(specifier);
                rest = remainder;
                continue 'outer;
            }
        }

        push_literal(&mut spec, &rest[..c.len_utf8()]);
        rest = &rest[c.len_utf8()..];
    }

    (spec, well_formed)
}

fn push_literal(spec: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '%' => spec.push_str("%%"),
            _ => spec.push(c),
        }
    }
}

fn format_date(dt: NaiveDateTime, picture: &str, diagnostics: &mut Diagnostics) -> String {
    let (spec, well_formed) = translate_date_picture(picture);
    if !well_formed {
        diagnostics.warn(Warning::InvalidDateFormat {
            pattern: picture.to_string(),
        });
    }
    dt.format(&spec).to_string()
}

// ---- text case --------------------------------------------------------

/// Apply a `\*` option. `None` leaves the value untouched.
fn apply_case(text: &str, option: &str) -> Option<String> {
    if option.eq_ignore_ascii_case("Caps") {
        let mut out = String::with_capacity(text.len());
        let mut at_word_start = true;
        for c in text.chars() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = c.is_whitespace();
        }
        Some(out)
    } else if option.eq_ignore_ascii_case("FirstCap") {
        let mut chars = text.chars();
        Some(match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        })
    } else if option.eq_ignore_ascii_case("Upper") {
        Some(text.to_uppercase())
    } else if option.eq_ignore_ascii_case("Lower") {
        Some(text.to_lowercase())
    } else {
        // MERGEFORMAT, CHARFORMAT and unknown options
        None
    }
}
