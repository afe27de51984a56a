/// Field instruction parsing.
///
/// Splits an instruction such as `MERGEFIELD "Last Name" \* Upper \b "Dear "`
/// into words the way Word does: whitespace separates words, double quotes
/// group them, and a backslash inside quotes escapes `"` and `\`.
use crate::ooxml::docx::warning::{Diagnostics, Warning};
use smallvec::SmallVec;
use thiserror::Error;

/// Kind of a field, decided by the first word of its instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// `MERGEFIELD name [switches]`
    MergeField,
    /// `NEXT`: move on to the next record
    Next,
    /// `IF expr "a" "b"`: kept as it is
    If,
    /// Any other field (`PAGE`, `DATE`, `REF`, ...); never touched
    Unsupported,
}

/// A formatting switch of a MERGEFIELD, in instruction order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Switch {
    /// `\b text`: text inserted before a non-empty result
    Before(String),
    /// `\f text`: text inserted after a non-empty result
    After(String),
    /// `\# picture`: numeric picture
    Number(String),
    /// `\@ picture`: date-time picture
    Date(String),
    /// `\* option`: text case or `MERGEFORMAT`
    Format(String),
}

/// One word of an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    /// The word began with an unquoted backslash
    pub is_switch: bool,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("unterminated quote")]
    UnterminatedQuote,
}

/// Split an instruction into words.
pub fn tokenize(input: &str) -> Result<SmallVec<[Token; 8]>, TokenizeError> {
    if memchr::memchr(b'"', input.as_bytes()).is_none() {
        return Ok(input
            .split_whitespace()
            .map(|word| Token {
                text: word.to_string(),
                is_switch: word.starts_with('\\'),
            })
            .collect());
    }

    let mut tokens = SmallVec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut in_quotes = false;
    let mut is_switch = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '\\' if matches!(chars.peek(), Some('"') | Some('\\')) => {
                    if let Some(escaped) = chars.next() {
                        current.push(escaped);
                    }
                },
                '"' => in_quotes = false,
                _ => current.push(c),
            }
        } else if c.is_whitespace() {
            if in_token {
                tokens.push(Token {
                    text: std::mem::take(&mut current),
                    is_switch,
                });
                in_token = false;
            }
        } else {
            if !in_token {
                in_token = true;
                is_switch = c == '\\';
            }
            if c == '"' {
                in_quotes = true;
            } else {
                current.push(c);
            }
        }
    }

    if in_quotes {
        return Err(TokenizeError::UnterminatedQuote);
    }
    if in_token {
        tokens.push(Token {
            text: current,
            is_switch,
        });
    }
    Ok(tokens)
}

/// A classified field instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub kind: FieldKind,
    /// Field name for MERGEFIELD instructions
    pub name: Option<String>,
    pub switches: SmallVec<[Switch; 2]>,
}

impl Instruction {
    /// Classify an instruction. Malformed quoting falls back to a plain
    /// whitespace split that keeps only the keyword and the field name.
    pub fn parse(text: &str, diagnostics: &mut Diagnostics) -> Self {
        let tokens = match tokenize(text) {
            Ok(tokens) => tokens,
            Err(e) => {
                diagnostics.warn(Warning::MalformedInstruction {
                    instruction: text.to_string(),
                    reason: e.to_string(),
                });
                return Self::parse_permissive(text);
            },
        };

        let kind = match tokens.first() {
            Some(keyword) => kind_of(&keyword.text),
            None => FieldKind::Unsupported,
        };
        if kind != FieldKind::MergeField {
            return Self {
                kind,
                name: None,
                switches: SmallVec::new(),
            };
        }

        let mut rest = tokens[1..].iter().peekable();
        let name = rest.next_if(|t| !t.is_switch).map(|t| t.text.clone());

        let mut switches = SmallVec::new();
        while let Some(token) = rest.next() {
            if !token.is_switch {
                diagnostics.warn(Warning::UnknownSwitch {
                    switch: token.text.clone(),
                    instruction: text.to_string(),
                });
                continue;
            }

            let mut flag = token.text.chars().skip(1);
            let letter = flag.next().map(|c| c.to_ascii_lowercase());
            let attached: String = flag.collect();

            // \m and \v take no argument and do not affect the result
            if matches!(letter, Some('m') | Some('v')) {
                continue;
            }
            if !matches!(letter, Some('b' | 'f' | '#' | '@' | '*')) {
                diagnostics.warn(Warning::UnknownSwitch {
                    switch: token.text.clone(),
                    instruction: text.to_string(),
                });
                continue;
            }

            let argument = if attached.is_empty() {
                rest.next_if(|t| !t.is_switch).map(|t| t.text.clone())
            } else {
                Some(attached)
            };
            let Some(argument) = argument else {
                diagnostics.warn(Warning::MissingSwitchArgument {
                    switch: token.text.clone(),
                    instruction: text.to_string(),
                });
                continue;
            };

            switches.push(match letter {
                Some('b') => Switch::Before(argument),
                Some('f') => Switch::After(argument),
                Some('#') => Switch::Number(argument),
                Some('@') => Switch::Date(argument),
                _ => Switch::Format(argument),
            });
        }

        Self {
            kind,
            name,
            switches,
        }
    }

    fn parse_permissive(text: &str) -> Self {
        let mut words = text.split_whitespace();
        let kind = words.next().map_or(FieldKind::Unsupported, kind_of);
        let name = match kind {
            FieldKind::MergeField => words
                .next()
                .map(|w| w.trim_matches('"').to_string())
                .filter(|w| !w.is_empty()),
            _ => None,
        };
        Self {
            kind,
            name,
            switches: SmallVec::new(),
        }
    }

    /// Field name of a MERGEFIELD instruction.
    #[inline]
    pub fn merge_field_name(&self) -> Option<&str> {
        match self.kind {
            FieldKind::MergeField => self.name.as_deref(),
            _ => None,
        }
    }
}

fn kind_of(keyword: &str) -> FieldKind {
    if keyword.eq_ignore_ascii_case("MERGEFIELD") {
        FieldKind::MergeField
    } else if keyword.eq_ignore_ascii_case("NEXT") {
        FieldKind::Next
    } else if keyword.eq_ignore_ascii_case("IF") {
        FieldKind::If
    } else {
        FieldKind::Unsupported
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn words(input: &str) -> Vec<String> {
        tokenize(input).unwrap().into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn test_tokenize_quotes() {
        assert_eq!(words(r#" MERGEFIELD  name  "#), vec!["MERGEFIELD", "name"]);
        assert_eq!(
            words(r#"MERGEFIELD "First Name" \b "Dear ""#),
            vec!["MERGEFIELD", "First Name", r"\b", "Dear "]
        );
        assert_eq!(words(r#"a"b c"d"#), vec!["ab cd"]);
        assert_eq!(words(r#""say \"hi\" \\ now""#), vec![r#"say "hi" \ now"#]);
        assert_eq!(words(r#"path\to"#), vec![r"path\to"]);
        assert_eq!(tokenize(r#"MERGEFIELD "open"#), Err(TokenizeError::UnterminatedQuote));
    }

    #[test]
    fn test_switch_flag() {
        let tokens = tokenize(r#"\@"dd" "\b" x"#).unwrap();
        assert!(tokens[0].is_switch);
        assert_eq!(tokens[0].text, r"\@dd");
        assert!(!tokens[1].is_switch);
        assert!(!tokens[2].is_switch);
    }

    #[test]
    fn test_parse_merge_field() {
        let mut diag = Diagnostics::new();
        let instr = Instruction::parse(
            r#" mergefield "Last Name" \* Upper \b "(" \f ")" \# "0.00" \@ "d MMM" \m "#,
            &mut diag,
        );
        assert_eq!(instr.kind, FieldKind::MergeField);
        assert_eq!(instr.merge_field_name(), Some("Last Name"));
        assert_eq!(
            instr.switches.to_vec(),
            vec![
                Switch::Format("Upper".into()),
                Switch::Before("(".into()),
                Switch::After(")".into()),
                Switch::Number("0.00".into()),
                Switch::Date("d MMM".into()),
            ]
        );
        assert!(diag.is_empty());
    }

    #[test]
    fn test_parse_kinds() {
        let mut diag = Diagnostics::new();
        assert_eq!(Instruction::parse(" NEXT ", &mut diag).kind, FieldKind::Next);
        assert_eq!(Instruction::parse(r#"IF a = b "x" "y""#, &mut diag).kind, FieldKind::If);
        assert_eq!(Instruction::parse(" PAGE ", &mut diag).kind, FieldKind::Unsupported);
        assert_eq!(Instruction::parse("   ", &mut diag).kind, FieldKind::Unsupported);
        assert_eq!(Instruction::parse(" PAGE ", &mut diag).merge_field_name(), None);
        assert!(diag.is_empty());
    }

    #[test]
    fn test_malformed_falls_back() {
        let mut diag = Diagnostics::new();
        let instr = Instruction::parse(r#"MERGEFIELD foo \b "(" \f""#, &mut diag);
        assert_eq!(instr.merge_field_name(), Some("foo"));
        assert!(instr.switches.is_empty());
        assert!(matches!(diag.warnings(), [Warning::MalformedInstruction { .. }]));
    }

    #[test]
    fn test_switch_problems_warn() {
        let mut diag = Diagnostics::new();
        let instr = Instruction::parse(r#"MERGEFIELD foo \x \b"#, &mut diag);
        assert!(instr.switches.is_empty());
        assert!(matches!(
            diag.warnings(),
            [Warning::UnknownSwitch { .. }, Warning::MissingSwitchArgument { .. }]
        ));
    }

    proptest! {
        #[test]
        fn tokenize_never_panics(input in "\\PC*") {
            let _ = tokenize(&input);
        }

        #[test]
        fn plain_words_split_on_whitespace(parts in prop::collection::vec("[A-Za-z0-9_]{1,8}", 1..6)) {
            let input = parts.join("  ");
            prop_assert_eq!(words(&input), parts);
        }

        #[test]
        fn quoted_words_keep_spaces(inner in "[A-Za-z ]{0,12}") {
            let input = format!("MERGEFIELD \"{}\"", inner);
            let tokens = tokenize(&input).unwrap();
            prop_assert_eq!(tokens.len(), 2);
            prop_assert_eq!(&tokens[1].text, &inner);
        }
    }
}
