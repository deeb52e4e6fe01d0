//! Shell-style splitting of command strings
//!
//! Follows POSIX shell word rules without expansion: whitespace separates
//! words, single quotes are literal, double quotes honour `\"`, `\\`, `\$`,
//! `` \` `` and line continuations, and an unquoted backslash escapes the
//! next character. Adjacent fragments (`foo'bar'"baz"`) form one word.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{is_not, take_while},
    character::complete::{anychar, char, multispace0},
    combinator::map,
    multi::{many0, many1},
    sequence::{delimited, preceded, terminated},
};

use crate::{ConfigError, Result};

fn single_quoted(input: &str) -> IResult<&str, String> {
    map(
        delimited(char('\''), take_while(|c| c != '\''), char('\'')),
        str::to_owned,
    )
    .parse(input)
}

fn double_quoted_escape(input: &str) -> IResult<&str, String> {
    map(preceded(char('\\'), anychar), |c| match c {
        '"' | '\\' | '$' | '`' => c.to_string(),
        '\n' => String::new(),
        other => format!("\\{}", other),
    })
    .parse(input)
}

fn double_quoted(input: &str) -> IResult<&str, String> {
    map(
        delimited(
            char('"'),
            many0(alt((map(is_not("\\\""), str::to_owned), double_quoted_escape))),
            char('"'),
        ),
        |parts| parts.concat(),
    )
    .parse(input)
}

fn escaped(input: &str) -> IResult<&str, String> {
    map(preceded(char('\\'), anychar), |c| match c {
        '\n' => String::new(),
        other => other.to_string(),
    })
    .parse(input)
}

fn bare(input: &str) -> IResult<&str, String> {
    map(is_not(" \t\r\n'\"\\"), str::to_owned).parse(input)
}

fn word(input: &str) -> IResult<&str, String> {
    map(
        many1(alt((single_quoted, double_quoted, escaped, bare))),
        |parts| parts.concat(),
    )
    .parse(input)
}

fn words(input: &str) -> IResult<&str, Vec<String>> {
    preceded(multispace0, many0(terminated(word, multispace0))).parse(input)
}

/// Split `input` into words the way a POSIX shell would (no expansion).
pub fn split(input: &str) -> Result<Vec<String>> {
    let (rest, parsed) = words(input).map_err(|e| tokenize_error(input, e.to_string()))?;

    match rest.chars().next() {
        None => Ok(parsed),
        Some('\'') => Err(tokenize_error(input, "unterminated single quote")),
        Some('"') => Err(tokenize_error(input, "unterminated double quote")),
        Some('\\') => Err(tokenize_error(input, "trailing backslash")),
        Some(_) => Err(tokenize_error(
            input,
            format!("unexpected input at '{}'", rest),
        )),
    }
}

/// Split `input` and require at least one word
pub fn split_non_empty(input: &str) -> Result<Vec<String>> {
    let argv = split(input)?;
    if argv.is_empty() {
        return Err(tokenize_error(input, "empty command"));
    }
    Ok(argv)
}

fn tokenize_error(input: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Tokenize {
        input: input.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(input: &str) -> Vec<String> {
        split(input).unwrap()
    }

    #[test]
    fn plain_words() {
        assert_eq!(words("sleep 10"), vec!["sleep", "10"]);
        assert_eq!(words("  ls\t-la   /tmp \n"), vec!["ls", "-la", "/tmp"]);
        assert!(words("").is_empty());
        assert!(words("   ").is_empty());
    }

    #[test]
    fn quoting() {
        assert_eq!(
            words(r#"sh -c 'echo "hi there"; exit 3'"#),
            vec!["sh", "-c", r#"echo "hi there"; exit 3"#]
        );
        assert_eq!(
            words(r#"echo "a \"quoted\" $HOME \n""#),
            vec!["echo", r#"a "quoted" $HOME \n"#]
        );
        assert_eq!(words("echo ''"), vec!["echo", ""]);
        assert_eq!(words(r#"a""b"#), vec!["ab"]);
    }

    #[test]
    fn adjacent_fragments_join() {
        assert_eq!(words(r#"--name='my app'"v2""#), vec!["--name=my appv2"]);
    }

    #[test]
    fn backslash_escapes() {
        assert_eq!(words(r"echo a\ b"), vec!["echo", "a b"]);
        assert_eq!(words(r"echo \'x\'"), vec!["echo", "'x'"]);
        assert_eq!(words("echo a\\\nb"), vec!["echo", "ab"]);
    }

    #[test]
    fn single_quotes_are_literal() {
        assert_eq!(words(r"echo 'a\b'"), vec!["echo", r"a\b"]);
    }

    #[test]
    fn errors() {
        for bad in ["echo 'oops", "echo \"oops", "echo oops\\"] {
            let err = split(bad).unwrap_err();
            assert!(matches!(err, ConfigError::Tokenize { .. }), "{}", bad);
        }
        assert!(split("echo 'oops").unwrap_err().to_string().contains("single quote"));
        assert!(split_non_empty("   ").is_err());
        assert_eq!(split_non_empty("true").unwrap(), vec!["true"]);
    }
}
