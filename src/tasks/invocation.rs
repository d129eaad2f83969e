//! Parsing of task invocations.
//!
//! An invocation is written `name[:arg,arg,key=value]`. A backslash escapes
//! the next character, so `\,`, `\=` and `\:` are literal.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;

use crate::error::{ConfigError, Result, StackfabError};

/// A parsed task invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskInvocation {
    /// Task name.
    pub name: String,
    /// Positional arguments.
    pub args: Vec<String>,
    /// Keyword arguments, in the order given.
    pub kwargs: IndexMap<String, String>,
}

impl TaskInvocation {
    /// Creates an invocation without arguments.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parses `name[:arg,key=value,...]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty, a keyword has no key, or the
    /// input ends in a dangling escape.
    pub fn parse(input: &str) -> Result<Self> {
        let mut parts = split_unescaped(input, ':', 2)?.into_iter();
        let name = unescape(&parts.next().unwrap_or_default());
        let rest = parts.next();

        if name.is_empty() {
            return Err(ConfigError::task_args(input, "empty task name").into());
        }

        let mut invocation = Self::new(name.clone());
        let Some(rest) = rest else {
            return Ok(invocation);
        };

        for raw in split_unescaped(&rest, ',', usize::MAX)? {
            if raw.is_empty() {
                continue;
            }
            match split_unescaped(&raw, '=', 2)?.as_slice() {
                [value] => invocation.args.push(unescape(value)),
                [key, value] => {
                    let key = unescape(key);
                    if key.is_empty() {
                        return Err(ConfigError::task_args(&name, "keyword argument without a key").into());
                    }
                    invocation.kwargs.insert(key, unescape(value));
                }
                _ => {}
            }
        }

        Ok(invocation)
    }

    /// Fails if any argument was given.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidTaskArgs` if arguments are present.
    pub fn expect_no_args(&self) -> Result<()> {
        if self.args.is_empty() && self.kwargs.is_empty() {
            Ok(())
        } else {
            Err(self.invalid("takes no arguments"))
        }
    }

    /// Returns the keyword arguments; positional ones are rejected.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidTaskArgs` if positional arguments are
    /// present.
    pub fn expect_kwargs(&self) -> Result<&IndexMap<String, String>> {
        if self.args.is_empty() {
            Ok(&self.kwargs)
        } else {
            Err(self.invalid("takes only key=value arguments"))
        }
    }

    /// Returns the single optional positional argument.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidTaskArgs` on keyword arguments or more
    /// than one positional argument.
    pub fn optional_arg(&self) -> Result<Option<&str>> {
        if !self.kwargs.is_empty() || self.args.len() > 1 {
            return Err(self.invalid("takes at most one argument"));
        }
        Ok(self.args.first().map(String::as_str))
    }

    /// Returns the single required positional argument, or the keyword
    /// argument named `key`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidTaskArgs` if the argument is missing or
    /// others are present.
    pub fn required_arg(&self, key: &str) -> Result<&str> {
        match (self.args.as_slice(), self.kwargs.len()) {
            ([value], 0) => Ok(value.as_str()),
            ([], 1) => self
                .kwargs
                .get(key)
                .map(String::as_str)
                .ok_or_else(|| self.invalid(&format!("expects {key}"))),
            _ => Err(self.invalid(&format!("expects exactly one argument: {key}"))),
        }
    }

    /// Returns two required arguments, given positionally or by keyword.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidTaskArgs` if either is missing.
    pub fn required_pair(&self, first: &str, second: &str) -> Result<(&str, &str)> {
        match self.args.as_slice() {
            [a, b] if self.kwargs.is_empty() => Ok((a.as_str(), b.as_str())),
            [] => match (self.kwargs.get(first), self.kwargs.get(second)) {
                (Some(a), Some(b)) if self.kwargs.len() == 2 => Ok((a.as_str(), b.as_str())),
                _ => Err(self.invalid(&format!("expects {first} and {second}"))),
            },
            _ => Err(self.invalid(&format!("expects {first} and {second}"))),
        }
    }

    fn invalid(&self, message: &str) -> StackfabError {
        ConfigError::task_args(&self.name, message).into()
    }
}

impl FromStr for TaskInvocation {
    type Err = StackfabError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for TaskInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if self.args.is_empty() && self.kwargs.is_empty() {
            return Ok(());
        }
        let parts: Vec<String> = self
            .args
            .iter()
            .cloned()
            .chain(self.kwargs.iter().map(|(k, v)| format!("{k}={v}")))
            .collect();
        write!(f, ":{}", parts.join(","))
    }
}

/// Splits on unescaped `sep` into at most `limit` parts, keeping escapes.
fn split_unescaped(input: &str, sep: char, limit: usize) -> Result<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            let Some(next) = chars.next() else {
                return Err(ConfigError::task_args(input, "dangling escape").into());
            };
            current.push('\\');
            current.push(next);
        } else if c == sep && parts.len() + 1 < limit {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }

    parts.push(current);
    Ok(parts)
}

fn unescape(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                output.push(next);
            }
        } else {
            output.push(c);
        }
    }
    output
}
