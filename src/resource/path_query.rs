//! Path queries over JSON values
//!
//! A small expression language for picking records out of list responses:
//!
//! - Field access: `databases`, `instance.state.name`
//! - Index: `[0]`, `[-1]`
//! - Filter projection: `databases[?name=='orders']`
//! - Pipe: `databases[?name=='orders']|[0]`
//!
//! Steps that follow a filter within the same pipe stage are applied to each
//! retained element, and null results are dropped. A pipe ends the
//! projection and evaluates the right-hand side against the whole result.
//!
//! Anything outside this grammar is rejected when the expression is parsed.

use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("unsupported expression '{expression}' at position {position}: {reason}")]
    UnsupportedExpression {
        expression: String,
        position: usize,
        reason: String,
    },
}

/// One step of a pipe stage
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    /// Object key lookup
    Field(String),
    /// Array element; negative values count from the end
    Index(i64),
    /// Keep array elements whose `field` is a string equal to `literal`
    Filter { field: Vec<String>, literal: String },
}

/// A parsed path query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathQuery {
    stages: Vec<Vec<Step>>,
}

impl PathQuery {
    pub fn parse(expression: &str) -> Result<Self, QueryError> {
        Parser::new(expression).parse()
    }

    /// Build `list_key[?field=='literal']|[0]` without going through text,
    /// so `literal` may contain any character.
    pub fn first_match(list_key: &str, field: &str, literal: &str) -> Result<Self, QueryError> {
        let field_path: Vec<String> = field.split('.').map(str::to_string).collect();
        for name in std::iter::once(list_key).chain(field_path.iter().map(String::as_str)) {
            if !is_identifier(name) {
                return Err(QueryError::UnsupportedExpression {
                    expression: format!("{list_key}[?{field}==...]"),
                    position: 0,
                    reason: format!("'{name}' is not a valid field name"),
                });
            }
        }

        Ok(Self {
            stages: vec![
                vec![
                    Step::Field(list_key.to_string()),
                    Step::Filter {
                        field: field_path,
                        literal: literal.to_string(),
                    },
                ],
                vec![Step::Index(0)],
            ],
        })
    }

    /// Evaluate against `root`; null means nothing matched
    pub fn search(&self, root: &Value) -> Value {
        let mut stages = self.stages.iter();
        let mut current = match stages.next() {
            Some(steps) => eval_steps(steps, root),
            None => return root.clone(),
        };
        for steps in stages {
            current = eval_steps(steps, &current);
        }
        current
    }
}

impl FromStr for PathQuery {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PathQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, steps) in self.stages.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            for (j, step) in steps.iter().enumerate() {
                match step {
                    Step::Field(name) if j == 0 => f.write_str(name)?,
                    Step::Field(name) => write!(f, ".{name}")?,
                    Step::Index(index) => write!(f, "[{index}]")?,
                    Step::Filter { field, literal } => {
                        write!(f, "[?{}=={}]", field.join("."), quote_literal(literal))?
                    }
                }
            }
        }
        Ok(())
    }
}

/// Evaluate `expression` over `tree`, returning `default` when nothing matches
pub fn evaluate(expression: &str, tree: &Value, default: Value) -> Result<Value, QueryError> {
    let result = PathQuery::parse(expression)?.search(tree);
    if result.is_null() {
        Ok(default)
    } else {
        Ok(result)
    }
}

/// Render `s` as a single-quoted literal, escaping quotes and backslashes
pub fn quote_literal(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('\'');
    for c in s.chars() {
        if c == '\'' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}

fn eval_steps(steps: &[Step], value: &Value) -> Value {
    let Some((step, rest)) = steps.split_first() else {
        return value.clone();
    };

    match (step, value) {
        (Step::Field(name), Value::Object(map)) => match map.get(name) {
            Some(child) => eval_steps(rest, child),
            None => Value::Null,
        },
        (Step::Index(index), Value::Array(arr)) => match resolve_index(*index, arr.len()) {
            Some(i) => eval_steps(rest, &arr[i]),
            None => Value::Null,
        },
        (Step::Filter { field, literal }, Value::Array(arr)) => {
            let matched = arr
                .iter()
                .filter(|element| filter_matches(element, field, literal));
            if rest.is_empty() {
                Value::Array(matched.cloned().collect())
            } else {
                Value::Array(
                    matched
                        .map(|element| eval_steps(rest, element))
                        .filter(|v| !v.is_null())
                        .collect(),
                )
            }
        }
        _ => Value::Null,
    }
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let resolved = if index < 0 { len + index } else { index };
    if (0..len).contains(&resolved) {
        usize::try_from(resolved).ok()
    } else {
        None
    }
}

fn filter_matches(element: &Value, field: &[String], literal: &str) -> bool {
    let mut current = element;
    for name in field {
        match current {
            Value::Object(map) => match map.get(name) {
                Some(child) => current = child,
                None => return false,
            },
            _ => return false,
        }
    }
    matches!(current, Value::String(s) if s == literal)
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(is_identifier_start) && chars.all(is_identifier_char)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn parse(mut self) -> Result<PathQuery, QueryError> {
        let mut stages = Vec::new();
        loop {
            stages.push(self.parse_stage()?);
            self.skip_whitespace();
            match self.peek() {
                None => break,
                Some('|') => self.bump(),
                Some(c) => return Err(self.error(format!("unexpected character '{c}'"))),
            }
        }
        Ok(PathQuery { stages })
    }

    fn parse_stage(&mut self) -> Result<Vec<Step>, QueryError> {
        let mut steps = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('[') => steps.push(self.parse_bracket()?),
                Some('.') if !steps.is_empty() => {
                    self.bump();
                    self.skip_whitespace();
                    steps.push(Step::Field(self.parse_identifier()?));
                }
                Some(c) if steps.is_empty() && is_identifier_start(c) => {
                    steps.push(Step::Field(self.parse_identifier()?));
                }
                _ => break,
            }
        }

        if steps.is_empty() {
            return Err(match self.peek() {
                Some(c) => self.error(format!("expected a field name or '[', found '{c}'")),
                None => self.error("expected a field name or '['".to_string()),
            });
        }
        Ok(steps)
    }

    fn parse_bracket(&mut self) -> Result<Step, QueryError> {
        self.expect('[')?;
        self.skip_whitespace();
        let step = match self.peek() {
            Some('?') => {
                self.bump();
                self.parse_filter()?
            }
            Some(c) if c == '-' || c.is_ascii_digit() => Step::Index(self.parse_index()?),
            Some(']') => return Err(self.error("flatten projections are not supported".to_string())),
            Some('*') => return Err(self.error("wildcards are not supported".to_string())),
            Some(c) => return Err(self.error(format!("unexpected character '{c}' in brackets"))),
            None => return Err(self.error("unterminated '['".to_string())),
        };
        self.skip_whitespace();
        self.expect(']')?;
        Ok(step)
    }

    fn parse_filter(&mut self) -> Result<Step, QueryError> {
        self.skip_whitespace();
        let mut field = vec![self.parse_identifier()?];
        while self.peek() == Some('.') {
            self.bump();
            field.push(self.parse_identifier()?);
        }

        self.skip_whitespace();
        if !self.rest().starts_with("==") {
            return Err(self.error("only '==' comparisons are supported".to_string()));
        }
        self.pos += 2;
        self.skip_whitespace();

        let literal = self.parse_literal()?;
        Ok(Step::Filter { field, literal })
    }

    fn parse_literal(&mut self) -> Result<String, QueryError> {
        if self.peek() != Some('\'') {
            return Err(self.error("expected a single-quoted literal".to_string()));
        }
        let start = self.pos;
        self.bump();

        let mut literal = String::new();
        loop {
            match self.peek() {
                Some('\'') => {
                    self.bump();
                    return Ok(literal);
                }
                Some('\\') => {
                    self.bump();
                    match self.peek() {
                        Some(c @ ('\'' | '\\')) => {
                            literal.push(c);
                            self.bump();
                        }
                        _ => literal.push('\\'),
                    }
                }
                Some(c) => {
                    literal.push(c);
                    self.bump();
                }
                None => {
                    self.pos = start;
                    return Err(self.error("unterminated literal".to_string()));
                }
            }
        }
    }

    fn parse_index(&mut self) -> Result<i64, QueryError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.bump();
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        let src = self.src;
        let text = &src[start..self.pos];
        match text.parse::<i64>() {
            Ok(index) => Ok(index),
            Err(_) => {
                self.pos = start;
                Err(self.error(format!("invalid index '{text}'")))
            }
        }
    }

    fn parse_identifier(&mut self) -> Result<String, QueryError> {
        let start = self.pos;
        match self.peek() {
            Some(c) if is_identifier_start(c) => self.bump(),
            Some('"') => return Err(self.error("quoted identifiers are not supported".to_string())),
            Some(c) => return Err(self.error(format!("expected a field name, found '{c}'"))),
            None => return Err(self.error("expected a field name".to_string())),
        }
        while self.peek().is_some_and(is_identifier_char) {
            self.bump();
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn expect(&mut self, expected: char) -> Result<(), QueryError> {
        match self.peek() {
            Some(c) if c == expected => {
                self.bump();
                Ok(())
            }
            Some(c) => Err(self.error(format!("expected '{expected}', found '{c}'"))),
            None => Err(self.error(format!("expected '{expected}'"))),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn rest(&self) -> &'a str {
        let src: &'a str = self.src;
        &src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn error(&self, reason: String) -> QueryError {
        QueryError::UnsupportedExpression {
            expression: self.src.to_string(),
            position: self.pos,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn databases() -> Value {
        json!({
            "databases": [
                {"name": "a", "state": "ACTIVE"},
                {"name": "b", "state": "ACTIVE"}
            ]
        })
    }

    #[test]
    fn test_filter_then_index() {
        let result = evaluate("databases[?name=='b']|[0]", &databases(), Value::Null).unwrap();
        assert_eq!(result, json!({"name": "b", "state": "ACTIVE"}));
    }

    #[test]
    fn test_no_match_returns_default() {
        let result = evaluate("databases[?name=='c']|[0]", &databases(), Value::Null).unwrap();
        assert_eq!(result, Value::Null);

        let result = evaluate("databases[?name=='c']|[0]", &databases(), json!("none")).unwrap();
        assert_eq!(result, json!("none"));
    }

    #[test]
    fn test_evaluation_is_repeatable() {
        let tree = databases();
        let query = PathQuery::parse("databases[?name=='a']|[0]").unwrap();

        let first = query.search(&tree);
        let second = query.search(&tree);
        assert_eq!(first, second);
        assert_eq!(first["name"], "a");
    }

    #[test]
    fn test_field_access() {
        let tree = json!({"instance": {"state": {"name": "running"}}});

        assert_eq!(
            evaluate("instance.state.name", &tree, Value::Null).unwrap(),
            json!("running")
        );
        assert_eq!(
            evaluate("instance.missing.name", &tree, Value::Null).unwrap(),
            Value::Null
        );
        assert_eq!(
            evaluate("instance.state.name.deeper", &tree, Value::Null).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_filter_skips_elements_without_field() {
        let tree = json!({
            "databases": [
                {"name": "a"},
                {"state": "ACTIVE"},
                "not-an-object",
                {"name": 7},
                {"name": "a", "state": "CREATING"}
            ]
        });

        let result = evaluate("databases[?name=='a']", &tree, Value::Null).unwrap();
        assert_eq!(
            result,
            json!([{"name": "a"}, {"name": "a", "state": "CREATING"}])
        );
    }

    #[test]
    fn test_filter_is_exact_string_match() {
        let tree = json!({"items": [{"id": "7"}, {"id": 7}, {"id": "07"}, {"id": "7 "}]});

        let result = evaluate("items[?id=='7']", &tree, Value::Null).unwrap();
        assert_eq!(result, json!([{"id": "7"}]));
    }

    #[test]
    fn test_filter_on_empty_array() {
        let tree = json!({"databases": []});

        assert_eq!(
            evaluate("databases[?name=='a']", &tree, Value::Null).unwrap(),
            json!([])
        );
        assert_eq!(
            evaluate("databases[?name=='a']|[0]", &tree, Value::Null).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_filter_on_non_array() {
        let tree = json!({"databases": {"name": "a"}});
        assert_eq!(
            evaluate("databases[?name=='a']", &tree, Value::Null).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_index() {
        let tree = json!({"items": ["x", "y", "z"]});

        assert_eq!(evaluate("items[0]", &tree, Value::Null).unwrap(), json!("x"));
        assert_eq!(evaluate("items[2]", &tree, Value::Null).unwrap(), json!("z"));
        assert_eq!(evaluate("items[-1]", &tree, Value::Null).unwrap(), json!("z"));
        assert_eq!(evaluate("items[3]", &tree, Value::Null).unwrap(), Value::Null);
        assert_eq!(evaluate("items[-4]", &tree, Value::Null).unwrap(), Value::Null);
        assert_eq!(evaluate("items|[1]", &tree, Value::Null).unwrap(), json!("y"));
    }

    #[test]
    fn test_index_on_empty_array_is_default() {
        let tree = json!([]);
        assert_eq!(evaluate("[0]", &tree, json!(false)).unwrap(), json!(false));
    }

    #[test]
    fn test_projection_after_filter() {
        let tree = json!({
            "databases": [
                {"name": "a", "state": "ACTIVE"},
                {"name": "b", "state": "CREATING"},
                {"name": "c", "state": "ACTIVE"},
                {"state": "ACTIVE"}
            ]
        });

        let names = evaluate("databases[?state=='ACTIVE'].name", &tree, Value::Null).unwrap();
        assert_eq!(names, json!(["a", "c"]));

        // Without a pipe the index is projected onto each element
        let projected = evaluate("databases[?state=='ACTIVE'][0]", &tree, Value::Null).unwrap();
        assert_eq!(projected, json!([]));

        let first = evaluate("databases[?state=='ACTIVE']|[0].name", &tree, Value::Null).unwrap();
        assert_eq!(first, json!("a"));
    }

    #[test]
    fn test_nested_filter_field() {
        let tree = json!({
            "instances": [
                {"id": "i-1", "datastore": {"type": "MySQL"}},
                {"id": "i-2", "datastore": {"type": "SQLServer"}}
            ]
        });

        let result =
            evaluate("instances[?datastore.type=='SQLServer']|[0].id", &tree, Value::Null).unwrap();
        assert_eq!(result, json!("i-2"));
    }

    #[test]
    fn test_whitespace_is_ignored() {
        let result = evaluate(" databases[? name == 'b' ] | [0] ", &databases(), Value::Null).unwrap();
        assert_eq!(result["name"], "b");
    }

    #[test]
    fn test_escaped_literal() {
        let tree = json!({"items": [{"name": "it's"}, {"name": "back\\slash"}]});

        let quote = evaluate(r"items[?name=='it\'s']|[0]", &tree, Value::Null).unwrap();
        assert_eq!(quote["name"], "it's");

        let backslash = evaluate(r"items[?name=='back\\slash']|[0]", &tree, Value::Null).unwrap();
        assert_eq!(backslash["name"], "back\\slash");
    }

    #[test]
    fn test_first_match_builder() {
        let query = PathQuery::first_match("databases", "name", "b").unwrap();
        assert_eq!(query.to_string(), "databases[?name=='b']|[0]");
        assert_eq!(query, PathQuery::parse("databases[?name=='b']|[0]").unwrap());
        assert_eq!(query.search(&databases())["name"], "b");
    }

    #[test]
    fn test_first_match_literal_with_quotes() {
        let name = r"o'brien\db";
        let tree = json!({"databases": [{"name": name}]});

        let query = PathQuery::first_match("databases", "name", name).unwrap();
        assert_eq!(query.search(&tree)["name"], name);

        let reparsed = PathQuery::parse(&query.to_string()).unwrap();
        assert_eq!(reparsed, query);
    }

    #[test]
    fn test_first_match_rejects_bad_field_names() {
        assert!(PathQuery::first_match("data-bases", "name", "a").is_err());
        assert!(PathQuery::first_match("databases", "", "a").is_err());
        assert!(PathQuery::first_match("databases", "a..b", "a").is_err());
    }

    #[test]
    fn test_unsupported_expressions() {
        let cases = [
            "",
            "   ",
            "databases[*]",
            "databases[]",
            "databases[?name!='a']",
            "databases[?name>'a']",
            "databases[?name=='a'",
            "databases[?name=='a]",
            "databases[?name==`\"a\"`]",
            "databases[0:2]",
            "length(databases)",
            "databases.*",
            "databases..name",
            "databases.",
            "databases|",
            "|databases",
            ".databases",
            "\"databases\"",
            "databases[-]",
            "databases name",
            "databases || other",
            "@.name",
        ];

        for expression in cases {
            let result = PathQuery::parse(expression);
            assert!(
                matches!(result, Err(QueryError::UnsupportedExpression { .. })),
                "expected '{}' to be rejected, got {:?}",
                expression,
                result
            );
        }
    }

    #[test]
    fn test_error_reports_position() {
        let err = PathQuery::parse("databases[?name!='a']").unwrap_err();
        let QueryError::UnsupportedExpression {
            expression,
            position,
            reason,
        } = err;
        assert_eq!(expression, "databases[?name!='a']");
        assert_eq!(position, 15);
        assert!(reason.contains("=="));
    }

    #[test]
    fn test_unsupported_is_error_not_default() {
        let result = evaluate("databases[*].name", &databases(), Value::Null);
        assert!(result.is_err());
    }
}
