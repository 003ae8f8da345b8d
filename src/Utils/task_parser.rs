//! Task documents: section titles on their own line, each followed by `key: v1, v2` entries.
//! Keys listed in a template but missing from the document end up as `key: None`.
//! Lines starting with //, #, % or ; are comments.
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{alpha1, alphanumeric1, multispace0, space0},
    combinator::{map, recognize},
    multi::{many0, many1, separated_list0},
    sequence::{delimited, pair, preceded, separated_pair, terminated},
};
use std::collections::HashMap;
use std::fmt::Display;

pub type DocumentMap = HashMap<String, SectionMap>;
pub type SectionMap = HashMap<String, Option<Vec<Value>>>;
/// enum to represent different value types:
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Float(f64),
    Integer(i64),
    Boolean(bool),
}

impl Value {
    /// integers are accepted too: "eps: 1" is a valid float setting
    pub fn as_float(&self) -> Option<f64> {
        match *self {
            Value::Float(f) => Some(f),
            Value::Integer(i) => Some(i as f64),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match *self {
            Value::Integer(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        self.as_integer().and_then(|i| usize::try_from(i).ok())
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match *self {
            Value::Boolean(b) => Some(b),
            _ => None,
        }
    }

    /// integer, then float, then boolean; anything else (paths, method names) stays text
    fn classify(token: &str) -> Value {
        token
            .parse::<i64>()
            .map(Value::Integer)
            .or_else(|_| token.parse::<f64>().map(Value::Float))
            .or_else(|_| token.parse::<bool>().map(Value::Boolean))
            .unwrap_or_else(|_| Value::String(token.to_string()))
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Float(val) => write!(f, "{}", val),
            Value::Integer(val) => write!(f, "{}", val),
            Value::Boolean(val) => write!(f, "{}", val),
        }
    }
}

const COMMENT_MARKERS: [&str; 4] = ["//", "#", "%", ";"];

/// section titles and keys: a letter or underscore, then letters, digits, underscores
fn identifier(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(
            alt((alpha1, tag("_"))),
            many0(alt((alphanumeric1, tag("_")))),
        )),
        String::from,
    )
    .parse(input)
}

fn parse_title(input: &str) -> IResult<&str, String> {
    let (rest, title) = identifier(input)?;
    Ok((rest.trim(), title))
}

// a value token runs up to a comma, blank, line end or semicolon
fn parse_value(input: &str) -> IResult<&str, Value> {
    map(
        take_while1(|c: char| !matches!(c, ',' | ' ' | '\t' | '\n' | '\r' | ';')),
        |token: &str| Value::classify(token.trim()),
    )
    .parse(input)
}

fn parse_value_list(input: &str) -> IResult<&str, Vec<Value>> {
    preceded(
        space0,
        separated_list0(delimited(space0, tag(","), space0), parse_value),
    )
    .parse(input)
}

/// `key: v1, v2, ...`
fn parse_entry(input: &str) -> IResult<&str, (String, Vec<Value>)> {
    let (rest, entry) = separated_pair(
        identifier,
        delimited(space0, tag(":"), space0),
        parse_value_list,
    )
    .parse(input)?;
    Ok((rest.trim(), entry))
}

/// a title followed by at least one entry
fn parse_section(input: &str) -> IResult<&str, (String, SectionMap)> {
    let (rest, title) = preceded(space0, parse_title).parse(input)?;
    let (rest, _) = multispace0(rest)?;
    let (rest, entries) = many1(terminated(parse_entry, space0)).parse(rest)?;
    let section: SectionMap = entries
        .into_iter()
        .map(|(key, values)| (key, Some(values)))
        .collect();
    Ok((rest, (title, section)))
}

fn filter_comments(input: &str) -> String {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !COMMENT_MARKERS.iter().any(|m| line.starts_with(*m)))
        .collect::<Vec<&str>>()
        .join("\n")
}

/// Parses a comment free document into its sections.
pub fn parse_document(input: &str) -> IResult<&str, DocumentMap> {
    map(
        many1(delimited(space0, parse_section, multispace0)),
        |sections: Vec<(String, SectionMap)>| sections.into_iter().collect::<DocumentMap>(),
    )
    .parse(input)
}

/// Strips comments, parses the document and, when a template is given, adds every
/// template section and key that the document does not mention (keys as None).
pub fn parse_document_as(input: &str, template: Option<&DocumentMap>) -> Result<DocumentMap, String> {
    let filtered = filter_comments(input);
    let mut parsed = match parse_document(&filtered) {
        Ok((remaining, parsed)) => {
            if !remaining.trim().is_empty() {
                return Err(format!(
                    "Failed to parse entire document. Remaining: '{}'",
                    remaining
                ));
            }
            parsed
        }
        Err(e) => return Err(format!("Parsing error: {:?}", e)),
    };
    if let Some(template) = template {
        for (title, keys_map) in template {
            let section_map = parsed.entry(title.clone()).or_default();
            for key in keys_map.keys() {
                section_map.entry(key.clone()).or_insert(None);
            }
        }
    }
    Ok(parsed)
}

/// template with the given sections and keys, every key set to None
pub fn template_from(sections: &[(&str, &[&str])]) -> DocumentMap {
    sections.iter()
        .map(|(title, keys)| {
            let section: SectionMap = keys.iter().map(|k| (k.to_string(), None)).collect();
            (title.to_string(), section)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_title_and_key() {
        let (remaining, title) = parse_title("title1\n key1: value1").unwrap();
        assert_eq!(title, "title1");
        assert_eq!(remaining, "key1: value1");

        let (remaining, key) = identifier("key_with_underscore: value1").unwrap();
        assert_eq!(key, "key_with_underscore");
        assert_eq!(remaining, ": value1");
    }

    #[test]
    fn test_parse_value() {
        let (remaining, value) = parse_value("data/a.txt, value2").unwrap();
        assert_eq!(value, Value::String("data/a.txt".to_string()));
        assert_eq!(remaining, ", value2");

        let (_, value) = parse_value("100\n").unwrap();
        assert_eq!(value, Value::Integer(100));

        let (_, value) = parse_value("1e-8").unwrap();
        assert_eq!(value, Value::Float(1e-8));

        let (_, value) = parse_value("true").unwrap();
        assert_eq!(value, Value::Boolean(true));
    }

    #[test]
    fn test_parse_value_list() {
        let (remaining, values) = parse_value_list("1, 2.5 ,x").unwrap();
        assert_eq!(
            values,
            vec![
                Value::Integer(1),
                Value::Float(2.5),
                Value::String("x".to_string())
            ]
        );
        assert_eq!(remaining, "");
    }

    #[test]
    fn test_parse_document_with_comments() {
        let input = "# solver settings\nsolver\n method: cg\n pivot_tolerance: 1e-15\n\n// paths\nfiles\n matrix: a.txt\n vector: b.txt\n";
        let doc = parse_document_as(input, None).unwrap();
        assert_eq!(doc.len(), 2);
        let solver = &doc["solver"];
        assert_eq!(
            solver["method"],
            Some(vec![Value::String("cg".to_string())])
        );
        assert_eq!(solver["pivot_tolerance"].as_ref().unwrap()[0].as_float(), Some(1e-15));
        assert_eq!(
            doc["files"]["vector"].as_ref().unwrap()[0].to_string(),
            "b.txt"
        );
    }

    #[test]
    fn test_template_fills_missing_keys() {
        let solver_keys: &[&str] = &["method", "pivot_tolerance"];
        let cg_keys: &[&str] = &["eps"];
        let template = template_from(&[("solver", solver_keys), ("cg", cg_keys)]);
        let doc = parse_document_as("solver\n method: gauss\n", Some(&template)).unwrap();
        assert_eq!(doc["solver"]["pivot_tolerance"], None);
        assert!(doc["cg"].contains_key("eps"));
        assert_eq!(doc["cg"]["eps"], None);
    }

    #[test]
    fn test_malformed_document() {
        assert!(parse_document_as("solver\n", None).is_err());
        assert!(parse_document_as("", None).is_err());
        assert!(parse_document_as("solver\n method: cg\n 12: x\n", None).is_err());
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::Integer(3).as_float(), Some(3.0));
        assert_eq!(Value::Integer(-3).as_usize(), None);
        assert_eq!(Value::Integer(4).as_usize(), Some(4));
        assert_eq!(Value::Float(0.5).as_integer(), None);
        assert_eq!(Value::Boolean(false).as_boolean(), Some(false));
        assert_eq!(Value::Float(0.5).to_string(), "0.5");
        assert_eq!(Value::classify("-7"), Value::Integer(-7));
        assert_eq!(Value::classify("data/A.txt").to_string(), "data/A.txt");
    }
}
