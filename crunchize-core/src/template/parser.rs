use std::sync::OnceLock;

/// One segment of a path expression after the root identifier:
/// `.attr`, `[0]`, `['key']` or `["key"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Attr(String),
    Index(i64),
    Key(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Basename,
    Dirname,
    List,
    Replace(String, String),
    MapAttribute(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    pub root: String,
    pub path: Vec<PathSegment>,
    pub filters: Vec<Filter>,
}

/// Parses one `{{ ... }}` payload (braces already stripped) into a root
/// identifier, a chain of path segments, and a left-to-right filter chain.
/// Returns `None` only if the payload has no identifiable root at all.
pub fn parse_expression(input: &str) -> Option<Expression> {
    let input = input.trim();
    let (path_part, filter_part) = match input.split_once('|') {
        Some((p, f)) => (p.trim(), Some(f)),
        None => (input, None),
    };

    let mut segments = segment_regex()
        .find_iter(path_part)
        .map(|m| m.as_str().to_string());

    let root = segments.next()?;
    let path = segments
        .map(|seg| parse_segment(&seg))
        .collect::<Vec<_>>();

    let filters = filter_part
        .map(|f| f.split('|').filter_map(parse_filter).collect())
        .unwrap_or_default();

    Some(Expression {
        root,
        path,
        filters,
    })
}

fn parse_segment(seg: &str) -> PathSegment {
    if let Some(inner) = seg.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        if let Some(key) = inner
            .strip_prefix('\'')
            .and_then(|s| s.strip_suffix('\''))
            .or_else(|| inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
        {
            return PathSegment::Key(key.to_string());
        }
        if let Ok(idx) = inner.parse::<i64>() {
            return PathSegment::Index(idx);
        }
        // Malformed bracket content; treat the raw text as a key rather
        // than panicking on a filter that can never match anything.
        return PathSegment::Key(inner.to_string());
    }
    PathSegment::Attr(seg.to_string())
}

fn parse_filter(raw: &str) -> Option<Filter> {
    let f = raw.trim();
    if f.is_empty() {
        return None;
    }
    if f == "basename" {
        return Some(Filter::Basename);
    }
    if f == "dirname" {
        return Some(Filter::Dirname);
    }
    if f == "list" {
        return Some(Filter::List);
    }
    if f.starts_with("replace") {
        let re = replace_args_regex();
        if let Some(caps) = re.captures(f) {
            return Some(Filter::Replace(caps[1].to_string(), caps[2].to_string()));
        }
        return None;
    }
    if f.starts_with("map") {
        let re = map_attr_regex();
        if let Some(caps) = re.captures(f) {
            return Some(Filter::MapAttribute(caps[1].to_string()));
        }
        return None;
    }
    None
}

fn replace_args_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r#"replace\(\s*['"]([^'"]*)['"]\s*,\s*['"]([^'"]*)['"]\s*\)"#).unwrap()
    })
}

fn map_attr_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r#"attribute=['"]([^'"]+)['"]"#).unwrap())
}

/// Matches one path-expression segment: a bare identifier, an integer index
/// in brackets, or a quoted key in brackets. Dots between segments simply
/// don't match any alternative and fall out of the scan, which is what lets
/// `find_iter` treat them as separators.
fn segment_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r#"[A-Za-z0-9_]+|\[-?\d+\]|\['[^']*'\]|\["[^"]*"\]"#).unwrap()
    })
}
