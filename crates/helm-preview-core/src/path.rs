//! Field paths into a resource document, e.g. `spec.template.spec.containers[0].image`
//! or `spec.ports[port=80].targetPort` for identity-keyed list elements.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathElem {
    /// Mapping key.
    Key(String),
    /// Positional index into an ordered list.
    Index(usize),
    /// Identity-keyed element of an unordered list, e.g. `[name=FOO]`.
    Match { key: String, value: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldPath(pub Vec<PathElem>);

impl FieldPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn key(&self, k: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.0.push(PathElem::Key(k.into()));
        next
    }

    pub fn index(&self, i: usize) -> Self {
        let mut next = self.clone();
        next.0.push(PathElem::Index(i));
        next
    }

    pub fn matched(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.0.push(PathElem::Match {
            key: key.into(),
            value: value.into(),
        });
        next
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// The mapping-key segments of this path, ignoring list positions.
    pub fn key_segments(&self) -> impl Iterator<Item = &str> {
        self.0.iter().filter_map(|e| match e {
            PathElem::Key(k) => Some(k.as_str()),
            _ => None,
        })
    }

    /// Whether the rendered path starts with a dot-path prefix such as
    /// `spec.selector`, respecting segment boundaries.
    pub fn starts_with_str(&self, prefix: &str) -> bool {
        let rendered = self.to_string();
        match rendered.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('.') || rest.starts_with('['),
            None => false,
        }
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for e in &self.0 {
            match e {
                PathElem::Key(k) => {
                    if !first {
                        write!(f, ".")?;
                    }
                    write!(f, "{k}")?;
                }
                PathElem::Index(i) => write!(f, "[{i}]")?,
                PathElem::Match { key, value } => write!(f, "[{key}={value}]")?,
            }
            first = false;
        }
        Ok(())
    }
}

impl std::str::FromStr for FieldPath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut elems = Vec::new();
        let mut rest = s;
        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('[') {
                let end = after
                    .find(']')
                    .ok_or_else(|| format!("unterminated '[' in {s:?}"))?;
                let inner = &after[..end];
                if let Some((k, v)) = inner.split_once('=') {
                    elems.push(PathElem::Match {
                        key: k.to_string(),
                        value: v.to_string(),
                    });
                } else {
                    let i = inner
                        .parse::<usize>()
                        .map_err(|_| format!("invalid index {inner:?} in {s:?}"))?;
                    elems.push(PathElem::Index(i));
                }
                rest = &after[end + 1..];
                rest = rest.strip_prefix('.').unwrap_or(rest);
            } else {
                let end = rest
                    .find(|c| c == '.' || c == '[')
                    .unwrap_or(rest.len());
                if end == 0 {
                    return Err(format!("empty segment in {s:?}"));
                }
                elems.push(PathElem::Key(rest[..end].to_string()));
                rest = &rest[end..];
                rest = rest.strip_prefix('.').unwrap_or(rest);
            }
        }
        Ok(FieldPath(elems))
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_round_trip() {
        let p = FieldPath::root()
            .key("spec")
            .key("containers")
            .index(0)
            .key("image");
        assert_eq!(p.to_string(), "spec.containers[0].image");
        assert_eq!(p.to_string().parse::<FieldPath>().unwrap(), p);

        let p = FieldPath::root()
            .key("spec")
            .key("ports")
            .matched("port", "80")
            .key("targetPort");
        assert_eq!(p.to_string(), "spec.ports[port=80].targetPort");
        assert_eq!(p.to_string().parse::<FieldPath>().unwrap(), p);
    }

    #[test]
    fn prefix_respects_boundaries() {
        let p = FieldPath::root().key("spec").key("selector").key("matchLabels");
        assert!(p.starts_with_str("spec.selector"));
        assert!(p.starts_with_str("spec.selector.matchLabels"));
        assert!(!p.starts_with_str("spec.select"));

        let p = FieldPath::root().key("spec").key("selectorExtra");
        assert!(!p.starts_with_str("spec.selector"));
    }

    #[test]
    fn paths_sort_stably() {
        let a = FieldPath::root().key("metadata").key("labels");
        let b = FieldPath::root().key("spec").key("replicas");
        assert!(a < b);
    }
}
