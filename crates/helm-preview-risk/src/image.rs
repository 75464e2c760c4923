//! Container image reference parsing, just enough to judge pinning.

/// A parsed image reference: `[registry/]repository[:tag][@digest]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef<'a> {
    pub repository: &'a str,
    pub tag: Option<&'a str>,
    pub digest: Option<&'a str>,
}

impl<'a> ImageRef<'a> {
    pub fn parse(reference: &'a str) -> Self {
        let (rest, digest) = match reference.split_once('@') {
            Some((r, d)) => (r, Some(d)),
            None => (reference, None),
        };
        // The tag separator is a ':' after the last '/', so registry ports
        // (e.g. registry:5000/app) are not mistaken for tags.
        let slash = rest.rfind('/').map_or(0, |i| i + 1);
        let (repository, tag) = match rest[slash..].rfind(':') {
            Some(i) => (&rest[..slash + i], Some(&rest[slash + i + 1..])),
            None => (rest, None),
        };
        Self {
            repository,
            tag,
            digest,
        }
    }

    /// A reference is pinned when it carries a digest or an exact tag other
    /// than `latest`.
    pub fn is_pinned(&self) -> bool {
        if self.digest.is_some() {
            return true;
        }
        matches!(self.tag, Some(t) if !t.is_empty() && t != "latest")
    }
}

pub fn is_pinned_image(reference: &str) -> bool {
    ImageRef::parse(reference).is_pinned()
}
