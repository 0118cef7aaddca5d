use std::fmt;

/// A hierarchical content name, stored as an ordered list of components.
///
/// Names are the sole routing and matching key in the simulator: FIB routes
/// are registered under name prefixes, PIT entries are keyed by full names,
/// and consumers encode the request sequence number as the final component.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Name {
    components: Vec<String>,
}

impl Name {
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Parses a `/`-separated URI, ignoring empty components. `"/"` is the
    /// root name with zero components.
    pub fn from_uri(uri: &str) -> Self {
        Self {
            components: uri
                .split('/')
                .filter(|c| !c.is_empty())
                .map(str::to_owned)
                .collect(),
        }
    }

    pub fn push(&mut self, component: &str) {
        self.components.push(component.to_owned());
    }

    pub fn push_seq(&mut self, seq: u64) {
        self.components.push(seq.to_string());
    }

    /// Returns a copy of this name with the sequence number appended as the
    /// final component.
    pub fn with_seq(&self, seq: u64) -> Self {
        let mut name = self.clone();
        name.push_seq(seq);
        name
    }

    /// Parses the trailing component as a sequence number.
    pub fn trailing_seq(&self) -> Option<u64> {
        self.components.last()?.parse().ok()
    }

    /// True if `prefix` is a (non-strict) prefix of this name.
    pub fn has_prefix(&self, prefix: &Name) -> bool {
        self.components.len() >= prefix.components.len()
            && self.components[..prefix.components.len()] == prefix.components[..]
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }

        for component in self.components.iter() {
            write!(f, "/{}", component)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_round_trip() {
        let name = Name::from_uri("/prefix1/a");
        assert_eq!(name.len(), 2);
        assert_eq!(name.to_string(), "/prefix1/a");

        assert_eq!(Name::from_uri("/").len(), 0);
        assert_eq!(Name::from_uri("/").to_string(), "/");

        // Doubled separators collapse
        assert_eq!(Name::from_uri("//a//b").to_string(), "/a/b");
    }

    #[test]
    fn seq_component() {
        let prefix = Name::from_uri("/prefix1");
        let name = prefix.with_seq(17);

        assert_eq!(name.to_string(), "/prefix1/17");
        assert_eq!(name.trailing_seq(), Some(17));
        assert_eq!(prefix.trailing_seq(), None);
    }

    #[test]
    fn prefix_match() {
        let prefix = Name::from_uri("/a/b");

        assert!(Name::from_uri("/a/b").has_prefix(&prefix));
        assert!(Name::from_uri("/a/b/c").has_prefix(&prefix));
        assert!(!Name::from_uri("/a").has_prefix(&prefix));
        assert!(!Name::from_uri("/a/x/c").has_prefix(&prefix));

        // The root name is a prefix of everything
        assert!(Name::from_uri("/a").has_prefix(&Name::new()));
    }
}
