//! Email participants.

use sha2::{Digest, Sha256};

/// A sender or recipient, identified by normalized address.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Person {
    /// Lowercase bare address. Identity key.
    pub email: String,
    /// Display name, filled in opportunistically.
    pub name: Option<String>,
}

impl Person {
    /// Build a person, normalizing the address and dropping blank names.
    pub fn new(email: &str, name: Option<String>) -> Self {
        Self {
            email: email.trim().to_lowercase(),
            name: name.filter(|n| !n.trim().is_empty()),
        }
    }

    /// `true` when a non-empty display name is known.
    pub fn has_name(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.is_empty())
    }

    /// Graph identifier for this person: the first 16 hex digits of the
    /// SHA-256 of the address. Stable across runs and corpus orderings.
    pub fn graph_id(&self) -> String {
        person_id_for(&self.email)
    }
}

/// Graph identifier for an already-normalized address.
pub fn person_id_for(email: &str) -> String {
    let digest = Sha256::digest(email.as_bytes());
    digest[..8].iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes() {
        let p = Person::new("  Jane.Doe@Example.COM ", Some("  ".into()));
        assert_eq!(p.email, "jane.doe@example.com");
        assert_eq!(p.name, None);
        assert!(!p.has_name());
    }

    #[test]
    fn test_graph_id_is_stable_and_short() {
        let a = Person::new("jane@x.com", None);
        let b = Person::new("JANE@x.com", Some("Jane".into()));
        assert_eq!(a.graph_id(), b.graph_id());
        assert_eq!(a.graph_id().len(), 16);
        assert_ne!(a.graph_id(), Person::new("john@x.com", None).graph_id());
    }
}
