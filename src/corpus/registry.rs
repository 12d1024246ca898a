//! Corpus-wide participant deduplication.

use std::collections::HashMap;

use crate::model::person::Person;

/// Canonical [`Person`] per normalized address, in first-sighting order.
///
/// Owned by a single [`CorpusWalker`](super::walker::CorpusWalker) while it
/// walks; read-only afterwards. Not synchronized.
#[derive(Debug, Default, Clone)]
pub struct PersonRegistry {
    people: Vec<Person>,
    index: HashMap<String, usize>,
}

impl PersonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the canonical person for `candidate.email`.
    ///
    /// Unseen addresses are registered. For known ones, the candidate's name
    /// is adopted only if the stored record has none; a known name is never
    /// replaced or cleared.
    pub fn resolve(&mut self, candidate: Person) -> &Person {
        let candidate = Person::new(&candidate.email, candidate.name);
        match self.index.get(&candidate.email).copied() {
            Some(pos) => {
                let existing = &mut self.people[pos];
                if !existing.has_name() && candidate.has_name() {
                    existing.name = candidate.name;
                }
                &self.people[pos]
            }
            None => {
                let pos = self.people.len();
                self.index.insert(candidate.email.clone(), pos);
                self.people.push(candidate);
                &self.people[pos]
            }
        }
    }

    /// Look up a person by address (normalized before lookup).
    pub fn get(&self, email: &str) -> Option<&Person> {
        self.index
            .get(&email.trim().to_lowercase())
            .map(|&pos| &self.people[pos])
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }

    /// People in first-sighting order.
    pub fn iter(&self) -> impl Iterator<Item = &Person> {
        self.people.iter()
    }

    pub fn into_people(self) -> Vec<Person> {
        self.people
    }
}
