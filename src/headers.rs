//! Case-insensitive, insertion-ordered header map.

/// Response headers.
///
/// Every key is lowercased on the way in and on every lookup, so
/// `"Content-Type"`, `"content-type"` and `"CONTENT-TYPE"` address the same
/// entry. Caller casing is not retained. Entries keep the position of
/// their first insertion; re-inserting a key replaces the value in place.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

fn canonical(name: &str) -> String {
    name.to_ascii_lowercase()
}

impl Headers {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Sets `name` to `value`, returning the previous value if there was one.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) -> Option<String> {
        let key = canonical(name);
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let key = canonical(name);
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let key = canonical(name);
        let idx = self.entries.iter().position(|(k, _)| *k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates `(lowercase name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl<K: AsRef<str>, V: Into<String>> Extend<(K, V)> for Headers {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k.as_ref(), v);
        }
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        headers.extend(iter);
        headers
    }
}
