/// Environment-variable overrides with case-insensitive names.
///
/// At most one entry exists per case-insensitive name. Overwriting
/// through a differently-cased name replaces the value but keeps the
/// casing the entry was first stored under, which is how the interpreter
/// environment itself behaves.
#[derive(Debug, Clone, Default)]
pub struct EnvStore {
    entries: Vec<(String, String)>,
}

impl EnvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Case-insensitive find-or-insert.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(name, _)| name.eq_ignore_ascii_case(&key))
        {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn set_all<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in vars {
            self.set(key, value);
        }
    }

    /// Case-insensitive lookup.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Applies the overrides to a process launch request. An override
    /// whose name collides case-insensitively with an inherited variable
    /// replaces that variable instead of adding a second spelling.
    pub fn apply_to(&self, cmd: &mut std::process::Command) {
        for (key, value) in self.iter() {
            let resolved = std::env::vars()
                .map(|(name, _)| name)
                .find(|name| name.eq_ignore_ascii_case(key))
                .unwrap_or_else(|| key.to_string());
            cmd.env(resolved, value);
        }
    }
}

impl PartialEq for EnvStore {
    /// Order-independent: the same entries stored in a different order
    /// describe the same environment.
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|entry| other.entries.contains(entry))
    }
}

impl Eq for EnvStore {}
