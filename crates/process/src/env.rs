use std::collections::BTreeMap;

/// Immutable snapshot of the variables handed to a child process.
///
/// Children never inherit the parent's environment implicitly: the runner
/// clears it and applies exactly this map. Overrides return a new snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// An empty environment.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Snapshot of the calling process's environment.
    ///
    /// Only the outermost layer (the CLI) should call this; everything below
    /// it receives the snapshot explicitly.
    pub fn inherited() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Pin `LANG` and `LC_ALL` so tool output is not translated.
    pub fn with_locale(self, locale: &str) -> Self {
        self.with_var("LANG", locale).with_var("LC_ALL", locale)
    }

    /// New snapshot with `key` set to `value`.
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// New snapshot with every pair of `overrides` applied on top of `self`.
    pub fn overlay<K, V>(&self, overrides: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut vars = self.vars.clone();
        for (key, value) in overrides {
            vars.insert(key.into(), value.into());
        }
        Self { vars }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
