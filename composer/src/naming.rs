use std::collections::BTreeMap;

/// Canonical name policy for every resource in a deployment
///
/// `(system, environment, component)` always maps to the same string, so the
/// result doubles as the human-facing resource name and the scope id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Naming {
    system: String,
    environment: String,
}

impl Naming {
    pub fn new(system: &str, environment: &str) -> Self {
        Naming {
            system: system.to_string(),
            environment: environment.to_string(),
        }
    }

    pub fn name(&self, component: &str) -> String {
        format!("{}-{}-{}", self.system, self.environment, component)
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }
}

/// Fixed key/value set applied uniformly to every resource in a stack
///
/// The map is immutable configuration: it is handed to the app once and
/// applied to each stack after all of its constructs exist. Re-applying the
/// same map is a no-op.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize)]
pub struct TagMap(BTreeMap<String, String>);

impl TagMap {
    pub fn new() -> Self {
        TagMap(BTreeMap::new())
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for TagMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        TagMap(iter.into_iter().collect())
    }
}
