use std::collections::BTreeMap;

/// Variables visible to a snippet and to the commands it runs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the process environment. Variables that are not valid
    /// UTF-8 are skipped.
    pub fn inherit() -> Self {
        Environment {
            vars: std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.vars.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl From<BTreeMap<String, String>> for Environment {
    fn from(vars: BTreeMap<String, String>) -> Self {
        Environment { vars }
    }
}

impl Extend<(String, String)> for Environment {
    fn extend<I: IntoIterator<Item = (String, String)>>(&mut self, iter: I) {
        self.vars.extend(iter);
    }
}

#[cfg(test)]
mod env_tests {
    use super::*;

    #[test]
    fn later_values_replace_earlier_ones() {
        let mut env = Environment::new();
        env.set("TM_SELECTED_TEXT", "a");
        env.extend([("TM_SELECTED_TEXT".to_owned(), "b".to_owned())]);
        assert_eq!(env.get("TM_SELECTED_TEXT"), Some("b"));
        assert_eq!(env.remove("TM_SELECTED_TEXT").as_deref(), Some("b"));
        assert!(env.is_empty());
    }

    #[test]
    fn inherits_the_process_environment() {
        std::env::set_var("BUNDLESTORE_ENV_TEST", "1");
        assert_eq!(Environment::inherit().get("BUNDLESTORE_ENV_TEST"), Some("1"));
    }
}
