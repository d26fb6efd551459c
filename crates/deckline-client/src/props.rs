use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

/// A `key=value` properties file in the plugin folder. Values the plugin
/// wants to survive restarts go here; the client persists the store when the
/// session closes.
pub struct PropertiesStore {
    path: PathBuf,
    values: Mutex<HashMap<String, String>>,
}

impl PropertiesStore {
    /// Load a properties file. A missing file yields an empty store that
    /// will create the file on the first `store`.
    pub fn load(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(text) => parse(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e),
        };
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    /// Set a key, returning the previous value if any.
    pub fn set(&self, key: &str, value: &str) -> Option<String> {
        self.values.lock().insert(key.to_owned(), value.to_owned())
    }

    /// Remove a key, returning the previous value if any.
    pub fn remove(&self, key: &str) -> Option<String> {
        self.values.lock().remove(key)
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }

    /// Write the store back to disk, keys sorted for stable diffs.
    pub fn store(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let values = self.values.lock();
        let mut keys: Vec<&String> = values.keys().collect();
        keys.sort();

        let mut out = String::new();
        for key in keys {
            out.push_str(key);
            out.push('=');
            out.push_str(&values[key]);
            out.push('\n');
        }
        std::fs::write(&self.path, out)
    }
}

fn parse(text: &str) -> HashMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| {
            line.split_once('=')
                .map(|(key, value)| (key.trim().to_owned(), value.trim().to_owned()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("deckline-props-{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn parse_skips_comments_and_blanks() {
        let values = parse("# comment\n\nkey=value\n! other comment\nspaced = padded \n");
        assert_eq!(values.get("key").map(String::as_str), Some("value"));
        assert_eq!(values.get("spaced").map(String::as_str), Some("padded"));
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn missing_file_loads_empty() {
        let store = PropertiesStore::load(temp_path("never-created.properties")).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.get("anything"), None);
    }

    #[test]
    fn set_and_remove_return_previous_values() {
        let store = PropertiesStore::load(temp_path("set-remove.properties")).unwrap();
        assert_eq!(store.set("k", "v1"), None);
        assert_eq!(store.set("k", "v2"), Some("v1".to_string()));
        assert_eq!(store.remove("k"), Some("v2".to_string()));
        assert_eq!(store.remove("k"), None);
    }

    #[test]
    fn store_then_load_roundtrips() {
        let path = temp_path("roundtrip.properties");
        let store = PropertiesStore::load(&path).unwrap();
        store.set("plugin.version", "3");
        store.set("last.page", "main");
        store.store().unwrap();

        let reloaded = PropertiesStore::load(&path).unwrap();
        assert_eq!(reloaded.get("plugin.version").as_deref(), Some("3"));
        assert_eq!(reloaded.get("last.page").as_deref(), Some("main"));
        assert_eq!(reloaded.len(), 2);
    }

    #[test]
    fn store_writes_sorted_keys() {
        let path = temp_path("sorted.properties");
        let store = PropertiesStore::load(&path).unwrap();
        store.set("zebra", "1");
        store.set("alpha", "2");
        store.store().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "alpha=2\nzebra=1\n");
    }
}
