use std::fs;
use std::path::{Path, PathBuf};
use yaml_rust2::{Yaml, YamlLoader};

#[derive(Debug, thiserror::Error)]
pub enum IncludeError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: yaml_rust2::ScanError,
    },

    #[error("include cycle detected at {0}")]
    Cycle(PathBuf),
}

/// Loads a YAML file, resolving `!include <relative path>` lines first.
///
/// Included documents are merged in order and the including file wins on
/// conflicting keys. Mappings merge recursively; any other value is replaced.
pub fn load_yaml_with_includes(path: &Path) -> Result<Yaml, IncludeError> {
    let mut stack = Vec::new();
    process_includes_recursive(path, &mut stack)
}

fn process_includes_recursive(path: &Path, stack: &mut Vec<PathBuf>) -> Result<Yaml, IncludeError> {
    let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    if stack.contains(&canonical) {
        return Err(IncludeError::Cycle(canonical));
    }
    stack.push(canonical);

    let contents = fs::read_to_string(path).map_err(|source| IncludeError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let base_path = path.parent().unwrap_or(Path::new(""));

    let (includes, rest): (Vec<&str>, Vec<&str>) = contents
        .lines()
        .partition(|line| line.trim_start().starts_with("!include"));

    let mut merged = Yaml::Hash(Default::default());
    for line in includes {
        let include_path = line.trim_start().trim_start_matches("!include").trim();
        let included = process_includes_recursive(&base_path.join(include_path), stack)?;
        merged = merge_yaml(&merged, &included);
    }

    let documents = YamlLoader::load_from_str(&rest.join("\n")).map_err(|source| IncludeError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    for document in documents {
        merged = merge_yaml(&merged, &document);
    }

    stack.pop();
    Ok(merged)
}

pub fn merge_yaml(base: &Yaml, override_yaml: &Yaml) -> Yaml {
    match (base, override_yaml) {
        (Yaml::Hash(base_hash), Yaml::Hash(override_hash)) => {
            let mut result = base_hash.clone();
            for (key, value) in override_hash {
                let merged = match base_hash.get(key) {
                    Some(base_value) => merge_yaml(base_value, value),
                    None => value.clone(),
                };
                result.insert(key.clone(), merged);
            }
            Yaml::Hash(result)
        }
        (base_value, Yaml::Null) | (base_value, Yaml::BadValue) => base_value.clone(),
        (_, override_value) => override_value.clone(),
    }
}
