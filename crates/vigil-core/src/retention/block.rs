//! The block file format shared by the status and retention files:
//!
//! ```text
//! blockname {
//!     key=value
//!     }
//! ```
//!
//! Values are single-line; the first `=` separates key from value.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

use crate::error::PersistError;

/// One named block of key=value pairs.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub name:   String,
    pub values: HashMap<String, String>,
}

impl Block {
    pub fn new(name: &str) -> Self {
        Self {
            name:   name.to_string(),
            values: HashMap::new(),
        }
    }

    pub fn set(&mut self, key: &str, value: impl ToString) {
        self.values.insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key)?.parse().ok()
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key)?.parse().ok()
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get(key)?.parse().ok()
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key)?.parse().ok()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get_i64(key).map(|v| v != 0)
    }
}

/// Parse a whole block file.
pub fn parse_blocks(text: &str, path: &Path) -> Result<Vec<Block>, PersistError> {
    let mut blocks = Vec::new();
    let mut current: Option<Block> = None;

    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(name) = line.strip_suffix('{') {
            if current.is_some() {
                return Err(PersistError::Parse {
                    path:    path.to_path_buf(),
                    line:    lineno + 1,
                    message: "nested block".to_string(),
                });
            }
            current = Some(Block::new(name.trim()));
        } else if line == "}" {
            match current.take() {
                Some(block) => blocks.push(block),
                None => {
                    return Err(PersistError::Parse {
                        path:    path.to_path_buf(),
                        line:    lineno + 1,
                        message: "unmatched close brace".to_string(),
                    });
                }
            }
        } else if let Some(block) = current.as_mut() {
            match line.split_once('=') {
                Some((k, v)) => {
                    block.values.insert(k.to_string(), v.to_string());
                }
                None => {
                    return Err(PersistError::Parse {
                        path:    path.to_path_buf(),
                        line:    lineno + 1,
                        message: format!("expected key=value, got {line:?}"),
                    });
                }
            }
        } else {
            return Err(PersistError::Parse {
                path:    path.to_path_buf(),
                line:    lineno + 1,
                message: format!("text outside a block: {line:?}"),
            });
        }
    }
    Ok(blocks)
}

/// Render blocks in the on-disk format. Keys are sorted for stable output.
pub fn render_blocks(blocks: &[Block]) -> String {
    let mut out = String::new();
    for block in blocks {
        let _ = writeln!(out, "{} {{", block.name);
        let mut keys: Vec<&String> = block.values.keys().collect();
        keys.sort();
        for key in keys {
            let _ = writeln!(out, "\t{}={}", key, block.values[key]);
        }
        out.push_str("\t}\n");
    }
    out
}

/// Atomically replace `path` with `content`: write to a temp file in the
/// same directory, then rename over the target.
pub fn atomic_write(path: &Path, content: &str) -> Result<(), PersistError> {
    let wrap = |source: std::io::Error| PersistError::Write {
        path: path.to_path_buf(),
        source,
    };
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, content).map_err(wrap)?;
    std::fs::rename(&tmp, path).map_err(wrap)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut a = Block::new("hoststatus");
        a.set("host_name", "web1");
        a.set("state", 1);
        let mut b = Block::new("programstatus");
        b.set("pid", 42);

        let text = render_blocks(&[a, b]);
        let parsed = parse_blocks(&text, Path::new("x")).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].name, "hoststatus");
        assert_eq!(parsed[0].get("host_name"), Some("web1"));
        assert_eq!(parsed[0].get_i64("state"), Some(1));
        assert_eq!(parsed[1].get_u64("pid"), Some(42));
    }

    #[test]
    fn test_value_may_contain_equals() {
        let text = "b {\n\tperf_data=rta=20ms;pl=0%\n\t}\n";
        let parsed = parse_blocks(text, Path::new("x")).unwrap();
        assert_eq!(parsed[0].get("perf_data"), Some("rta=20ms;pl=0%"));
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let err = parse_blocks("stray line\n", Path::new("x")).unwrap_err();
        match err {
            PersistError::Parse { line, .. } => assert_eq!(line, 1),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_atomic_write_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.dat");
        atomic_write(&path, "first").unwrap();
        atomic_write(&path, "second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        assert!(!path.with_extension("tmp").exists());
    }
}
