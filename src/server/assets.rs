//! Viewer page assets and template substitution

use std::io;
use std::path::Path;
use std::sync::Arc;

const DEFAULT_INDEX: &str = include_str!("../../assets/index.html");
const DEFAULT_CLIENT_SCRIPT: &str = include_str!("../../assets/jsmpg.js");

/// Index template and client script served by the HTTP server
#[derive(Debug, Clone)]
pub struct StaticAssets {
    index_template: Arc<str>,
    client_script: Arc<str>,
}

impl Default for StaticAssets {
    fn default() -> Self {
        Self::new(DEFAULT_INDEX, DEFAULT_CLIENT_SCRIPT)
    }
}

impl StaticAssets {
    /// Use the given template and script
    pub fn new(index_template: impl Into<Arc<str>>, client_script: impl Into<Arc<str>>) -> Self {
        Self {
            index_template: index_template.into(),
            client_script: client_script.into(),
        }
    }

    /// Load `index.html` and `jsmpg.js` from a directory
    pub fn load_dir(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref();
        let index = std::fs::read_to_string(dir.join("index.html"))?;
        let script = std::fs::read_to_string(dir.join("jsmpg.js"))?;

        tracing::debug!(dir = %dir.display(), "Loaded viewer assets");
        Ok(Self::new(index, script))
    }

    /// Raw index template
    pub fn index_template(&self) -> &str {
        &self.index_template
    }

    /// Client script content
    pub fn client_script(&self) -> &str {
        &self.client_script
    }
}

/// Substitute `$NAME` and `${NAME}` placeholders
///
/// `$$` produces a literal `$`. Placeholders with no matching variable, and
/// any `$` not followed by a name, are copied through unchanged.
pub fn render_template(template: &str, vars: &[(&str, String)]) -> String {
    let lookup = |name: &str| vars.iter().find(|(k, _)| *k == name).map(|(_, v)| v.as_str());

    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(tail) = after.strip_prefix('$') {
            out.push('$');
            rest = tail;
            continue;
        }

        if let Some(braced) = after.strip_prefix('{') {
            if let Some(end) = braced.find('}') {
                let name = &braced[..end];
                if is_identifier(name) {
                    if let Some(value) = lookup(name) {
                        out.push_str(value);
                        rest = &braced[end + 1..];
                        continue;
                    }
                }
            }
        } else {
            let len = identifier_len(after);
            if len > 0 {
                if let Some(value) = lookup(&after[..len]) {
                    out.push_str(value);
                    rest = &after[len..];
                    continue;
                }
            }
        }

        out.push('$');
        rest = after;
    }

    out.push_str(rest);
    out
}

fn identifier_len(s: &str) -> usize {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return 0,
    }
    chars
        .find(|(_, c)| !(*c == '_' || c.is_ascii_alphanumeric()))
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && identifier_len(s) == s.len()
}
