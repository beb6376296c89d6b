//! Query templates used to generate view definitions.
//!
//! A template is plain text containing `$`-placeholders:
//!
//! - `${name}` and `$name` are replaced by the value bound to `name`.
//! - `$$` renders a single literal `$`.
//!
//! Names follow `[A-Za-z_][A-Za-z0-9_]*`. Rendering fails if the template references a name that
//! has no bound value, or if a `$` is not followed by a valid placeholder. Values bound to names
//! the template never references are ignored.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::types::TableRef;

/// Name under which the fully qualified source table is bound.
pub const SOURCE_TABLE_PARAMETER: &str = "source_table";

/// Older name for [`SOURCE_TABLE_PARAMETER`], still bound so existing templates keep working.
pub const LEGACY_SOURCE_TABLE_PARAMETER: &str = "src_table";

/// An immutable query template, cheap to clone and share across workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    text: Arc<str>,
}

impl QueryTemplate {
    /// Creates a template from its raw text.
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self { text: text.into() }
    }

    /// Reads a template from a UTF-8 file.
    pub async fn load(path: &Path) -> EtlResult<Self> {
        let text = tokio::fs::read_to_string(path).await.map_err(|err| {
            etl_error!(
                ErrorKind::TemplateReadFailed,
                "Could not read the query template",
                format!("{}: {err}", path.display()),
                source: err
            )
        })?;

        debug!(path = %path.display(), bytes = text.len(), "loaded query template");

        Ok(Self::new(text))
    }

    /// Returns the raw template text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Renders the template, replacing every placeholder with its bound value.
    pub fn render<K, V>(&self, parameters: &HashMap<K, V>) -> EtlResult<String>
    where
        K: Borrow<str> + Hash + Eq,
        V: AsRef<str>,
    {
        let text = self.as_str();
        let bytes = text.as_bytes();
        let mut rendered = String::with_capacity(text.len());
        let mut copied_up_to = 0;
        let mut i = 0;

        while i < bytes.len() {
            if bytes[i] != b'$' {
                i += 1;
                continue;
            }

            rendered.push_str(&text[copied_up_to..i]);

            let (name, next) = match bytes.get(i + 1) {
                Some(b'$') => {
                    rendered.push('$');
                    i += 2;
                    copied_up_to = i;
                    continue;
                }
                Some(b'{') => {
                    let start = i + 2;
                    let end = identifier_end(bytes, start);
                    if end == start || bytes.get(end) != Some(&b'}') {
                        return Err(invalid_placeholder(text, i));
                    }
                    (&text[start..end], end + 1)
                }
                Some(_) => {
                    let start = i + 1;
                    let end = identifier_end(bytes, start);
                    if end == start {
                        return Err(invalid_placeholder(text, i));
                    }
                    (&text[start..end], end)
                }
                None => return Err(invalid_placeholder(text, i)),
            };

            let Some(value) = parameters.get(name) else {
                return Err(etl_error!(
                    ErrorKind::TemplateParameterMissing,
                    "Query template references an unbound parameter",
                    name
                ));
            };

            rendered.push_str(value.as_ref());
            i = next;
            copied_up_to = i;
        }

        rendered.push_str(&text[copied_up_to..]);

        Ok(rendered)
    }
}

/// Where the worker obtains its template from.
#[derive(Debug, Clone)]
pub enum TemplateSource {
    /// The template file is read again for every job, so a missing or unreadable file fails
    /// each job individually instead of the whole run.
    File(PathBuf),
    /// A template loaded once and shared by all jobs.
    Inline(QueryTemplate),
}

impl TemplateSource {
    /// Returns the template to render for one job.
    pub async fn resolve(&self) -> EtlResult<QueryTemplate> {
        match self {
            TemplateSource::File(path) => QueryTemplate::load(path).await,
            TemplateSource::Inline(template) => Ok(template.clone()),
        }
    }
}

/// Builds the parameters for rendering the view of `source_table`.
pub fn source_table_parameters(source_table: &TableRef) -> HashMap<&'static str, String> {
    let source_table = source_table.to_string();

    HashMap::from([
        (SOURCE_TABLE_PARAMETER, source_table.clone()),
        (LEGACY_SOURCE_TABLE_PARAMETER, source_table),
    ])
}

/// Returns the index one past the identifier starting at `start`, or `start` if there is none.
fn identifier_end(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while let Some(&b) = bytes.get(end) {
        let valid = if end == start {
            b == b'_' || b.is_ascii_alphabetic()
        } else {
            b == b'_' || b.is_ascii_alphanumeric()
        };
        if !valid {
            break;
        }
        end += 1;
    }

    end
}

fn invalid_placeholder(text: &str, offset: usize) -> crate::error::EtlError {
    let preceding = &text[..offset];
    let line = preceding.matches('\n').count() + 1;
    let column = offset - preceding.rfind('\n').map(|i| i + 1).unwrap_or(0) + 1;

    etl_error!(
        ErrorKind::TemplateSyntaxError,
        "Invalid placeholder in query template",
        format!("line {line}, column {column}")
    )
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::types::DatasetRef;

    fn params(pairs: &[(&'static str, &'static str)]) -> HashMap<&'static str, &'static str> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_render_braced_placeholder() {
        let template = QueryTemplate::new("SELECT * FROM ${source_table}");

        let rendered = template
            .render(&params(&[("source_table", "proj.ds.tbl")]))
            .unwrap();

        assert_eq!(rendered, "SELECT * FROM proj.ds.tbl");
    }

    #[test]
    fn test_render_bare_placeholder_stops_at_identifier_end() {
        let template = QueryTemplate::new("SELECT a FROM $source_table WHERE a > 0;");

        let rendered = template
            .render(&params(&[("source_table", "p.d.t")]))
            .unwrap();

        assert_eq!(rendered, "SELECT a FROM p.d.t WHERE a > 0;");
    }

    #[test]
    fn test_render_escaped_dollar_and_unicode() {
        let template = QueryTemplate::new("SELECT '$$5 – ünïcode' AS price FROM ${t}");

        let rendered = template.render(&params(&[("t", "x.y.z")])).unwrap();

        assert_eq!(rendered, "SELECT '$5 – ünïcode' AS price FROM x.y.z");
    }

    #[test]
    fn test_render_ignores_unused_parameters() {
        let template = QueryTemplate::new("SELECT 1");

        let rendered = template
            .render(&params(&[("source_table", "p.d.t")]))
            .unwrap();

        assert_eq!(rendered, "SELECT 1");
    }

    #[test]
    fn test_render_fails_on_unbound_placeholder() {
        let template = QueryTemplate::new("SELECT * FROM ${other_table}");

        let err = template
            .render(&params(&[("source_table", "p.d.t")]))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TemplateParameterMissing);
        assert_eq!(err.detail(), Some("other_table"));
    }

    #[test]
    fn test_render_fails_on_invalid_placeholder() {
        for text in ["SELECT 1\nFROM ${}", "SELECT ${1abc}", "SELECT $ FROM t", "trailing $"] {
            let err = QueryTemplate::new(text)
                .render(&params(&[("source_table", "p.d.t")]))
                .unwrap_err();

            assert_eq!(err.kind(), ErrorKind::TemplateSyntaxError, "{text}");
        }

        let err = QueryTemplate::new("SELECT 1\nFROM ${}")
            .render(&params(&[]))
            .unwrap_err();
        assert_eq!(err.detail(), Some("line 2, column 6"));
    }

    #[test]
    fn test_source_table_parameters_bind_both_names() {
        let source = DatasetRef::new("proj", "ds").table("tbl");
        let parameters = source_table_parameters(&source);

        let current = QueryTemplate::new("SELECT * FROM ${source_table}");
        let legacy = QueryTemplate::new("SELECT * FROM ${src_table}");

        assert_eq!(current.render(&parameters).unwrap(), "SELECT * FROM proj.ds.tbl");
        assert_eq!(legacy.render(&parameters).unwrap(), "SELECT * FROM proj.ds.tbl");
    }

    #[tokio::test]
    async fn test_file_source_reads_template() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "SELECT * FROM ${{source_table}}").unwrap();

        let template = TemplateSource::File(file.path().to_path_buf())
            .resolve()
            .await
            .unwrap();

        assert_eq!(template.as_str(), "SELECT * FROM ${source_table}");
    }

    #[tokio::test]
    async fn test_file_source_missing_file_is_template_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.sql");

        let err = TemplateSource::File(path).resolve().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TemplateReadFailed);
    }
}
