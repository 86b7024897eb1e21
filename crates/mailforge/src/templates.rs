//! Named template environments.
//!
//! Four independent environments resolve template names: HTML bodies, text
//! bodies, HTML table themes and text table themes. Each can be pointed at a
//! directory on disk; the table environments always keep the built-in
//! themes (`modest.html`, `pandas.txt`) and the label grouping functions.

use crate::error::{Error, Result};
use crate::table::register_functions;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};
use tracing::debug;

const MODEST_HTML: &str = include_str!("../templates/modest.html");
const PANDAS_TXT: &str = include_str!("../templates/pandas.txt");

/// Which environment a template name is looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// HTML body templates.
    Html,
    /// Text body templates.
    Text,
    /// HTML table themes.
    HtmlTable,
    /// Text table themes.
    TextTable,
}

impl TemplateKind {
    const fn builtins(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Html | Self::Text => &[],
            Self::HtmlTable => &[("modest.html", MODEST_HTML)],
            Self::TextTable => &[("pandas.txt", PANDAS_TXT)],
        }
    }

    const fn is_table(self) -> bool {
        matches!(self, Self::HtmlTable | Self::TextTable)
    }
}

#[derive(Debug, Clone)]
struct Environment {
    kind: TemplateKind,
    tera: Tera,
    dir: Option<PathBuf>,
    /// Sources of built-in and added templates; directory templates are read on demand.
    sources: BTreeMap<String, String>,
}

impl Environment {
    fn new(kind: TemplateKind, dir: Option<&Path>) -> Result<Self> {
        let mut tera = match dir {
            Some(dir) => {
                if !dir.is_dir() {
                    return Err(Error::InvalidReference(format!(
                        "template directory does not exist: {}",
                        dir.display()
                    )));
                }
                Tera::new(&format!("{}/**/*", dir.display()))?
            }
            None => Tera::default(),
        };
        // Bodies are markup already; escaping is done explicitly in themes.
        tera.autoescape_on(vec![]);

        let existing: Vec<String> = tera.get_template_names().map(str::to_string).collect();
        let builtins: Vec<(&str, &str)> = kind
            .builtins()
            .iter()
            .filter(|(name, _)| !existing.iter().any(|e| e.as_str() == *name))
            .copied()
            .collect();
        tera.add_raw_templates(builtins.iter().copied())?;
        let sources = builtins
            .into_iter()
            .map(|(name, source)| (name.to_string(), source.to_string()))
            .collect();

        if kind.is_table() {
            register_functions(&mut tera);
        }

        debug!(?kind, dir = ?dir, templates = tera.get_template_names().count(), "template environment loaded");
        Ok(Self {
            kind,
            tera,
            dir: dir.map(Path::to_path_buf),
            sources,
        })
    }

    /// Whether rendering a source string needs the environment's other
    /// templates or functions.
    fn needs_environment(&self, source: &str) -> bool {
        self.kind.is_table()
            || ["include", "extends", "import"]
                .iter()
                .any(|tag| source.contains(tag))
    }

    /// Exact name first, then a name whose stem matches (`modest` -> `modest.html`).
    fn resolve(&self, name: &str) -> Result<String> {
        let names: Vec<&str> = self.tera.get_template_names().collect();
        if names.contains(&name) {
            return Ok(name.to_string());
        }
        names
            .into_iter()
            .find(|candidate| {
                candidate
                    .rsplit_once('.')
                    .is_some_and(|(stem, _)| stem == name)
            })
            .map(str::to_string)
            .ok_or_else(|| {
                Error::InvalidReference(format!(
                    "template '{name}' not found in {:?} templates",
                    self.kind
                ))
            })
    }
}

/// The four template environments of a sender.
#[derive(Debug, Clone)]
pub struct Templates {
    html: Environment,
    text: Environment,
    html_table: Environment,
    text_table: Environment,
}

impl Templates {
    /// Environments with only the built-in themes.
    ///
    /// # Errors
    ///
    /// Returns an error if a built-in theme fails to parse.
    pub fn new() -> Result<Self> {
        Ok(Self {
            html: Environment::new(TemplateKind::Html, None)?,
            text: Environment::new(TemplateKind::Text, None)?,
            html_table: Environment::new(TemplateKind::HtmlTable, None)?,
            text_table: Environment::new(TemplateKind::TextTable, None)?,
        })
    }

    /// Points the given environments at directories; `None` leaves one as is.
    ///
    /// Every file below a directory is loaded, named by its relative path.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory is missing or a template fails to parse.
    pub fn set_template_paths(
        &mut self,
        html: Option<&Path>,
        text: Option<&Path>,
        html_table: Option<&Path>,
        text_table: Option<&Path>,
    ) -> Result<()> {
        if let Some(dir) = html {
            self.html = Environment::new(TemplateKind::Html, Some(dir))?;
        }
        if let Some(dir) = text {
            self.text = Environment::new(TemplateKind::Text, Some(dir))?;
        }
        if let Some(dir) = html_table {
            self.html_table = Environment::new(TemplateKind::HtmlTable, Some(dir))?;
        }
        if let Some(dir) = text_table {
            self.text_table = Environment::new(TemplateKind::TextTable, Some(dir))?;
        }
        Ok(())
    }

    /// Adds a template from a string to an environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the template fails to parse.
    pub fn add_template(&mut self, kind: TemplateKind, name: &str, source: &str) -> Result<()> {
        let env = self.environment_mut(kind);
        env.tera.add_raw_template(name, source)?;
        env.sources.insert(name.to_string(), source.to_string());
        Ok(())
    }

    /// Whether an environment can resolve a template name.
    #[must_use]
    pub fn contains(&self, kind: TemplateKind, name: &str) -> bool {
        self.environment(kind).resolve(name).is_ok()
    }

    /// Renders a named template.
    ///
    /// # Errors
    ///
    /// Returns `InvalidReference` for unknown names, or the template error.
    pub fn render(&self, kind: TemplateKind, name: &str, context: &Context) -> Result<String> {
        let env = self.environment(kind);
        let resolved = env.resolve(name)?;
        Ok(env.tera.render(&resolved, context)?)
    }

    /// Renders a template source string within an environment, so it can
    /// include or extend the environment's templates.
    ///
    /// # Errors
    ///
    /// Returns the template error if parsing or rendering fails.
    pub fn render_str(&self, kind: TemplateKind, source: &str, context: &Context) -> Result<String> {
        let env = self.environment(kind);
        if !env.needs_environment(source) {
            return Ok(Tera::one_off(source, context, false)?);
        }
        let mut tera = env.tera.clone();
        Ok(tera.render_str(source, context)?)
    }

    /// Raw source of a named template, without rendering.
    ///
    /// Names resolve the same way as for [`Templates::render`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidReference` if the template cannot be found.
    pub fn source(&self, kind: TemplateKind, name: &str) -> Result<String> {
        let env = self.environment(kind);
        let resolved = env.resolve(name)?;
        if let Some(source) = env.sources.get(&resolved) {
            return Ok(source.clone());
        }
        match &env.dir {
            Some(dir) => Ok(std::fs::read_to_string(dir.join(&resolved))?),
            None => Err(Error::InvalidReference(format!("template '{name}' not found"))),
        }
    }

    const fn environment(&self, kind: TemplateKind) -> &Environment {
        match kind {
            TemplateKind::Html => &self.html,
            TemplateKind::Text => &self.text,
            TemplateKind::HtmlTable => &self.html_table,
            TemplateKind::TextTable => &self.text_table,
        }
    }

    const fn environment_mut(&mut self, kind: TemplateKind) -> &mut Environment {
        match kind {
            TemplateKind::Html => &mut self.html,
            TemplateKind::Text => &mut self.text,
            TemplateKind::HtmlTable => &mut self.html_table,
            TemplateKind::TextTable => &mut self.text_table,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_builtin_themes() {
        let templates = Templates::new().unwrap();
        assert!(templates.contains(TemplateKind::HtmlTable, "modest"));
        assert!(templates.contains(TemplateKind::HtmlTable, "modest.html"));
        assert!(templates.contains(TemplateKind::TextTable, "pandas"));
        assert!(!templates.contains(TemplateKind::Html, "modest"));
    }

    #[test]
    fn test_render_str_does_not_escape() {
        let templates = Templates::new().unwrap();
        let mut context = Context::new();
        context.insert("img", "<img src=\"cid:1\">");
        let rendered = templates
            .render_str(TemplateKind::Html, "<p>{{ img }}</p>", &context)
            .unwrap();
        assert_eq!(rendered, "<p><img src=\"cid:1\"></p>");
    }

    #[test]
    fn test_source_of_added_template() {
        let mut templates = Templates::new().unwrap();
        templates
            .add_template(TemplateKind::Text, "welcome.txt", "Hi {{ name }}")
            .unwrap();
        assert_eq!(
            templates.source(TemplateKind::Text, "welcome.txt").unwrap(),
            "Hi {{ name }}"
        );
        assert_eq!(templates.source(TemplateKind::Text, "welcome").unwrap(), "Hi {{ name }}");
        assert_eq!(
            templates.source(TemplateKind::HtmlTable, "modest").unwrap(),
            MODEST_HTML
        );
        assert!(matches!(
            templates.source(TemplateKind::Text, "missing").unwrap_err(),
            Error::InvalidReference(_)
        ));
    }

    #[test]
    fn test_render_str_includes_added_template() {
        let mut templates = Templates::new().unwrap();
        templates
            .add_template(TemplateKind::Html, "part.html", "<b>{{ name }}</b>")
            .unwrap();
        let mut context = Context::new();
        context.insert("name", "Ada");
        let rendered = templates
            .render_str(TemplateKind::Html, "<p>{% include \"part.html\" %}</p>", &context)
            .unwrap();
        assert_eq!(rendered, "<p><b>Ada</b></p>");
    }

    #[test]
    fn test_unknown_template() {
        let templates = Templates::new().unwrap();
        let err = templates
            .render(TemplateKind::Text, "missing.txt", &Context::new())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidReference(_)));
    }

    #[test]
    fn test_set_template_paths() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("report.html"), "<h1>{{ title }}</h1>").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/part.html"), "<p>{{ title }}</p>").unwrap();

        let mut templates = Templates::new().unwrap();
        templates
            .set_template_paths(Some(dir.path()), None, None, None)
            .unwrap();

        let mut context = Context::new();
        context.insert("title", "Report");
        assert_eq!(
            templates.render(TemplateKind::Html, "report.html", &context).unwrap(),
            "<h1>Report</h1>"
        );
        assert_eq!(
            templates.render(TemplateKind::Html, "nested/part.html", &context).unwrap(),
            "<p>Report</p>"
        );
        assert_eq!(
            templates.source(TemplateKind::Html, "report.html").unwrap(),
            "<h1>{{ title }}</h1>"
        );
        assert_eq!(
            templates.source(TemplateKind::Html, "nested/part").unwrap(),
            "<p>{{ title }}</p>"
        );
    }

    #[test]
    fn test_table_directory_keeps_builtins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("plain.html"), "{{ table.text }}").unwrap();

        let mut templates = Templates::new().unwrap();
        templates
            .set_template_paths(None, None, Some(dir.path()), None)
            .unwrap();
        assert!(templates.contains(TemplateKind::HtmlTable, "plain"));
        assert!(templates.contains(TemplateKind::HtmlTable, "modest"));
    }

    #[test]
    fn test_missing_directory() {
        let mut templates = Templates::new().unwrap();
        let err = templates
            .set_template_paths(Some(Path::new("/definitely/not/here")), None, None, None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidReference(_)));
    }
}
