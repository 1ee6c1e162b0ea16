use std::sync::LazyLock;
use regex::{Captures, Regex};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^}]*)\}").expect("placeholder pattern is valid")
});

/// Values substituted for the `${...}` tokens of a manifest template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderContext {
    pub version: String,
    pub platform: String,
    pub x_platform: String,
    pub output: String,
}

impl RenderContext {
    fn lookup(&self, token: &str) -> Option<&str> {
        match token.trim() {
            "version" => Some(&self.version),
            "platform" => Some(&self.platform),
            "x-platform" => Some(&self.x_platform),
            "output" => Some(&self.output),
            _ => None,
        }
    }

    /// The same values, each quoted for a command line that is later split
    /// with POSIX shell rules.
    pub fn shell_quoted(&self) -> RenderContext {
        let quote = |value: &str| shell_words::quote(value).into_owned();
        RenderContext {
            version: quote(&self.version),
            platform: quote(&self.platform),
            x_platform: quote(&self.x_platform),
            output: quote(&self.output),
        }
    }

    /// Substitutes every recognized token. Unknown tokens are left untouched
    /// so callers can detect them with [`find_placeholder`].
    pub fn render(&self, input: &str) -> String {
        PLACEHOLDER
            .replace_all(input, |caps: &Captures| match self.lookup(&caps[1]) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Renders every string inside a TOML value tree in place.
    ///
    /// Returns whether anything changed.
    pub fn render_value(&self, value: &mut toml::Value) -> bool {
        match value {
            toml::Value::String(s) => {
                let rendered = self.render(s);
                let changed = rendered != *s;
                *s = rendered;
                changed
            }
            toml::Value::Array(items) => items
                .iter_mut()
                .fold(false, |changed, item| self.render_value(item) || changed),
            toml::Value::Table(table) => table
                .iter_mut()
                .fold(false, |changed, (_, item)| self.render_value(item) || changed),
            _ => false,
        }
    }
}

/// Returns the first `${...}` token found in `input`.
pub fn find_placeholder(input: &str) -> Option<&str> {
    PLACEHOLDER.find(input).map(|m| m.as_str())
}

/// Returns the first `${...}` token found anywhere in a TOML value tree.
pub fn find_placeholder_in(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => find_placeholder(s).map(str::to_string),
        toml::Value::Array(items) => items.iter().find_map(find_placeholder_in),
        toml::Value::Table(table) => table.values().find_map(find_placeholder_in),
        _ => None,
    }
}
