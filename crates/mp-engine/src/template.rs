//! Variable substitution for engine command templates.

use std::collections::HashMap;
use std::path::Path;

/// Variable substitution context for engine argument templates.
///
/// Supports variable substitution in strings using the `{varname}` syntax.
///
/// # Example
///
/// ```
/// use mp_engine::TemplateContext;
///
/// let ctx = TemplateContext::new()
///     .with_names("input0.mp4", "holiday-compressed.mp4", "holiday.mp4");
///
/// let args = ctx.substitute_all(&["-i".into(), "{input}".into(), "{output}".into()]);
/// assert_eq!(args, vec!["-i", "input0.mp4", "holiday-compressed.mp4"]);
/// assert_eq!(ctx.substitute("{filestem}"), "holiday");
/// ```
#[derive(Debug, Clone)]
pub struct TemplateContext {
    vars: HashMap<String, String>,
}

impl TemplateContext {
    /// Create a new empty template context.
    pub fn new() -> Self {
        Self {
            vars: HashMap::new(),
        }
    }

    /// Set the scratch names and describe the original file.
    ///
    /// This adds the following variables:
    /// - `{input}` - scratch name of the engine input
    /// - `{output}` - scratch name the engine should write
    /// - `{filename}` - original file name with extension
    /// - `{filestem}` - original file name without extension
    /// - `{extension}` - original file extension
    pub fn with_names(mut self, input: &str, output: &str, original: &str) -> Self {
        self.set("input", input);
        self.set("output", output);
        self.set("filename", original);

        let original = Path::new(original);
        if let Some(stem) = original.file_stem() {
            self.set("filestem", &stem.to_string_lossy());
        }
        if let Some(ext) = original.extension() {
            self.set("extension", &ext.to_string_lossy());
        }

        self
    }

    /// Add a custom variable.
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.set(key, value);
        self
    }

    /// Set a variable.
    pub fn set(&mut self, key: &str, value: &str) {
        self.vars.insert(key.to_string(), value.to_string());
    }

    /// Get a variable value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(|s| s.as_str())
    }

    /// Substitute variables in a string.
    ///
    /// Single pass: a substituted value is never itself re-expanded, so a
    /// file named `{output}.mp4` stays literal.
    pub fn substitute(&self, template: &str) -> String {
        let mut result = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find('{') {
            result.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            match after.find('}') {
                Some(end) => {
                    let key = &after[..end];
                    match self.vars.get(key) {
                        Some(value) => result.push_str(value),
                        None => {
                            result.push('{');
                            result.push_str(key);
                            result.push('}');
                        }
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    result.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        result.push_str(rest);
        result
    }

    /// Substitute variables in a list of strings.
    pub fn substitute_all(&self, templates: &[String]) -> Vec<String> {
        templates.iter().map(|t| self.substitute(t)).collect()
    }
}

impl Default for TemplateContext {
    fn default() -> Self {
        Self::new()
    }
}
