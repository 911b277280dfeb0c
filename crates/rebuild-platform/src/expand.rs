use std::collections::HashMap;

/// Expands `%NAME%` placeholders against a snapshot of environment variables.
///
/// Names are matched case-insensitively, as Windows does. Unknown names are
/// left in place so the resulting path simply fails to resolve.
#[derive(Debug, Clone, Default)]
pub struct PathExpander {
    vars: HashMap<String, String>,
}

impl PathExpander {
    #[must_use]
    pub fn from_process() -> Self {
        Self::from_vars(
            std::env::vars_os()
                .map(|(k, v)| (k.to_string_lossy().into_owned(), v.to_string_lossy().into_owned())),
        )
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_uppercase(), v.into()))
                .collect(),
        }
    }

    #[must_use]
    pub fn with_var(mut self, name: &str, value: impl Into<String>) -> Self {
        self.vars.insert(name.to_uppercase(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(&name.to_uppercase()).map(String::as_str)
    }

    #[must_use]
    pub fn expand(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(start) = rest.find('%') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];

            let Some(end) = after.find('%') else {
                out.push_str(&rest[start..]);
                return out;
            };

            let name = &after[..end];
            if let Some(value) = (!name.is_empty()).then(|| self.get(name)).flatten() {
                out.push_str(value);
                rest = &after[end + 1..];
            } else {
                out.push('%');
                rest = after;
            }
        }

        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::PathExpander;

    fn expander() -> PathExpander {
        PathExpander::from_vars([
            ("APPDATA", r"C:\Users\dev\AppData\Roaming"),
            ("UserProfile", r"C:\Users\dev"),
        ])
    }

    #[test]
    fn expands_known_variables_case_insensitively() {
        let expander = expander();
        assert_eq!(
            expander.expand(r"%AppData%\Code\User\settings.json"),
            r"C:\Users\dev\AppData\Roaming\Code\User\settings.json"
        );
        assert_eq!(
            expander.expand(r"%USERPROFILE%\.gitconfig"),
            r"C:\Users\dev\.gitconfig"
        );
    }

    #[test]
    fn leaves_unknown_variables_untouched() {
        let expander = expander();
        assert_eq!(
            expander.expand(r"%NOPE%\file.txt"),
            r"%NOPE%\file.txt"
        );
    }

    #[test]
    fn handles_unterminated_and_adjacent_placeholders() {
        let expander = expander();
        assert_eq!(expander.expand("50% done"), "50% done");
        assert_eq!(
            expander.expand(r"%NOPE%%APPDATA%"),
            r"%NOPE%C:\Users\dev\AppData\Roaming"
        );
        assert_eq!(expander.expand("%%"), "%%");
    }

    #[test]
    fn with_var_overrides_existing_value() {
        let expander = expander().with_var("appdata", r"D:\Roaming");
        assert_eq!(expander.get("APPDATA"), Some(r"D:\Roaming"));
    }
}
