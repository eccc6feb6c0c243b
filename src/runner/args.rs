use std::borrow::Cow;

/// Bare toggle the user may pick from a flag menu.
pub const COLOR_TOGGLE: &str = "--colors";
pub const COLOR_ON: &str = "--colors=true";
pub const COLOR_OFF: &str = "--colors=false";

/// An option whose value must be trimmed and shell-quoted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotedOption {
    pub prefix: String,
    /// `true` emits `prefix'value'`, `false` emits `prefix 'value'`.
    pub joined: bool,
}

impl QuotedOption {
    pub fn separate(prefix: &str) -> Self {
        Self { prefix: prefix.to_string(), joined: false }
    }

    pub fn joined(prefix: &str) -> Self {
        Self { prefix: prefix.to_string(), joined: true }
    }

    fn rewrite(&self, token: &str) -> Option<String> {
        let value = token.strip_prefix(self.prefix.as_str())?;
        let quoted = quote_once(value.trim());
        Some(if self.joined {
            format!("{}{}", self.prefix, quoted)
        } else {
            format!("{} {}", self.prefix, quoted)
        })
    }
}

/// Normalizes flag tokens picked by the user into the form Jest expects.
///
/// The transform is total: tokens it does not recognise are passed through
/// unchanged and in order, so newer Jest flags keep working.
#[derive(Debug, Clone)]
pub struct ArgumentTransformer {
    quoted: Vec<QuotedOption>,
}

impl Default for ArgumentTransformer {
    fn default() -> Self {
        Self {
            quoted: vec![
                QuotedOption::separate("-t"),
                QuotedOption::joined("--testPathPattern="),
            ],
        }
    }
}

impl ArgumentTransformer {
    pub fn transform(&self, flags: &[String]) -> Vec<String> {
        let merged = self.merge_separate(flags);
        pin_colors(&merged)
            .into_iter()
            .map(|token| self.quote_values(token))
            .collect()
    }

    /// A separate option given as two tokens (`-t`, `adds items`) becomes
    /// one token, the form the rest of the transform works on.
    fn merge_separate(&self, flags: &[String]) -> Vec<String> {
        let mut out = Vec::with_capacity(flags.len());
        let mut tokens = flags.iter();
        while let Some(token) = tokens.next() {
            let bare = self.quoted.iter().any(|o| !o.joined && o.prefix == *token);
            match tokens.as_slice().first() {
                Some(value) if bare => {
                    out.push(format!("{} {}", token, value));
                    tokens.next();
                }
                _ => out.push(token.clone()),
            }
        }
        out
    }

    fn quote_values(&self, token: String) -> String {
        self.quoted
            .iter()
            .find_map(|option| option.rewrite(&token))
            .unwrap_or(token)
    }
}

/// Jest guesses colour support from the TTY, which is wrong inside a
/// captured session, so the mode is always spelled out.
fn pin_colors(flags: &[String]) -> Vec<String> {
    let mut explicit = false;
    let mut out: Vec<String> = flags
        .iter()
        .map(|token| {
            if token == COLOR_TOGGLE {
                explicit = true;
                COLOR_ON.to_string()
            } else {
                if token.starts_with("--colors=") {
                    explicit = true;
                }
                token.clone()
            }
        })
        .collect();
    if !explicit {
        out.push(COLOR_OFF.to_string());
    }
    out
}

/// Shell-quote `value` unless it already is exactly one quoted word.
pub fn quote_once(value: &str) -> Cow<'_, str> {
    if let Ok(words) = shell_words::split(value) {
        if let [word] = words.as_slice() {
            if shell_words::quote(word) == value {
                return Cow::Borrowed(value);
            }
        }
    }
    shell_words::quote(value)
}
