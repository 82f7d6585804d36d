//! Positional alias placeholders.
//!
//! Criteria authors refer to aliases by position rather than by name:
//! `%1$s` is the root alias, `%2$s` the next one, and so on. Substitution
//! never fails loudly; a template that cannot be expanded comes back
//! unchanged and the caller decides what that means.

/// Outcome of a placeholder substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Substitution {
    /// Every placeholder was expanded.
    Resolved(String),
    /// Substitution did not apply; carries the original template.
    Unchanged(String),
}

impl Substitution {
    /// Returns true if substitution applied.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Substitution::Resolved(_))
    }

    /// Returns the resolved text, or `None` if substitution did not apply.
    #[must_use]
    pub fn resolved(self) -> Option<String> {
        match self {
            Substitution::Resolved(s) => Some(s),
            Substitution::Unchanged(_) => None,
        }
    }

    /// Returns the resolved text, falling back to the original template.
    #[must_use]
    pub fn into_string(self) -> String {
        match self {
            Substitution::Resolved(s) | Substitution::Unchanged(s) => s,
        }
    }
}

/// Expands `%k$s`, `%s` and `%%` in `template` against `aliases`.
///
/// `%k$s` is `aliases[k - 1]`, `%s` takes aliases in order and `%%` is a
/// literal percent sign. Anything else after a `%`, or an index past the end
/// of the alias list, leaves the template unchanged.
#[must_use]
pub fn substitute(template: &str, aliases: &[String]) -> Substitution {
    match expand(template, aliases) {
        Some(resolved) => Substitution::Resolved(resolved),
        None => Substitution::Unchanged(template.to_string()),
    }
}

fn expand(template: &str, aliases: &[String]) -> Option<String> {
    if !template.contains('%') {
        return Some(template.to_string());
    }

    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut next_arg = 0usize;

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        match chars.next()? {
            '%' => out.push('%'),
            's' => {
                out.push_str(aliases.get(next_arg)?);
                next_arg += 1;
            }
            d @ '1'..='9' => {
                let mut index = d.to_digit(10)? as usize;
                while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
                    index = index.checked_mul(10)?.checked_add(digit as usize)?;
                    chars.next();
                }
                if chars.next()? != '$' || chars.next()? != 's' {
                    return None;
                }
                out.push_str(aliases.get(index - 1)?);
            }
            _ => return None,
        }
    }

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aliases(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_positional() {
        let list = aliases(&["User", "Role"]);
        assert_eq!(
            substitute("%1$s.%2$s", &list),
            Substitution::Resolved("User.Role".into())
        );
        assert_eq!(
            substitute("%1$s = %2$s.%1$s", &list),
            Substitution::Resolved("User = Role.User".into())
        );
    }

    #[test]
    fn test_out_of_range_is_unchanged() {
        let list = aliases(&["User"]);
        assert_eq!(
            substitute("%1$s.%2$s", &list),
            Substitution::Unchanged("%1$s.%2$s".into())
        );
    }

    #[test]
    fn test_sequential_and_escape() {
        let list = aliases(&["a", "b"]);
        assert_eq!(substitute("%s/%s 100%%", &list).into_string(), "a/b 100%");
    }

    #[test]
    fn test_malformed_is_unchanged() {
        let list = aliases(&["u"]);
        for template in ["%0$s", "%1$d", "Name LIKE '%abc'", "dangling %", "%1"] {
            assert!(!substitute(template, &list).is_resolved(), "{template}");
        }
    }

    #[test]
    fn test_plain_text_resolves_to_itself() {
        assert_eq!(
            substitute("u.Id = ?1", &[]),
            Substitution::Resolved("u.Id = ?1".into())
        );
    }

    #[test]
    fn test_multi_digit_index() {
        let list: Vec<String> = (1..=12).map(|i| format!("a{i}")).collect();
        assert_eq!(substitute("%12$s", &list).into_string(), "a12");
    }
}
