//! Locators: lazy references to DOM elements.
//!
//! A [`Locator`] is a pure description. It never holds a resolved element;
//! every driver call re-runs the query, because the DOM can change between
//! two operations on the same locator.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// How to find elements
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// CSS selector (e.g., "button.primary")
    Css(String),
    /// Test ID selector (data-testid attribute)
    TestId(String),
    /// Innermost elements whose text contains the string
    Text(String),
    /// Form control labelled by the string (label element or aria-label)
    Label(String),
    /// ARIA role with an optional accessible name filter
    Role {
        /// Role name (button, link, heading, textbox, ...)
        role: String,
        /// Substring of the accessible name
        name: Option<String>,
    },
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create a test ID selector
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId(id.into())
    }

    /// Create a text selector
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a label selector
    #[must_use]
    pub fn label(text: impl Into<String>) -> Self {
        Self::Label(text.into())
    }

    /// Create a role selector
    #[must_use]
    pub fn role(role: impl Into<String>, name: Option<&str>) -> Self {
        Self::Role {
            role: role.into(),
            name: name.map(str::to_string),
        }
    }

    /// JavaScript expression yielding an `Array` of matches under `root`
    #[must_use]
    pub fn to_query(&self) -> String {
        match self {
            Self::Css(s) => format!("Array.from(root.querySelectorAll({s:?}))"),
            Self::TestId(id) => {
                let css = format!("[data-testid={id:?}]");
                format!("Array.from(root.querySelectorAll({css:?}))")
            }
            Self::Text(t) => format!(
                "Array.from(root.querySelectorAll('*')).filter(el => \
                 (el.innerText || el.textContent || '').includes({t:?}) && \
                 !Array.from(el.children).some(c => (c.innerText || c.textContent || '').includes({t:?})))"
            ),
            Self::Label(t) => format!(
                "Array.from(root.querySelectorAll('label')).filter(l => l.textContent.trim().includes({t:?})) \
                 .map(l => l.control).filter(Boolean) \
                 .concat(Array.from(root.querySelectorAll('[aria-label]')).filter(el => el.getAttribute('aria-label').includes({t:?})))"
            ),
            Self::Role { role, name } => {
                let css = implicit_role_css(role);
                let base = format!("Array.from(root.querySelectorAll({css:?}))");
                match name {
                    Some(n) => format!(
                        "{base}.filter(el => (el.getAttribute('aria-label') || el.innerText || el.value || '').trim().includes({n:?}))"
                    ),
                    None => base,
                }
            }
        }
    }
}

fn implicit_role_css(role: &str) -> String {
    match role {
        "button" => {
            "button, input[type=submit], input[type=button], [role=button]".to_string()
        }
        "link" => "a[href], [role=link]".to_string(),
        "heading" => "h1, h2, h3, h4, h5, h6, [role=heading]".to_string(),
        "textbox" => "input:not([type]), input[type=text], input[type=email], \
                      input[type=password], textarea, [role=textbox]"
            .to_string(),
        "checkbox" => "input[type=checkbox], [role=checkbox]".to_string(),
        other => format!("[role={other:?}]"),
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "css={s}"),
            Self::TestId(id) => write!(f, "testid={id}"),
            Self::Text(t) => write!(f, "text={t:?}"),
            Self::Label(t) => write!(f, "label={t:?}"),
            Self::Role { role, name: None } => write!(f, "role={role}"),
            Self::Role {
                role,
                name: Some(n),
            } => write!(f, "role={role}[name={n:?}]"),
        }
    }
}

/// Immutable, re-evaluated reference to zero or more elements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    selector: Selector,
    alternatives: Vec<Selector>,
    parent: Option<Arc<Locator>>,
    nth: Option<usize>,
}

impl Locator {
    /// Locator for a selector
    #[must_use]
    pub const fn new(selector: Selector) -> Self {
        Self {
            selector,
            alternatives: Vec::new(),
            parent: None,
            nth: None,
        }
    }

    /// Shorthand for a CSS locator
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::new(Selector::css(selector))
    }

    /// Shorthand for a test-id locator
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::new(Selector::test_id(id))
    }

    /// Shorthand for a text locator
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Selector::text(text))
    }

    /// Shorthand for a label locator
    #[must_use]
    pub fn label(text: impl Into<String>) -> Self {
        Self::new(Selector::label(text))
    }

    /// Shorthand for a role locator
    #[must_use]
    pub fn role(role: impl Into<String>, name: Option<&str>) -> Self {
        Self::new(Selector::role(role, name))
    }

    /// Add a fallback selector tried when earlier ones match nothing
    #[must_use]
    pub fn or(mut self, alternative: Selector) -> Self {
        self.alternatives.push(alternative);
        self
    }

    /// Scope this locator under the first match of `parent`
    #[must_use]
    pub fn within(mut self, parent: &Self) -> Self {
        self.parent = Some(Arc::new(parent.clone()));
        self
    }

    /// Child locator scoped under this one
    #[must_use]
    pub fn locator(&self, selector: Selector) -> Self {
        Self::new(selector).within(self)
    }

    /// Restrict to the n-th match (zero-based)
    #[must_use]
    pub fn nth(mut self, index: usize) -> Self {
        self.nth = Some(index);
        self
    }

    /// Restrict to the first match
    #[must_use]
    pub fn first(self) -> Self {
        self.nth(0)
    }

    /// Primary selector
    #[must_use]
    pub const fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Primary selector followed by fallbacks, in priority order
    pub fn selectors(&self) -> impl Iterator<Item = &Selector> {
        std::iter::once(&self.selector).chain(self.alternatives.iter())
    }

    /// Scope parent, if any
    #[must_use]
    pub fn parent(&self) -> Option<&Self> {
        self.parent.as_deref()
    }

    /// Match index restriction, if any
    #[must_use]
    pub const fn nth_index(&self) -> Option<usize> {
        self.nth
    }

    /// JavaScript expression yielding an `Array` of the current matches
    #[must_use]
    pub fn to_js(&self) -> String {
        let root = match &self.parent {
            Some(parent) => format!("({})[0]", parent.to_js()),
            None => "document".to_string(),
        };
        let finders: Vec<String> = self
            .selectors()
            .map(|s| format!("(root => {})", s.to_query()))
            .collect();
        let pick = match self.nth {
            Some(n) => format!("found.slice({n}, {})", n + 1),
            None => "found".to_string(),
        };
        format!(
            "(() => {{ const root = {root}; if (!root) return []; \
             for (const find of [{}]) {{ const found = find(root); if (found.length) return {pick}; }} \
             return []; }})()",
            finders.join(", ")
        )
    }
}

impl From<Selector> for Locator {
    fn from(selector: Selector) -> Self {
        Self::new(selector)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = &self.parent {
            write!(f, "{parent} >> ")?;
        }
        let parts: Vec<String> = self.selectors().map(ToString::to_string).collect();
        f.write_str(&parts.join(" || "))?;
        if let Some(n) = self.nth {
            write!(f, " >> nth={n}")?;
        }
        Ok(())
    }
}

/// Typed family of per-record locators, e.g. one row per post id.
///
/// The id type is part of the family's type, so a `UserId` cannot be used
/// to address a post row.
#[derive(Debug)]
pub struct TestIdFamily<Id> {
    prefix: &'static str,
    _id: PhantomData<fn(&Id)>,
}

impl<Id> Clone for TestIdFamily<Id> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Id> Copy for TestIdFamily<Id> {}

impl<Id: fmt::Display> TestIdFamily<Id> {
    /// Family whose members have test id `{prefix}{id}`
    #[must_use]
    pub const fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            _id: PhantomData,
        }
    }

    /// Locator for one member
    #[must_use]
    pub fn at(&self, id: &Id) -> Locator {
        Locator::test_id(format!("{}{id}", self.prefix))
    }

    /// Locator matching every member
    #[must_use]
    pub fn all(&self) -> Locator {
        Locator::css(format!("[data-testid^={:?}]", self.prefix))
    }
}
