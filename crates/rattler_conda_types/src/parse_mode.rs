/// Defines how strict a parser should behave.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ParseStrictness {
    /// Allows guessing the users intent.
    Lenient,

    /// Very strictly follow parsing rules.
    Strict,
}

/// Options that control how a [`crate::MatchSpec`]/[`crate::NamelessMatchSpec`]
/// is parsed, beyond the base [`ParseStrictness`].
///
/// Constructed either from a bare [`ParseStrictness`] (via [`From`], which
/// keeps the historical default of only allowing exact package names and
/// disabling the still-experimental `extras`/`when` bracket keys) or through
/// the builder methods to opt into those features.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ParseMatchSpecOptions {
    strictness: ParseStrictness,
    exact_names_only: bool,
    experimental_extras: bool,
    experimental_conditionals: bool,
}

impl Default for ParseMatchSpecOptions {
    fn default() -> Self {
        Self::from(ParseStrictness::Lenient)
    }
}

impl From<ParseStrictness> for ParseMatchSpecOptions {
    fn from(strictness: ParseStrictness) -> Self {
        Self {
            strictness,
            exact_names_only: true,
            experimental_extras: false,
            experimental_conditionals: false,
        }
    }
}

impl ParseMatchSpecOptions {
    /// Shorthand for `ParseMatchSpecOptions::from(ParseStrictness::Strict)`.
    #[must_use]
    pub fn strict() -> Self {
        Self::from(ParseStrictness::Strict)
    }

    /// The base strictness these options were constructed with.
    #[must_use]
    pub fn strictness(&self) -> ParseStrictness {
        self.strictness
    }

    /// Whether package names are restricted to exact matches, i.e. globs and
    /// regexes in the name position are rejected.
    #[must_use]
    pub fn exact_names_only(&self) -> bool {
        self.exact_names_only
    }

    /// Whether the (still experimental) `extras` bracket key is accepted.
    #[must_use]
    pub fn allow_experimental_extras(&self) -> bool {
        self.experimental_extras
    }

    /// Whether the (still experimental) `when` bracket key is accepted.
    #[must_use]
    pub fn allow_experimental_conditionals(&self) -> bool {
        self.experimental_conditionals
    }

    /// Toggles whether package names are restricted to exact matches.
    #[must_use]
    pub fn with_exact_names_only(mut self, exact_names_only: bool) -> Self {
        self.exact_names_only = exact_names_only;
        self
    }

    /// Toggles whether the `extras` bracket key is accepted.
    #[must_use]
    pub fn with_experimental_extras(mut self, allow: bool) -> Self {
        self.experimental_extras = allow;
        self
    }

    /// Toggles whether the `when` bracket key is accepted.
    #[must_use]
    pub fn with_experimental_conditionals(mut self, allow: bool) -> Self {
        self.experimental_conditionals = allow;
        self
    }
}

/// Legacy convenience pair of a [`ParseStrictness`] and an `exact_names_only`
/// flag, predating [`ParseMatchSpecOptions`]. Kept for call sites that only
/// need to toggle name-matcher strictness without reaching for the full
/// builder.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ParseStrictnessWithNameMatcher {
    /// The base strictness to parse with.
    pub parse_strictness: ParseStrictness,
    /// Whether package names are restricted to exact matches.
    pub exact_names_only: bool,
}

impl From<ParseStrictnessWithNameMatcher> for ParseMatchSpecOptions {
    fn from(value: ParseStrictnessWithNameMatcher) -> Self {
        ParseMatchSpecOptions::from(value.parse_strictness)
            .with_exact_names_only(value.exact_names_only)
    }
}
