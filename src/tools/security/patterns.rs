//! Detection patterns, masking and the Luhn check.

use regex::Regex;

/// A kind of personally identifiable information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PiiType {
    Ssn,
    CreditCard,
    Email,
    Phone,
}

impl PiiType {
    /// Every PII type, in scan order.
    pub const ALL: [Self; 4] = [Self::Ssn, Self::CreditCard, Self::Email, Self::Phone];

    /// Wire name, as accepted in `types` and reported in findings.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ssn => "ssn",
            Self::CreditCard => "credit_card",
            Self::Email => "email",
            Self::Phone => "phone",
        }
    }

    /// Parses a wire name, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    const fn pattern(self) -> &'static str {
        match self {
            Self::Ssn => r"\b\d{3}-\d{2}-\d{4}\b",
            Self::CreditCard => r"\b(?:\d[ -]*?){13,19}\b",
            Self::Email => r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            Self::Phone => r"\b(?:\+?1[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b",
        }
    }
}

const SECRET_PATTERNS: &[(&str, &str)] = &[
    ("aws_key", r"AKIA[0-9A-Z]{16}"),
    ("github_token", r"gh[pousr]_[A-Za-z0-9_]{36,}"),
    ("stripe_key", r"(?:sk|pk)_(?:test|live)_[0-9a-zA-Z]{24,}"),
    ("private_key", r"-----BEGIN (?:RSA |EC |DSA )?PRIVATE KEY-----"),
    (
        "generic_api_key",
        r#"(?i)(?:password|secret|token|api_key|apikey)\s*[:=]\s*['"][^'"]{8,}['"]"#,
    ),
];

/// Compiled PII patterns.
#[derive(Debug, Clone)]
pub struct PiiPatterns {
    patterns: Vec<(PiiType, Regex)>,
}

impl PiiPatterns {
    /// Compiles every PII pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern fails to compile.
    pub fn compile() -> Result<Self, regex::Error> {
        let patterns = PiiType::ALL
            .into_iter()
            .map(|t| Regex::new(t.pattern()).map(|re| (t, re)))
            .collect::<Result<_, _>>()?;
        Ok(Self { patterns })
    }

    /// Yields `(type, matched text)` for every validated match in `line`.
    pub fn matches<'a>(
        &'a self,
        line: &'a str,
        types: &'a [PiiType],
    ) -> impl Iterator<Item = (PiiType, &'a str)> + 'a {
        self.patterns
            .iter()
            .filter(move |(t, _)| types.contains(t))
            .flat_map(move |(t, re)| re.find_iter(line).map(move |m| (*t, m.as_str())))
            .filter(|(t, text)| *t != PiiType::CreditCard || luhn_check(text))
    }
}

/// Compiled secret patterns.
#[derive(Debug, Clone)]
pub struct SecretPatterns {
    patterns: Vec<(&'static str, Regex)>,
}

impl SecretPatterns {
    /// Compiles every secret pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern fails to compile.
    pub fn compile() -> Result<Self, regex::Error> {
        let patterns = SECRET_PATTERNS
            .iter()
            .map(|(name, pattern)| Regex::new(pattern).map(|re| (*name, re)))
            .collect::<Result<_, _>>()?;
        Ok(Self { patterns })
    }

    /// Yields `(secret type, matched text)` for every match in `line`.
    pub fn matches<'a>(
        &'a self,
        line: &'a str,
    ) -> impl Iterator<Item = (&'static str, &'a str)> + 'a {
        self.patterns
            .iter()
            .flat_map(move |(name, re)| re.find_iter(line).map(move |m| (*name, m.as_str())))
    }
}

/// Shows only the first and last two characters of a value.
///
/// Values of four characters or fewer are masked entirely.
#[must_use]
pub fn mask_sensitive_value(value: &str) -> String {
    let chars: Vec<char> = value.trim().chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let mut masked = String::with_capacity(chars.len());
    masked.extend(&chars[..2]);
    masked.push_str(&"*".repeat(chars.len() - 4));
    masked.extend(&chars[chars.len() - 2..]);
    masked
}

/// Luhn checksum over the digits of `number`, which must have 13 to 19.
#[must_use]
pub fn luhn_check(number: &str) -> bool {
    let digits: Vec<u32> = number.chars().filter_map(|c| c.to_digit(10)).collect();
    if !(13..=19).contains(&digits.len()) {
        return false;
    }
    let checksum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    checksum % 10 == 0
}
