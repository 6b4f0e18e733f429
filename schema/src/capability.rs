//! Capability strings and the predicates that select packet variants.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A parsed capability string.
///
/// Tokens are separated by whitespace or commas. A leading `+` marks a token
/// as mandatory; it is stored without the marker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    tokens: BTreeSet<String>,
    mandatory: BTreeSet<String>,
}

impl Capabilities {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut caps = Self::default();
        for token in raw
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
        {
            match token.strip_prefix('+') {
                Some("") => {}
                Some(name) => {
                    caps.mandatory.insert(name.to_owned());
                    caps.tokens.insert(name.to_owned());
                }
                None => {
                    caps.tokens.insert(token.to_owned());
                }
            }
        }
        caps
    }

    /// Returns `true` if `flag` is one of the tokens.
    #[must_use]
    pub fn has(&self, flag: &str) -> bool {
        self.tokens.contains(flag)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    pub fn mandatory(&self) -> impl Iterator<Item = &str> {
        self.mandatory.iter().map(String::as_str)
    }

    /// Our mandatory tokens the peer does not advertise.
    #[must_use]
    pub fn missing_mandatory<'a>(&'a self, peer: &Self) -> Vec<&'a str> {
        self.mandatory().filter(|flag| !peer.has(flag)).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl FromStr for Capabilities {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for token in &self.tokens {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            if self.mandatory.contains(token) {
                f.write_str("+")?;
            }
            f.write_str(token)?;
        }
        Ok(())
    }
}

/// Local and peer capabilities of one connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NegotiatedCaps {
    pub local: Capabilities,
    pub peer: Capabilities,
}

impl NegotiatedCaps {
    #[must_use]
    pub const fn new(local: Capabilities, peer: Capabilities) -> Self {
        Self { local, peer }
    }

    /// Both sides advertise `flag`.
    #[must_use]
    pub fn shared(&self, flag: &str) -> bool {
        self.local.has(flag) && self.peer.has(flag)
    }
}

/// Boolean expression over negotiated capabilities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CapPredicate {
    #[default]
    Always,
    /// Both local and peer advertise the flag.
    Has(String),
    LocalHas(String),
    PeerHas(String),
    Not(Box<CapPredicate>),
    All(Vec<CapPredicate>),
    Any(Vec<CapPredicate>),
}

impl CapPredicate {
    #[must_use]
    pub fn has(flag: impl Into<String>) -> Self {
        Self::Has(flag.into())
    }

    #[must_use]
    pub fn lacks(flag: impl Into<String>) -> Self {
        Self::Not(Box::new(Self::has(flag)))
    }

    #[must_use]
    pub fn evaluate(&self, caps: &NegotiatedCaps) -> bool {
        match self {
            Self::Always => true,
            Self::Has(flag) => caps.shared(flag),
            Self::LocalHas(flag) => caps.local.has(flag),
            Self::PeerHas(flag) => caps.peer.has(flag),
            Self::Not(inner) => !inner.evaluate(caps),
            Self::All(all) => all.iter().all(|p| p.evaluate(caps)),
            Self::Any(any) => any.iter().any(|p| p.evaluate(caps)),
        }
    }
}
