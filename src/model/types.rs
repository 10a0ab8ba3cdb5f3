use std::fmt;

use serde::{Deserialize, Serialize};

/// Language every non-English pair is routed through.
pub const PIVOT_LANGUAGE: &str = "en";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LanguagePair {
    pub from: String,
    pub to: String,
}

impl LanguagePair {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Registry key, e.g. `"ende"`.
    pub fn key(&self) -> String {
        format!("{}{}", self.from, self.to)
    }

    pub fn involves_pivot(&self) -> bool {
        self.from == PIVOT_LANGUAGE || self.to == PIVOT_LANGUAGE
    }

    /// Models needed to serve this pair, in translation order.
    pub fn hops(&self) -> Vec<LanguagePair> {
        if self.involves_pivot() {
            vec![self.clone()]
        } else {
            vec![
                LanguagePair::new(self.from.clone(), PIVOT_LANGUAGE),
                LanguagePair::new(PIVOT_LANGUAGE, self.to.clone()),
            ]
        }
    }
}

impl fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)
    }
}
