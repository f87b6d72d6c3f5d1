use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of plugin categories a pipeline can be assembled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Loader,
    Embedder,
    Retriever,
    Reranker,
    Generator,
    Evaluator,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Loader,
        Category::Embedder,
        Category::Retriever,
        Category::Reranker,
        Category::Generator,
        Category::Evaluator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Loader => "loader",
            Category::Embedder => "embedder",
            Category::Retriever => "retriever",
            Category::Reranker => "reranker",
            Category::Generator => "generator",
            Category::Evaluator => "evaluator",
        }
    }

    /// Comma-separated list of every category name, for diagnostics.
    pub fn names() -> String {
        Self::ALL
            .iter()
            .map(Category::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("Unknown plugin category '{}'; expected one of {}", s, Self::names()))
    }
}
