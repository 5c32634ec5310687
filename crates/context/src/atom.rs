//! The atom store: every reusable piece of prompt text the compiler can
//! choose to include, keyed by atom-id.

use rustc_hash::FxHashMap;

/// Declared prompt categories, in the order they're assembled into the
/// final prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Identity,
    Protocol,
    Safety,
    Methodology,
    Language,
    Framework,
    HallucinationWard,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Identity => "identity",
            Category::Protocol => "protocol",
            Category::Safety => "safety",
            Category::Methodology => "methodology",
            Category::Language => "language",
            Category::Framework => "framework",
            Category::HallucinationWard => "hallucination_ward",
        }
    }

    /// The fraction of the total token budget reserved for this category.
    /// Sums to 1.0 across all seven categories.
    pub fn default_budget_share(&self) -> f64 {
        match self {
            Category::Identity => 0.10,
            Category::Protocol => 0.15,
            Category::Safety => 0.20,
            Category::Methodology => 0.20,
            Category::Language => 0.15,
            Category::Framework => 0.15,
            Category::HallucinationWard => 0.05,
        }
    }

    pub fn all() -> [Category; 7] {
        [
            Category::Identity,
            Category::Protocol,
            Category::Safety,
            Category::Methodology,
            Category::Language,
            Category::Framework,
            Category::HallucinationWard,
        ]
    }
}

#[derive(Clone, Debug)]
pub struct Atom {
    pub id: String,
    pub category: Category,
    pub content: String,
    pub priority: f64,
    pub is_mandatory: bool,
    pub depends_on: Vec<String>,
    pub conflicts_with: Vec<String>,
    pub selectors: Vec<String>,
    pub embedding: Vec<f32>,
}

impl Atom {
    /// A rough word-count proxy for token cost. Good enough for budgeting
    /// without pulling in a tokenizer just to size prompt fragments.
    pub fn approx_tokens(&self) -> usize {
        self.content.split_whitespace().count().max(1)
    }
}

#[derive(Clone, Debug, Default)]
pub struct AtomStore {
    atoms: FxHashMap<String, Atom>,
}

impl AtomStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, atom: Atom) {
        self.atoms.insert(atom.id.clone(), atom);
    }

    pub fn get(&self, id: &str) -> Option<&Atom> {
        self.atoms.get(id)
    }

    pub fn all(&self) -> impl Iterator<Item = &Atom> {
        self.atoms.values()
    }

    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &Atom> {
        self.atoms.values().filter(move |a| a.category == category)
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }
}
