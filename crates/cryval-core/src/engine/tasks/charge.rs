use crate::core::models::composition::Composition;
use crate::engine::config::{ChargeConfig, ChargePolicy};
use std::collections::BTreeMap;
use std::fmt::Write;
use tracing::debug;

// Depth-first search over one state per element grows exponentially with the element count.
const MAX_SEARCH_ELEMENTS: usize = 12;

#[derive(Debug, Clone, PartialEq)]
pub enum UncheckedReason {
    /// Species without any known oxidation state.
    MissingStates(Vec<String>),
    TooManyElements(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChargeOutcome {
    Balanced {
        /// One oxidation state per element, when the policy produces a concrete assignment.
        assignment: Option<BTreeMap<String, i8>>,
        residual: f64,
    },
    Imbalanced {
        residual: Option<f64>,
    },
    Unchecked(UncheckedReason),
}

impl ChargeOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Balanced { .. } => "balanced",
            Self::Imbalanced { .. } => "imbalanced",
            Self::Unchecked(_) => "unchecked",
        }
    }

    /// Renders the assignment as `Fe:+3;O:-2`.
    pub fn solution(&self) -> Option<String> {
        let Self::Balanced {
            assignment: Some(assignment),
            ..
        } = self
        else {
            return None;
        };
        let mut out = String::new();
        for (i, (symbol, state)) in assignment.iter().enumerate() {
            if i > 0 {
                out.push(';');
            }
            let _ = write!(out, "{symbol}:{state:+}");
        }
        Some(out)
    }
}

struct Term<'a> {
    symbol: &'a str,
    amount: f64,
    states: &'a [i8],
}

/// Assesses whether the occupancy-weighted composition can be charge neutral.
///
/// Elements missing from the oxidation-state table leave the structure unchecked
/// rather than imbalanced.
pub fn run(composition: &Composition, config: &ChargeConfig) -> ChargeOutcome {
    let mut missing = Vec::new();
    let mut terms = Vec::with_capacity(composition.num_elements());
    for (symbol, amount) in composition.iter() {
        match config.states(symbol) {
            Some(states) if !states.is_empty() => terms.push(Term {
                symbol,
                amount,
                states,
            }),
            _ => missing.push(symbol.to_string()),
        }
    }
    if !missing.is_empty() {
        debug!(?missing, "Charge check skipped: no oxidation states");
        return ChargeOutcome::Unchecked(UncheckedReason::MissingStates(missing));
    }

    let tolerance = config.tolerance;
    match config.policy {
        ChargePolicy::Search => search(terms, tolerance),
        ChargePolicy::FirstState => first_state(&terms, tolerance),
        ChargePolicy::Wildcard => wildcard(&terms, tolerance),
    }
}

fn first_state(terms: &[Term], tolerance: f64) -> ChargeOutcome {
    let residual: f64 = terms
        .iter()
        .map(|t| t.amount * f64::from(t.states[0]))
        .sum();
    if residual.abs() <= tolerance {
        ChargeOutcome::Balanced {
            assignment: Some(
                terms
                    .iter()
                    .map(|t| (t.symbol.to_string(), t.states[0]))
                    .collect(),
            ),
            residual,
        }
    } else {
        ChargeOutcome::Imbalanced {
            residual: Some(residual),
        }
    }
}

fn state_range(term: &Term) -> (f64, f64) {
    let lo = term.states.iter().copied().min().unwrap_or(0);
    let hi = term.states.iter().copied().max().unwrap_or(0);
    (term.amount * f64::from(lo), term.amount * f64::from(hi))
}

fn wildcard(terms: &[Term], tolerance: f64) -> ChargeOutcome {
    let (lo, hi) = terms.iter().map(state_range).fold((0.0, 0.0), |(lo, hi), (a, b)| {
        (lo + a, hi + b)
    });
    let offset = if lo > 0.0 {
        lo
    } else if hi < 0.0 {
        hi
    } else {
        0.0
    };
    if offset.abs() <= tolerance {
        ChargeOutcome::Balanced {
            assignment: None,
            residual: offset,
        }
    } else {
        ChargeOutcome::Imbalanced {
            residual: Some(offset),
        }
    }
}

fn search(mut terms: Vec<Term>, tolerance: f64) -> ChargeOutcome {
    if terms.len() > MAX_SEARCH_ELEMENTS {
        return ChargeOutcome::Unchecked(UncheckedReason::TooManyElements(terms.len()));
    }

    // Largest amounts first so infeasible branches are cut early.
    terms.sort_by(|a, b| {
        b.amount
            .total_cmp(&a.amount)
            .then_with(|| a.symbol.cmp(b.symbol))
    });

    let n = terms.len();
    let mut min_tail = vec![0.0; n + 1];
    let mut max_tail = vec![0.0; n + 1];
    for i in (0..n).rev() {
        let (lo, hi) = state_range(&terms[i]);
        min_tail[i] = min_tail[i + 1] + lo;
        max_tail[i] = max_tail[i + 1] + hi;
    }

    let mut chosen = vec![0i8; n];
    let solver = NeutralitySearch {
        terms: &terms,
        min_tail: &min_tail,
        max_tail: &max_tail,
        tolerance,
    };
    match solver.descend(0, 0.0, &mut chosen) {
        Some(residual) => ChargeOutcome::Balanced {
            assignment: Some(
                terms
                    .iter()
                    .zip(&chosen)
                    .map(|(t, &s)| (t.symbol.to_string(), s))
                    .collect(),
            ),
            residual,
        },
        None => ChargeOutcome::Imbalanced { residual: None },
    }
}

struct NeutralitySearch<'a> {
    terms: &'a [Term<'a>],
    min_tail: &'a [f64],
    max_tail: &'a [f64],
    tolerance: f64,
}

impl NeutralitySearch<'_> {
    fn descend(&self, index: usize, acc: f64, chosen: &mut [i8]) -> Option<f64> {
        if index == self.terms.len() {
            return (acc.abs() <= self.tolerance).then_some(acc);
        }
        if acc + self.min_tail[index] > self.tolerance || acc + self.max_tail[index] < -self.tolerance
        {
            return None;
        }
        let term = &self.terms[index];
        for &state in term.states {
            chosen[index] = state;
            if let Some(residual) = self.descend(index + 1, acc + term.amount * f64::from(state), chosen)
            {
                return Some(residual);
            }
        }
        None
    }
}
