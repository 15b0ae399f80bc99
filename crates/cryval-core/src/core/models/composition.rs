use crate::core::elements;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// Amounts are quantized to this resolution before GCD reduction.
const AMOUNT_SCALE: f64 = 1000.0;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormulaError {
    #[error("Formula is empty")]
    Empty,
    #[error("Unknown element symbol '{0}'")]
    UnknownElement(String),
    #[error("Unexpected character '{ch}' at position {position}")]
    UnexpectedCharacter { ch: char, position: usize },
    #[error("Unbalanced parentheses")]
    UnbalancedParentheses,
    #[error("Invalid amount '{0}'")]
    InvalidAmount(String),
}

/// Occupancy-weighted element amounts of a structure, keyed by element symbol.
///
/// Symbols are kept in alphabetical order, which is also the order used by
/// [`Composition::reduced_formula`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Composition {
    amounts: BTreeMap<String, f64>,
}

impl Composition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, symbol: &str, amount: f64) {
        *self.amounts.entry(symbol.to_string()).or_insert(0.0) += amount;
    }

    pub fn amount(&self, symbol: &str) -> f64 {
        self.amounts.get(symbol).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.amounts.iter().map(|(s, &a)| (s.as_str(), a))
    }

    pub fn elements(&self) -> impl Iterator<Item = &str> {
        self.amounts.keys().map(String::as_str)
    }

    pub fn num_elements(&self) -> usize {
        self.amounts.len()
    }

    pub fn total(&self) -> f64 {
        self.amounts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    /// Integer element counts divided by their greatest common divisor.
    ///
    /// Fractional amounts (partial occupancies) are first scaled to integer
    /// units of 1/1000 so that, e.g., `Fe0.5 O1` reduces to `Fe1 O2`.
    pub fn reduced_counts(&self) -> BTreeMap<&str, u64> {
        let units: Vec<(&str, u64)> = self
            .amounts
            .iter()
            .map(|(s, &a)| (s.as_str(), ((a * AMOUNT_SCALE).round() as u64).max(1)))
            .collect();
        let divisor = units.iter().fold(0, |acc, &(_, u)| gcd(acc, u)).max(1);
        units.into_iter().map(|(s, u)| (s, u / divisor)).collect()
    }

    /// Canonical reduced formula with alphabetically sorted symbols and unit counts omitted,
    /// e.g. `Fe2O3`, `NiO`, `CaO3Ti`.
    pub fn reduced_formula(&self) -> String {
        self.reduced_counts()
            .into_iter()
            .map(|(symbol, count)| {
                if count == 1 {
                    symbol.to_string()
                } else {
                    format!("{symbol}{count}")
                }
            })
            .collect()
    }

    /// Parses a chemical formula such as `Fe2O3`, `O3Fe2`, `Ca(OH)2` or `Li0.5CoO2`.
    pub fn parse_formula(formula: &str) -> Result<Self, FormulaError> {
        let chars: Vec<char> = formula.trim().chars().collect();
        if chars.is_empty() {
            return Err(FormulaError::Empty);
        }
        let mut parser = FormulaParser { chars, pos: 0 };
        let composition = parser.parse_group()?;
        if parser.pos < parser.chars.len() {
            // A stray ')' ends the top-level group early.
            return Err(FormulaError::UnbalancedParentheses);
        }
        if composition.is_empty() {
            return Err(FormulaError::Empty);
        }
        Ok(composition)
    }
}

impl fmt::Display for Composition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reduced_formula())
    }
}

impl<'a> FromIterator<(&'a str, f64)> for Composition {
    fn from_iter<I: IntoIterator<Item = (&'a str, f64)>>(iter: I) -> Self {
        let mut composition = Composition::new();
        for (symbol, amount) in iter {
            composition.add(symbol, amount);
        }
        composition
    }
}

struct FormulaParser {
    chars: Vec<char>,
    pos: usize,
}

impl FormulaParser {
    fn parse_group(&mut self) -> Result<Composition, FormulaError> {
        let mut composition = Composition::new();
        while let Some(&ch) = self.chars.get(self.pos) {
            match ch {
                '(' | '[' => {
                    self.pos += 1;
                    let inner = self.parse_group()?;
                    match self.chars.get(self.pos) {
                        Some(')') | Some(']') => self.pos += 1,
                        _ => return Err(FormulaError::UnbalancedParentheses),
                    }
                    let factor = self.parse_amount()?.unwrap_or(1.0);
                    for (symbol, amount) in inner.iter() {
                        composition.add(symbol, amount * factor);
                    }
                }
                ')' | ']' => break,
                c if c.is_ascii_uppercase() => {
                    let start = self.pos;
                    self.pos += 1;
                    while self
                        .chars
                        .get(self.pos)
                        .is_some_and(|c| c.is_ascii_lowercase())
                    {
                        self.pos += 1;
                    }
                    let symbol: String = self.chars[start..self.pos].iter().collect();
                    if !elements::is_known_element(&symbol) {
                        return Err(FormulaError::UnknownElement(symbol));
                    }
                    let amount = self.parse_amount()?.unwrap_or(1.0);
                    composition.add(&symbol, amount);
                }
                c if c.is_whitespace() => self.pos += 1,
                c => {
                    return Err(FormulaError::UnexpectedCharacter {
                        ch: c,
                        position: self.pos,
                    });
                }
            }
        }
        Ok(composition)
    }

    fn parse_amount(&mut self) -> Result<Option<f64>, FormulaError> {
        let start = self.pos;
        while self
            .chars
            .get(self.pos)
            .is_some_and(|c| c.is_ascii_digit() || *c == '.')
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Ok(None);
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        match text.parse::<f64>() {
            Ok(v) if v > 0.0 && v.is_finite() => Ok(Some(v)),
            _ => Err(FormulaError::InvalidAmount(text)),
        }
    }
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 { a } else { gcd(b, a % b) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comp(pairs: &[(&str, f64)]) -> Composition {
        pairs.iter().copied().collect()
    }

    #[test]
    fn reduced_formula_divides_by_gcd_and_sorts_symbols() {
        assert_eq!(comp(&[("O", 6.0), ("Fe", 4.0)]).reduced_formula(), "Fe2O3");
        assert_eq!(comp(&[("Ni", 4.0), ("O", 4.0)]).reduced_formula(), "NiO");
        assert_eq!(
            comp(&[("Ti", 1.0), ("O", 3.0), ("Ca", 1.0)]).reduced_formula(),
            "CaO3Ti"
        );
    }

    #[test]
    fn reduced_formula_handles_fractional_amounts() {
        assert_eq!(comp(&[("Fe", 0.5), ("O", 1.0)]).reduced_formula(), "FeO2");
        assert_eq!(comp(&[("Li", 0.25), ("Co", 1.0), ("O", 2.0)]).reduced_formula(), "Co4LiO8");
    }

    #[test]
    fn add_accumulates_repeated_species() {
        let mut c = Composition::new();
        c.add("O", 1.0);
        c.add("O", 0.5);
        assert!((c.amount("O") - 1.5).abs() < 1e-12);
        assert_eq!(c.num_elements(), 1);
        assert_eq!(c.amount("Fe"), 0.0);
    }

    #[test]
    fn parse_formula_canonicalizes_symbol_order() {
        let c = Composition::parse_formula("O3Fe2").unwrap();
        assert_eq!(c.reduced_formula(), "Fe2O3");
    }

    #[test]
    fn parse_formula_expands_groups() {
        let c = Composition::parse_formula("Ca(OH)2").unwrap();
        assert_eq!(c.amount("O"), 2.0);
        assert_eq!(c.amount("H"), 2.0);
        assert_eq!(c.reduced_formula(), "CaH2O2");
    }

    #[test]
    fn parse_formula_accepts_decimal_amounts() {
        let c = Composition::parse_formula("Li0.5CoO2").unwrap();
        assert_eq!(c.reduced_formula(), "Co2LiO4");
    }

    #[test]
    fn parse_formula_rejects_malformed_input() {
        assert_eq!(Composition::parse_formula("  "), Err(FormulaError::Empty));
        assert_eq!(
            Composition::parse_formula("Xy2"),
            Err(FormulaError::UnknownElement("Xy".into()))
        );
        assert_eq!(
            Composition::parse_formula("Fe2(O3"),
            Err(FormulaError::UnbalancedParentheses)
        );
        assert_eq!(
            Composition::parse_formula("Fe2O3)"),
            Err(FormulaError::UnbalancedParentheses)
        );
        assert!(matches!(
            Composition::parse_formula("fe2o3"),
            Err(FormulaError::UnexpectedCharacter { ch: 'f', position: 0 })
        ));
    }
}
