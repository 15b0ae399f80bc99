use phf::{Map, Set, phf_map, phf_set};

#[rustfmt::skip]
static ATOMIC_MASSES: Map<&'static str, f64> = phf_map! {
    // --- Period 1-2 ---
    "H" => 1.008, "He" => 4.002602,
    "Li" => 6.94, "Be" => 9.0121831, "B" => 10.81, "C" => 12.011,
    "N" => 14.007, "O" => 15.999, "F" => 18.998403163, "Ne" => 20.1797,
    // --- Period 3 ---
    "Na" => 22.98976928, "Mg" => 24.305, "Al" => 26.9815385, "Si" => 28.085,
    "P" => 30.973761998, "S" => 32.06, "Cl" => 35.45, "Ar" => 39.948,
    // --- Period 4 ---
    "K" => 39.0983, "Ca" => 40.078, "Sc" => 44.955908, "Ti" => 47.867,
    "V" => 50.9415, "Cr" => 51.9961, "Mn" => 54.938044, "Fe" => 55.845,
    "Co" => 58.933194, "Ni" => 58.6934, "Cu" => 63.546, "Zn" => 65.38,
    "Ga" => 69.723, "Ge" => 72.630, "As" => 74.921595, "Se" => 78.971,
    "Br" => 79.904, "Kr" => 83.798,
    // --- Period 5 ---
    "Rb" => 85.4678, "Sr" => 87.62, "Y" => 88.90584, "Zr" => 91.224,
    "Nb" => 92.90637, "Mo" => 95.95, "Tc" => 98.0, "Ru" => 101.07,
    "Rh" => 102.90550, "Pd" => 106.42, "Ag" => 107.8682, "Cd" => 112.414,
    "In" => 114.818, "Sn" => 118.710, "Sb" => 121.760, "Te" => 127.60,
    "I" => 126.90447, "Xe" => 131.293,
    // --- Period 6 ---
    "Cs" => 132.90545196, "Ba" => 137.327, "La" => 138.90547, "Ce" => 140.116,
    "Pr" => 140.90766, "Nd" => 144.242, "Pm" => 145.0, "Sm" => 150.36,
    "Eu" => 151.964, "Gd" => 157.25, "Tb" => 158.92535, "Dy" => 162.500,
    "Ho" => 164.93033, "Er" => 167.259, "Tm" => 168.93422, "Yb" => 173.045,
    "Lu" => 174.9668, "Hf" => 178.49, "Ta" => 180.94788, "W" => 183.84,
    "Re" => 186.207, "Os" => 190.23, "Ir" => 192.217, "Pt" => 195.084,
    "Au" => 196.966569, "Hg" => 200.592, "Tl" => 204.38, "Pb" => 207.2,
    "Bi" => 208.98040, "Po" => 209.0, "At" => 210.0, "Rn" => 222.0,
    // --- Period 7 ---
    "Fr" => 223.0, "Ra" => 226.0, "Ac" => 227.0, "Th" => 232.0377,
    "Pa" => 231.03588, "U" => 238.02891, "Np" => 237.0, "Pu" => 244.0,
    "Am" => 243.0, "Cm" => 247.0,
};

/// Nominal oxidation states, most common first.
#[rustfmt::skip]
static OXIDATION_STATES: Map<&'static str, &'static [i8]> = phf_map! {
    "H" => &[1, -1], "He" => &[0],
    "Li" => &[1], "Be" => &[2], "B" => &[3], "C" => &[4, -4, 2],
    "N" => &[-3, 3, 5], "O" => &[-2], "F" => &[-1], "Ne" => &[0],
    "Na" => &[1], "Mg" => &[2], "Al" => &[3], "Si" => &[4, -4],
    "P" => &[5, 3, -3], "S" => &[-2, 6, 4], "Cl" => &[-1, 1, 3, 5, 7], "Ar" => &[0],
    "K" => &[1], "Ca" => &[2], "Sc" => &[3], "Ti" => &[4, 3, 2],
    "V" => &[5, 4, 3, 2], "Cr" => &[3, 6, 2], "Mn" => &[2, 4, 3, 7], "Fe" => &[3, 2],
    "Co" => &[2, 3], "Ni" => &[2, 3], "Cu" => &[2, 1], "Zn" => &[2],
    "Ga" => &[3], "Ge" => &[4, 2], "As" => &[-3, 3, 5], "Se" => &[-2, 4, 6],
    "Br" => &[-1, 1, 5], "Kr" => &[0],
    "Rb" => &[1], "Sr" => &[2], "Y" => &[3], "Zr" => &[4],
    "Nb" => &[5, 3], "Mo" => &[6, 4], "Tc" => &[7, 4], "Ru" => &[3, 4],
    "Rh" => &[3], "Pd" => &[2, 4], "Ag" => &[1], "Cd" => &[2],
    "In" => &[3], "Sn" => &[4, 2], "Sb" => &[3, 5, -3], "Te" => &[-2, 4, 6],
    "I" => &[-1, 1, 5, 7], "Xe" => &[0],
    "Cs" => &[1], "Ba" => &[2], "La" => &[3], "Ce" => &[3, 4],
    "Pr" => &[3], "Nd" => &[3], "Pm" => &[3], "Sm" => &[3, 2],
    "Eu" => &[3, 2], "Gd" => &[3], "Tb" => &[3, 4], "Dy" => &[3],
    "Ho" => &[3], "Er" => &[3], "Tm" => &[3], "Yb" => &[3, 2],
    "Lu" => &[3], "Hf" => &[4], "Ta" => &[5], "W" => &[6, 4],
    "Re" => &[7, 4], "Os" => &[4, 8], "Ir" => &[4, 3], "Pt" => &[2, 4],
    "Au" => &[3, 1], "Hg" => &[2, 1], "Tl" => &[1, 3], "Pb" => &[2, 4],
    "Bi" => &[3, 5],
    "Th" => &[4], "U" => &[6, 4], "Np" => &[5], "Pu" => &[4],
};

// 3d/4d/5d metals, lanthanides and actinides that commonly carry unpaired spins.
static MAGNETIC_ELEMENTS: Set<&'static str> = phf_set! {
    "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu",
    "Mo", "Tc", "Ru", "Rh", "Pd",
    "W", "Re", "Os", "Ir", "Pt",
    "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb", "Dy", "Ho", "Er", "Tm", "Yb",
    "U", "Np", "Pu", "Am", "Cm",
};

pub fn is_known_element(symbol: &str) -> bool {
    ATOMIC_MASSES.contains_key(symbol)
}

pub fn atomic_mass(symbol: &str) -> Option<f64> {
    ATOMIC_MASSES.get(symbol).copied()
}

pub fn oxidation_states(symbol: &str) -> Option<&'static [i8]> {
    OXIDATION_STATES.get(symbol).copied()
}

pub fn is_magnetic_element(symbol: &str) -> bool {
    MAGNETIC_ELEMENTS.contains(symbol)
}

/// Normalizes a raw species token (`"FE"`, `"Fe3+"`, `"O2-"`, `"Os1"`) to an element symbol.
///
/// Two-letter symbols win over one-letter ones when both are valid, so `"Os1"`
/// resolves to osmium rather than oxygen.
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let letters: Vec<char> = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    let first = letters.first()?.to_ascii_uppercase();

    if let Some(second) = letters.get(1) {
        let candidate: String = [first, second.to_ascii_lowercase()].iter().collect();
        if is_known_element(&candidate) {
            return Some(candidate);
        }
    }

    let single = first.to_string();
    is_known_element(&single).then_some(single)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_mass_returns_standard_values() {
        assert_eq!(atomic_mass("Fe"), Some(55.845));
        assert_eq!(atomic_mass("O"), Some(15.999));
        assert_eq!(atomic_mass("Xx"), None);
    }

    #[test]
    fn oxidation_states_lists_most_common_first() {
        assert_eq!(oxidation_states("Fe"), Some(&[3i8, 2][..]));
        assert_eq!(oxidation_states("O"), Some(&[-2i8][..]));
        assert_eq!(oxidation_states("Og"), None);
    }

    #[test]
    fn magnetic_set_covers_transition_metals_and_f_block() {
        assert!(is_magnetic_element("Fe"));
        assert!(is_magnetic_element("Gd"));
        assert!(is_magnetic_element("U"));
        assert!(!is_magnetic_element("O"));
        assert!(!is_magnetic_element("Zn"));
    }

    #[test]
    fn normalize_symbol_strips_labels_and_charges() {
        assert_eq!(normalize_symbol("Fe1").as_deref(), Some("Fe"));
        assert_eq!(normalize_symbol("Fe3+").as_deref(), Some("Fe"));
        assert_eq!(normalize_symbol("O2-").as_deref(), Some("O"));
        assert_eq!(normalize_symbol("FE").as_deref(), Some("Fe"));
        assert_eq!(normalize_symbol(" Os1 ").as_deref(), Some("Os"));
    }

    #[test]
    fn normalize_symbol_falls_back_to_single_letter() {
        assert_eq!(normalize_symbol("OA").as_deref(), Some("O"));
        assert_eq!(normalize_symbol("N12").as_deref(), Some("N"));
    }

    #[test]
    fn normalize_symbol_rejects_unknown_tokens() {
        assert_eq!(normalize_symbol(""), None);
        assert_eq!(normalize_symbol("123"), None);
        assert_eq!(normalize_symbol("Qq"), None);
    }
}
