use super::traits::{ParseError, ParseErrorKind, StructureParser};
use crate::core::elements;
use crate::core::models::site::wrap_unit;
use crate::core::models::structure::{ParsedLattice, ParsedSite, ParsedStructure};
use nalgebra::{Matrix3, Vector3};
use std::collections::HashMap;
use std::iter::Peekable;
use std::vec::IntoIter;

const SYMMETRY_TAGS: [&str; 2] = [
    "_symmetry_equiv_pos_as_xyz",
    "_space_group_symop_operation_xyz",
];
const SPACE_GROUP_TAGS: [&str; 2] = ["_space_group_it_number", "_symmetry_int_tables_number"];

#[derive(Debug, Clone)]
struct Token {
    text: String,
    line: usize,
    quoted: bool,
}

impl Token {
    fn is_null(&self) -> bool {
        !self.quoted && (self.text == "?" || self.text == ".")
    }

    fn is_reserved(&self) -> bool {
        if self.quoted {
            return false;
        }
        let lower = self.text.to_ascii_lowercase();
        lower.starts_with('_')
            || lower == "loop_"
            || lower == "stop_"
            || lower.starts_with("data_")
            || lower.starts_with("save_")
            || lower.starts_with("global_")
    }
}

struct Loop {
    tags: Vec<String>,
    rows: Vec<Vec<Token>>,
}

impl Loop {
    fn column(&self, tag: &str) -> Option<usize> {
        self.tags.iter().position(|t| t == tag)
    }

    fn has_any(&self, tags: &[&str]) -> bool {
        tags.iter().any(|t| self.column(t).is_some())
    }
}

#[derive(Default)]
struct DataBlock {
    items: HashMap<String, Token>,
    loops: Vec<Loop>,
}

impl DataBlock {
    fn item(&self, tag: &str) -> Option<&Token> {
        self.items.get(tag).filter(|t| !t.is_null())
    }

    fn find_loop(&self, tags: &[&str]) -> Option<&Loop> {
        self.loops.iter().find(|l| l.has_any(tags))
    }
}

/// Reader for the Crystallographic Information File (CIF) format.
///
/// Only the first `data_` block of a file is read. Sites are expanded by the
/// symmetry operations listed in the block; images of one site closer than
/// `symmetry_tolerance` (fractional units, per axis) are merged.
#[derive(Debug, Clone)]
pub struct CifParser {
    pub symmetry_tolerance: f64,
}

impl Default for CifParser {
    fn default() -> Self {
        Self {
            symmetry_tolerance: 1e-3,
        }
    }
}

impl CifParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StructureParser for CifParser {
    fn parse(&self, bytes: &[u8]) -> Result<ParsedStructure, ParseError> {
        let text = std::str::from_utf8(bytes)?;
        let tokens = tokenize(text)?;
        let block = read_first_block(tokens)?;

        let lattice = read_lattice(&block)?;
        let base_sites = read_sites(&block)?;
        let operations = read_symmetry_operations(&block)?;
        let sites = if operations.len() > 1 {
            expand_sites(base_sites, &operations, self.symmetry_tolerance)
        } else {
            base_sites
        };

        Ok(ParsedStructure {
            lattice,
            sites,
            declared_space_group: read_declared_space_group(&block),
        })
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut lines = text.lines().enumerate();

    while let Some((index, line)) = lines.next() {
        let line_no = index + 1;

        if let Some(rest) = line.strip_prefix(';') {
            let mut field = rest.to_string();
            let mut closed = false;
            for (_, next) in lines.by_ref() {
                if next.starts_with(';') {
                    closed = true;
                    break;
                }
                field.push('\n');
                field.push_str(next);
            }
            if !closed {
                return Err(ParseError::Parse {
                    line: line_no,
                    kind: ParseErrorKind::UnterminatedTextField,
                });
            }
            tokens.push(Token {
                text: field.trim().to_string(),
                line: line_no,
                quoted: true,
            });
            continue;
        }

        let chars: Vec<char> = line.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if c.is_whitespace() {
                i += 1;
                continue;
            }
            if c == '#' {
                break;
            }
            if c == '\'' || c == '"' {
                let start = i + 1;
                let mut end = start;
                // A quote only closes the value when followed by whitespace or end of line.
                loop {
                    match chars.get(end) {
                        None => {
                            return Err(ParseError::Parse {
                                line: line_no,
                                kind: ParseErrorKind::UnterminatedQuote,
                            });
                        }
                        Some(&q)
                            if q == c && chars.get(end + 1).is_none_or(|n| n.is_whitespace()) =>
                        {
                            break;
                        }
                        Some(_) => end += 1,
                    }
                }
                tokens.push(Token {
                    text: chars[start..end].iter().collect(),
                    line: line_no,
                    quoted: true,
                });
                i = end + 1;
                continue;
            }
            let start = i;
            while i < chars.len() && !chars[i].is_whitespace() {
                i += 1;
            }
            tokens.push(Token {
                text: chars[start..i].iter().collect(),
                line: line_no,
                quoted: false,
            });
        }
    }

    Ok(tokens)
}

fn read_first_block(tokens: Vec<Token>) -> Result<DataBlock, ParseError> {
    let mut block = DataBlock::default();
    let mut in_block = false;
    let mut iter = tokens.into_iter().peekable();

    while let Some(token) = iter.next() {
        if token.quoted {
            continue;
        }
        let lower = token.text.to_ascii_lowercase();

        if lower.starts_with("data_") {
            if in_block {
                break;
            }
            in_block = true;
        } else if lower == "loop_" {
            in_block = true;
            block.loops.push(read_loop(&mut iter, token.line)?);
        } else if lower.starts_with('_') {
            in_block = true;
            match iter.next_if(|t| !t.is_reserved()) {
                Some(value) => {
                    block.items.insert(lower, value);
                }
                None => {
                    return Err(ParseError::Parse {
                        line: token.line,
                        kind: ParseErrorKind::MissingValue(token.text),
                    });
                }
            }
        }
    }

    Ok(block)
}

fn read_loop(iter: &mut Peekable<IntoIter<Token>>, line: usize) -> Result<Loop, ParseError> {
    let mut tags = Vec::new();
    while let Some(tag) = iter.next_if(|t| !t.quoted && t.text.starts_with('_')) {
        tags.push(tag.text.to_ascii_lowercase());
    }
    if tags.is_empty() {
        return Err(ParseError::Parse {
            line,
            kind: ParseErrorKind::EmptyLoop,
        });
    }

    let mut values = Vec::new();
    while let Some(value) = iter.next_if(|t| !t.is_reserved()) {
        values.push(value);
    }
    if values.len() % tags.len() != 0 {
        return Err(ParseError::Parse {
            line,
            kind: ParseErrorKind::LoopRowLength {
                tags: tags.len(),
                values: values.len(),
            },
        });
    }

    let rows = values.chunks(tags.len()).map(<[Token]>::to_vec).collect();
    Ok(Loop { tags, rows })
}

/// Parses a CIF numeric value, dropping a trailing standard uncertainty such as `(5)`.
fn parse_number(token: &Token, tag: &str) -> Result<f64, ParseError> {
    let text = token.text.split('(').next().unwrap_or_default().trim();
    text.parse::<f64>().map_err(|_| ParseError::Parse {
        line: token.line,
        kind: ParseErrorKind::InvalidNumber {
            tag: tag.to_string(),
            value: token.text.clone(),
        },
    })
}

fn read_lattice(block: &DataBlock) -> Result<ParsedLattice, ParseError> {
    let mut lengths = [0.0; 3];
    for (slot, tag) in ["_cell_length_a", "_cell_length_b", "_cell_length_c"]
        .iter()
        .enumerate()
    {
        let token = block
            .item(tag)
            .ok_or_else(|| ParseError::MissingRecord(tag.to_string()))?;
        lengths[slot] = parse_number(token, tag)?;
    }

    let mut angles = [90.0; 3];
    for (slot, tag) in ["_cell_angle_alpha", "_cell_angle_beta", "_cell_angle_gamma"]
        .iter()
        .enumerate()
    {
        if let Some(token) = block.item(tag) {
            angles[slot] = parse_number(token, tag)?;
        }
    }

    Ok(ParsedLattice::Parameters { lengths, angles })
}

fn read_sites(block: &DataBlock) -> Result<Vec<ParsedSite>, ParseError> {
    let atom_loop = block
        .find_loop(&["_atom_site_fract_x"])
        .ok_or_else(|| ParseError::MissingRecord("_atom_site_fract_x loop".to_string()))?;

    let coord_tags = [
        "_atom_site_fract_x",
        "_atom_site_fract_y",
        "_atom_site_fract_z",
    ];
    let mut coord_columns = [0usize; 3];
    for (slot, tag) in coord_tags.iter().enumerate() {
        coord_columns[slot] = atom_loop
            .column(tag)
            .ok_or_else(|| ParseError::MissingRecord(tag.to_string()))?;
    }
    let species_column = atom_loop
        .column("_atom_site_type_symbol")
        .or_else(|| atom_loop.column("_atom_site_label"))
        .ok_or_else(|| ParseError::MissingRecord("_atom_site_type_symbol".to_string()))?;
    let occupancy_column = atom_loop.column("_atom_site_occupancy");

    atom_loop
        .rows
        .iter()
        .map(|row| {
            let species = read_species(&row[species_column])?;
            let mut frac = [0.0; 3];
            for (slot, &column) in coord_columns.iter().enumerate() {
                frac[slot] = parse_number(&row[column], coord_tags[slot])?;
            }
            let occupancy = match occupancy_column.map(|c| &row[c]) {
                Some(token) if !token.is_null() => {
                    Some(parse_number(token, "_atom_site_occupancy")?)
                }
                _ => None,
            };
            Ok(ParsedSite {
                species,
                frac,
                occupancy,
            })
        })
        .collect()
}

/// Resolves a species token to an element symbol. Tokens that do not name a known
/// element keep their leading letters so later stages can report them.
fn read_species(token: &Token) -> Result<String, ParseError> {
    if let Some(symbol) = elements::normalize_symbol(&token.text) {
        return Ok(symbol);
    }
    let letters: String = token
        .text
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    let mut chars = letters.chars();
    match chars.next() {
        Some(first) => Ok(first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()),
        None => Err(ParseError::Parse {
            line: token.line,
            kind: ParseErrorKind::InvalidSpecies(token.text.clone()),
        }),
    }
}

fn read_declared_space_group(block: &DataBlock) -> Option<u16> {
    SPACE_GROUP_TAGS
        .iter()
        .filter_map(|tag| block.item(tag))
        .find_map(|token| token.text.trim().parse::<u16>().ok())
        .filter(|n| (1..=230).contains(n))
}

#[derive(Debug, Clone, PartialEq)]
struct SymmetryOperation {
    rotation: Matrix3<f64>,
    translation: Vector3<f64>,
}

impl SymmetryOperation {
    fn identity() -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Parses a Jones-faithful expression such as `-x+1/2, y, z-0.25`.
    fn parse(text: &str) -> Option<Self> {
        let parts: Vec<&str> = text.split(',').collect();
        if parts.len() != 3 {
            return None;
        }

        let mut rotation = Matrix3::zeros();
        let mut translation = Vector3::zeros();
        for (row, part) in parts.iter().enumerate() {
            let expr: String = part
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_lowercase();
            if expr.is_empty() {
                return None;
            }

            let mut rest = expr.as_str();
            while !rest.is_empty() {
                let (sign, body) = if let Some(b) = rest.strip_prefix('-') {
                    (-1.0, b)
                } else if let Some(b) = rest.strip_prefix('+') {
                    (1.0, b)
                } else {
                    (1.0, rest)
                };
                let end = body.find(['+', '-']).unwrap_or(body.len());
                let term = &body[..end];
                rest = &body[end..];

                let column = match term.chars().last()? {
                    'x' => Some(0),
                    'y' => Some(1),
                    'z' => Some(2),
                    _ => None,
                };
                match column {
                    Some(column) => {
                        let coefficient = term[..term.len() - 1].trim_end_matches('*');
                        let coefficient = if coefficient.is_empty() {
                            1.0
                        } else {
                            parse_fraction(coefficient)?
                        };
                        rotation[(row, column)] += sign * coefficient;
                    }
                    None => translation[row] += sign * parse_fraction(term)?,
                }
            }
        }

        Some(Self {
            rotation,
            translation,
        })
    }

    fn apply(&self, frac: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * frac + self.translation
    }
}

fn parse_fraction(text: &str) -> Option<f64> {
    match text.split_once('/') {
        Some((num, den)) => {
            let den: f64 = den.parse().ok()?;
            (den != 0.0).then_some(num.parse::<f64>().ok()? / den)
        }
        None => text.parse().ok(),
    }
}

fn read_symmetry_operations(block: &DataBlock) -> Result<Vec<SymmetryOperation>, ParseError> {
    let tokens: Vec<&Token> = match block.find_loop(&SYMMETRY_TAGS) {
        Some(sym_loop) => {
            let column = SYMMETRY_TAGS
                .iter()
                .find_map(|t| sym_loop.column(t))
                .unwrap_or_default();
            sym_loop.rows.iter().map(|row| &row[column]).collect()
        }
        None => SYMMETRY_TAGS
            .iter()
            .filter_map(|t| block.item(t))
            .take(1)
            .collect(),
    };

    let mut operations = Vec::with_capacity(tokens.len().max(1));
    for token in tokens {
        let op = SymmetryOperation::parse(&token.text).ok_or_else(|| ParseError::Parse {
            line: token.line,
            kind: ParseErrorKind::InvalidSymmetryOperation(token.text.clone()),
        })?;
        operations.push(op);
    }
    if operations.is_empty() {
        operations.push(SymmetryOperation::identity());
    }
    Ok(operations)
}

fn is_periodic_image(a: &Vector3<f64>, b: &Vector3<f64>, tolerance: f64) -> bool {
    (a - b).iter().all(|d| {
        let d = d.abs();
        d < tolerance || 1.0 - d < tolerance
    })
}

/// Applies every operation to every site. Images are merged only within the orbit of
/// a single input site, so two distinct input sites at one position both survive.
fn expand_sites(
    base: Vec<ParsedSite>,
    operations: &[SymmetryOperation],
    tolerance: f64,
) -> Vec<ParsedSite> {
    let mut expanded = Vec::with_capacity(base.len() * operations.len());
    for site in base {
        let origin = Vector3::from(site.frac);
        let mut orbit: Vec<Vector3<f64>> = Vec::new();
        for op in operations {
            let image = op.apply(&origin).map(wrap_unit);
            if !orbit.iter().any(|p| is_periodic_image(p, &image, tolerance)) {
                orbit.push(image);
            }
        }
        expanded.extend(orbit.into_iter().map(|p| ParsedSite {
            species: site.species.clone(),
            frac: p.into(),
            occupancy: site.occupancy,
        }));
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<ParsedStructure, ParseError> {
        CifParser::new().parse(text.as_bytes())
    }

    const P1_FE2O3: &str = "\
data_Fe2O3
_symmetry_space_group_name_H-M   'P 1'
_cell_length_a   5.0356(3)
_cell_length_b   5.0356
_cell_length_c   13.7489
_cell_angle_alpha   90.0
_cell_angle_beta    90.0
_cell_angle_gamma   120.0
_symmetry_Int_Tables_number   167
loop_
 _atom_site_label
 _atom_site_type_symbol
 _atom_site_fract_x
 _atom_site_fract_y
 _atom_site_fract_z
 _atom_site_occupancy
  Fe1  Fe3+  0.0  0.0  0.3553  1
  O1   O2-   0.3059  0.0  0.25  1.0(0)
  O2   O     0.5  0.5  0.5  .
";

    #[test]
    fn parses_cell_sites_and_declared_space_group() {
        let parsed = parse(P1_FE2O3).unwrap();
        match parsed.lattice {
            ParsedLattice::Parameters { lengths, angles } => {
                assert!((lengths[0] - 5.0356).abs() < 1e-12);
                assert!((angles[2] - 120.0).abs() < 1e-12);
            }
            other => panic!("unexpected lattice {other:?}"),
        }
        assert_eq!(parsed.sites.len(), 3);
        assert_eq!(parsed.sites[0].species, "Fe");
        assert_eq!(parsed.sites[1].species, "O");
        assert_eq!(parsed.sites[1].occupancy, Some(1.0));
        assert_eq!(parsed.sites[2].occupancy, None);
        assert_eq!(parsed.declared_space_group, Some(167));
    }

    #[test]
    fn label_is_used_when_type_symbol_is_absent() {
        let text = "\
data_x
_cell_length_a 3
_cell_length_b 3
_cell_length_c 3
loop_
_atom_site_label
_atom_site_fract_x
_atom_site_fract_y
_atom_site_fract_z
Cl12 0 0 0
";
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.sites[0].species, "Cl");
    }

    #[test]
    fn unknown_species_keep_their_letters() {
        let text = "\
data_x
_cell_length_a 3
_cell_length_b 3
_cell_length_c 3
loop_
_atom_site_type_symbol
_atom_site_fract_x
_atom_site_fract_y
_atom_site_fract_z
QQ1 0 0 0
";
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.sites[0].species, "Qq");
    }

    #[test]
    fn symmetry_operations_expand_and_merge_special_positions() {
        let text = "\
data_x
_cell_length_a 4
_cell_length_b 4
_cell_length_c 4
loop_
_symmetry_equiv_pos_site_id
_symmetry_equiv_pos_as_xyz
1 'x, y, z'
2 '-x, -y, -z'
3 'x+1/2, y+1/2, z+1/2'
4 '-x+1/2, -y+1/2, -z+1/2'
loop_
_atom_site_type_symbol
_atom_site_fract_x
_atom_site_fract_y
_atom_site_fract_z
Cs 0 0 0
Cl 0.25 0.25 0.25
";
        let parsed = parse(text).unwrap();
        let cs: Vec<_> = parsed.sites.iter().filter(|s| s.species == "Cs").collect();
        let cl: Vec<_> = parsed.sites.iter().filter(|s| s.species == "Cl").collect();
        assert_eq!(cs.len(), 2);
        assert_eq!(cl.len(), 2);
        assert!(
            cl.iter()
                .any(|s| s.frac.iter().all(|v| (v - 0.75).abs() < 1e-12))
        );
    }

    #[test]
    fn distinct_sites_at_the_same_position_are_not_merged() {
        let text = "\
data_x
_cell_length_a 4
_cell_length_b 4
_cell_length_c 4
loop_
_space_group_symop_operation_xyz
'x,y,z'
'-x,-y,-z'
loop_
_atom_site_type_symbol
_atom_site_fract_x
_atom_site_fract_y
_atom_site_fract_z
Na 0 0 0
Na 0 0 0
";
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.sites.len(), 2);
    }

    #[test]
    fn only_the_first_data_block_is_read() {
        let text = format!("{P1_FE2O3}\ndata_second\n_cell_length_a 99\n");
        let parsed = parse(&text).unwrap();
        match parsed.lattice {
            ParsedLattice::Parameters { lengths, .. } => {
                assert!((lengths[0] - 5.0356).abs() < 1e-12)
            }
            other => panic!("unexpected lattice {other:?}"),
        }
    }

    #[test]
    fn semicolon_text_fields_and_comments_are_skipped() {
        let text = "\
data_x
# generated structure
_publ_section_title
;
 A long title
 over two lines
;
_cell_length_a 2  # trailing comment
_cell_length_b 2
_cell_length_c 2
loop_
_atom_site_type_symbol
_atom_site_fract_x
_atom_site_fract_y
_atom_site_fract_z
H 0 0 0
";
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.sites.len(), 1);
    }

    #[test]
    fn missing_cell_length_is_reported() {
        let text = "data_x\n_cell_length_a 2\n_cell_length_b 2\n";
        assert!(matches!(
            parse(text),
            Err(ParseError::MissingRecord(tag)) if tag == "_cell_length_c"
        ));
    }

    #[test]
    fn invalid_coordinate_reports_line() {
        let text = "\
data_x
_cell_length_a 2
_cell_length_b 2
_cell_length_c 2
loop_
_atom_site_type_symbol
_atom_site_fract_x
_atom_site_fract_y
_atom_site_fract_z
H 0 abc 0
";
        match parse(text) {
            Err(ParseError::Parse { line, kind }) => {
                assert_eq!(line, 10);
                assert!(matches!(kind, ParseErrorKind::InvalidNumber { .. }));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn ragged_loop_is_rejected() {
        let text = "\
data_x
_cell_length_a 2
_cell_length_b 2
_cell_length_c 2
loop_
_atom_site_type_symbol
_atom_site_fract_x
_atom_site_fract_y
_atom_site_fract_z
H 0 0
";
        assert!(matches!(
            parse(text),
            Err(ParseError::Parse {
                kind: ParseErrorKind::LoopRowLength { tags: 4, values: 3 },
                ..
            })
        ));
    }

    #[test]
    fn invalid_utf8_is_a_parse_error() {
        let bytes = [0x64, 0x61, 0xff, 0xfe];
        assert!(matches!(
            CifParser::new().parse(&bytes),
            Err(ParseError::Utf8(_))
        ));
    }

    #[test]
    fn symmetry_operation_parsing_handles_fractions_and_order() {
        let op = SymmetryOperation::parse("1/2-x, y+0.25, -z").unwrap();
        let image = op.apply(&Vector3::new(0.1, 0.2, 0.3));
        assert!((image - Vector3::new(0.4, 0.45, -0.3)).norm() < 1e-12);
        assert!(SymmetryOperation::parse("x, y").is_none());
        assert!(SymmetryOperation::parse("x, y, 1/0").is_none());
    }
}
