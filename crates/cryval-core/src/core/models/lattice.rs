use nalgebra::{Matrix3, Vector3};

/// Periodic cell of a crystal, stored as three row vectors **a**, **b**, **c** in Angstroms.
///
/// Fractional coordinates `f` map to Cartesian coordinates as
/// `r = f.x * a + f.y * b + f.z * c`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lattice {
    matrix: Matrix3<f64>,
}

impl Lattice {
    /// Builds a lattice from its three cell vectors.
    pub fn from_vectors(a: Vector3<f64>, b: Vector3<f64>, c: Vector3<f64>) -> Self {
        Self {
            matrix: Matrix3::from_rows(&[a.transpose(), b.transpose(), c.transpose()]),
        }
    }

    /// Builds a lattice from cell lengths (Angstroms) and angles (degrees).
    ///
    /// The standard crystallographic orientation is used: **a** along x, **b** in
    /// the xy-plane, **c** completing the cell.
    ///
    /// # Arguments
    ///
    /// * `lengths` - The cell lengths `[a, b, c]`.
    /// * `angles` - The cell angles `[alpha, beta, gamma]`, where alpha is the angle
    ///   between **b** and **c**, beta between **a** and **c**, and gamma between **a** and **b**.
    pub fn from_parameters(lengths: [f64; 3], angles: [f64; 3]) -> Self {
        let [a, b, c] = lengths;
        let [alpha, beta, gamma] = angles.map(f64::to_radians);
        let (cos_a, cos_b, cos_g) = (alpha.cos(), beta.cos(), gamma.cos());
        let sin_g = gamma.sin();

        let cx = c * cos_b;
        let cy = c * (cos_a - cos_b * cos_g) / sin_g;
        let cz_sq = c * c - cx * cx - cy * cy;
        let cz = if cz_sq > 0.0 { cz_sq.sqrt() } else { 0.0 };

        Self::from_vectors(
            Vector3::new(a, 0.0, 0.0),
            Vector3::new(b * cos_g, b * sin_g, 0.0),
            Vector3::new(cx, cy, cz),
        )
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    pub fn vector(&self, index: usize) -> Vector3<f64> {
        self.matrix.row(index).transpose()
    }

    /// Cell volume as the absolute scalar triple product `|a · (b × c)|`.
    pub fn volume(&self) -> f64 {
        let (a, b, c) = (self.vector(0), self.vector(1), self.vector(2));
        a.dot(&b.cross(&c)).abs()
    }

    pub fn to_cartesian(&self, fractional: &Vector3<f64>) -> Vector3<f64> {
        self.matrix.transpose() * fractional
    }

    pub fn lengths(&self) -> [f64; 3] {
        [0, 1, 2].map(|i| self.vector(i).norm())
    }

    /// Cell angles `[alpha, beta, gamma]` in degrees.
    pub fn angles(&self) -> [f64; 3] {
        let (a, b, c) = (self.vector(0), self.vector(1), self.vector(2));
        let angle = |u: &Vector3<f64>, v: &Vector3<f64>| {
            (u.dot(v) / (u.norm() * v.norm()))
                .clamp(-1.0, 1.0)
                .acos()
                .to_degrees()
        };
        [angle(&b, &c), angle(&a, &c), angle(&a, &b)]
    }

    /// Spacings between the lattice planes spanned by each pair of cell vectors:
    /// `V / |b × c|`, `V / |a × c|`, `V / |a × b|`.
    pub fn interplanar_spacings(&self) -> [f64; 3] {
        let (a, b, c) = (self.vector(0), self.vector(1), self.vector(2));
        let volume = self.volume();
        [b.cross(&c), a.cross(&c), a.cross(&b)].map(|n| volume / n.norm())
    }

    pub fn is_finite(&self) -> bool {
        self.matrix.iter().all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn cubic_parameters_produce_orthogonal_vectors() {
        let lattice = Lattice::from_parameters([4.0, 4.0, 4.0], [90.0, 90.0, 90.0]);
        assert!((lattice.volume() - 64.0).abs() < EPS);
        assert!((lattice.vector(1) - Vector3::new(0.0, 4.0, 0.0)).norm() < EPS);
        assert!((lattice.vector(2) - Vector3::new(0.0, 0.0, 4.0)).norm() < EPS);
    }

    #[test]
    fn hexagonal_parameters_round_trip_lengths_and_angles() {
        let lattice = Lattice::from_parameters([5.03, 5.03, 13.75], [90.0, 90.0, 120.0]);
        let lengths = lattice.lengths();
        let angles = lattice.angles();
        assert!((lengths[0] - 5.03).abs() < 1e-9);
        assert!((lengths[2] - 13.75).abs() < 1e-9);
        assert!((angles[0] - 90.0).abs() < 1e-6);
        assert!((angles[2] - 120.0).abs() < 1e-6);
    }

    #[test]
    fn volume_ignores_handedness() {
        let right = Lattice::from_vectors(Vector3::x() * 2.0, Vector3::y() * 3.0, Vector3::z());
        let left = Lattice::from_vectors(Vector3::y() * 3.0, Vector3::x() * 2.0, Vector3::z());
        assert!((right.volume() - 6.0).abs() < EPS);
        assert!((left.volume() - 6.0).abs() < EPS);
    }

    #[test]
    fn to_cartesian_combines_cell_vectors() {
        let lattice = Lattice::from_vectors(
            Vector3::new(2.0, 0.0, 0.0),
            Vector3::new(1.0, 2.0, 0.0),
            Vector3::new(0.0, 0.0, 3.0),
        );
        let cart = lattice.to_cartesian(&Vector3::new(0.5, 0.5, 1.0));
        assert!((cart - Vector3::new(1.5, 1.0, 3.0)).norm() < EPS);
    }

    #[test]
    fn interplanar_spacings_of_orthorhombic_cell_equal_lengths() {
        let lattice = Lattice::from_parameters([3.0, 4.0, 5.0], [90.0, 90.0, 90.0]);
        let d = lattice.interplanar_spacings();
        assert!((d[0] - 3.0).abs() < EPS);
        assert!((d[1] - 4.0).abs() < EPS);
        assert!((d[2] - 5.0).abs() < EPS);
    }

    #[test]
    fn degenerate_cell_has_zero_volume() {
        let flat = Lattice::from_vectors(Vector3::x(), Vector3::y(), Vector3::x() + Vector3::y());
        assert!(flat.volume() < EPS);
    }
}
