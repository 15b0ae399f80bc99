use nalgebra::Vector3;

/// One atomic site of a periodic structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub species: String,
    pub frac: Vector3<f64>,
    pub occupancy: f64,
}

impl Site {
    /// Creates a site, wrapping each fractional coordinate into `[0, 1)`.
    pub fn new(species: impl Into<String>, frac: Vector3<f64>, occupancy: f64) -> Self {
        Self {
            species: species.into(),
            frac: frac.map(wrap_unit),
            occupancy,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.frac.iter().all(|v| v.is_finite())
    }
}

/// Maps a fractional coordinate into `[0, 1)`.
pub(crate) fn wrap_unit(value: f64) -> f64 {
    let wrapped = value.rem_euclid(1.0);
    // rem_euclid can round up to exactly 1.0 for tiny negative inputs
    if wrapped >= 1.0 { 0.0 } else { wrapped }
}
