//! Parameter records for the adaptive Poisson loop and the Stokes solve.
//!
//! The `Default` impls reproduce the reference runs.
use crate::fem_error::FemError;
use crate::Real;
use nalgebra::{Point2, Scalar};
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle `[x0, x1] × [y0, y1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>"))]
pub struct RectangleDomain<T: Scalar> {
    pub lower_left: Point2<T>,
    pub upper_right: Point2<T>,
}

impl<T: Real> RectangleDomain<T> {
    pub fn new(lower_left: Point2<T>, upper_right: Point2<T>) -> Self {
        Self {
            lower_left,
            upper_right,
        }
    }

    pub fn unit_square() -> Self {
        Self::new(Point2::origin(), Point2::new(T::one(), T::one()))
    }

    pub fn width(&self) -> T {
        self.upper_right.x - self.lower_left.x
    }

    pub fn height(&self) -> T {
        self.upper_right.y - self.lower_left.y
    }

    /// Absolute tolerance used for the side predicates, relative to the domain size.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn tolerance(&self) -> T {
        1e-10 * self.width().max(self.height())
    }

    pub fn is_on_left_side(&self, x: &Point2<T>) -> bool {
        (x.x - self.lower_left.x).abs() <= self.tolerance()
    }

    pub fn is_on_right_side(&self, x: &Point2<T>) -> bool {
        (x.x - self.upper_right.x).abs() <= self.tolerance()
    }

    pub fn is_on_bottom_side(&self, x: &Point2<T>) -> bool {
        (x.y - self.lower_left.y).abs() <= self.tolerance()
    }

    pub fn is_on_top_side(&self, x: &Point2<T>) -> bool {
        (x.y - self.upper_right.y).abs() <= self.tolerance()
    }

    /// Whether the point lies on any of the four sides.
    pub fn is_on_boundary(&self, x: &Point2<T>) -> bool {
        self.is_on_left_side(x) || self.is_on_right_side(x) || self.is_on_bottom_side(x) || self.is_on_top_side(x)
    }

    pub fn validate(&self) -> Result<(), FemError> {
        let finite = [self.lower_left, self.upper_right]
            .iter()
            .all(|p| p.x.is_finite() && p.y.is_finite());
        if !finite || self.width() <= T::zero() || self.height() <= T::zero() {
            return Err(FemError::Assembly(format!(
                "rectangle domain must have finite corners and positive extents, got {:?} to {:?}",
                self.lower_left, self.upper_right
            )));
        }
        Ok(())
    }
}

impl<T: Real> Default for RectangleDomain<T> {
    /// The square `[-1, 1] × [-1, 1]`.
    fn default() -> Self {
        let one = T::one();
        Self::new(Point2::new(-one, -one), Point2::new(one, one))
    }
}

/// The source term `f(x) = amplitude · exp(-|x - center|² / spread)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianBump {
    pub amplitude: f64,
    pub spread: f64,
    pub center: [f64; 2],
}

impl GaussianBump {
    pub fn evaluate<T: Real>(&self, x: &Point2<T>) -> T {
        let to_t = |v: f64| T::from_f64(v).expect("f64 must fit in T");
        let center = Point2::new(to_t(self.center[0]), to_t(self.center[1]));
        let r2 = (x - center).norm_squared();
        to_t(self.amplitude) * (-r2 / to_t(self.spread)).exp()
    }
}

impl Default for GaussianBump {
    fn default() -> Self {
        Self {
            amplitude: 20.0,
            spread: 0.02,
            center: [0.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ElementDegree {
    /// Piecewise linear (P1) Lagrange elements.
    #[default]
    Linear,
    /// Piecewise quadratic (P2) Lagrange elements.
    Quadratic,
}

/// Parameters of the adaptive Poisson loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    pub domain: RectangleDomain<f64>,
    /// Number of grid squares in x and y for the initial mesh. Each square holds two triangles.
    pub resolution: [usize; 2],
    pub source: GaussianBump,
    pub degree: ElementDegree,
    /// Fraction of cells marked per iteration.
    pub fraction: f64,
    /// The loop stops once the total residual is at or below this value.
    pub threshold: f64,
    /// `None` lets the loop run until the threshold is met.
    pub max_iterations: Option<usize>,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            domain: RectangleDomain::default(),
            resolution: [8, 8],
            source: GaussianBump::default(),
            degree: ElementDegree::Linear,
            fraction: 0.05,
            threshold: 5e-2,
            max_iterations: Some(50),
        }
    }
}

impl AdaptiveConfig {
    /// The reference run: 8×8 mesh of `[-1, 1]²`, fraction 0.05 and threshold 5e-2.
    pub fn reference() -> Self {
        Self::default()
    }

    pub fn with_domain(self, domain: RectangleDomain<f64>) -> Self {
        Self { domain, ..self }
    }

    pub fn with_resolution(self, nx: usize, ny: usize) -> Self {
        Self {
            resolution: [nx, ny],
            ..self
        }
    }

    pub fn with_source(self, source: GaussianBump) -> Self {
        Self { source, ..self }
    }

    pub fn with_degree(self, degree: ElementDegree) -> Self {
        Self { degree, ..self }
    }

    pub fn with_fraction(self, fraction: f64) -> Self {
        Self { fraction, ..self }
    }

    pub fn with_threshold(self, threshold: f64) -> Self {
        Self { threshold, ..self }
    }

    pub fn with_max_iterations(self, max_iterations: Option<usize>) -> Self {
        Self { max_iterations, ..self }
    }

    pub fn validate(&self) -> Result<(), FemError> {
        self.domain.validate()?;
        if self.resolution.iter().any(|&n| n == 0) {
            return Err(FemError::Assembly(format!(
                "initial resolution must be positive in both directions, got {:?}",
                self.resolution
            )));
        }
        if !(self.fraction > 0.0 && self.fraction <= 1.0) {
            return Err(FemError::Assembly(format!(
                "marking fraction must lie in (0, 1], got {}",
                self.fraction
            )));
        }
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(FemError::Assembly(format!(
                "residual threshold must be finite and non-negative, got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

/// Boundary conditions of the Stokes problem.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StokesFlow {
    /// Tangential velocity on the top side and no-slip elsewhere.
    LidDrivenCavity { lid_velocity: f64 },
    /// Parabolic inflow on the left side, no-slip on top and bottom and a free outflow on the right.
    Channel { inflow_peak: f64 },
}

impl Default for StokesFlow {
    fn default() -> Self {
        StokesFlow::LidDrivenCavity { lid_velocity: 1.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StokesConfig {
    pub domain: RectangleDomain<f64>,
    pub resolution: [usize; 2],
    pub flow: StokesFlow,
}

impl Default for StokesConfig {
    fn default() -> Self {
        Self {
            domain: RectangleDomain::unit_square(),
            resolution: [16, 16],
            flow: StokesFlow::default(),
        }
    }
}

impl StokesConfig {
    pub fn with_domain(self, domain: RectangleDomain<f64>) -> Self {
        Self { domain, ..self }
    }

    pub fn with_resolution(self, nx: usize, ny: usize) -> Self {
        Self {
            resolution: [nx, ny],
            ..self
        }
    }

    pub fn with_flow(self, flow: StokesFlow) -> Self {
        Self { flow, ..self }
    }

    pub fn validate(&self) -> Result<(), FemError> {
        self.domain.validate()?;
        if self.resolution.iter().any(|&n| n == 0) {
            return Err(FemError::Assembly(format!(
                "resolution must be positive in both directions, got {:?}",
                self.resolution
            )));
        }
        Ok(())
    }
}
