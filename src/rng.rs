use rand::Rng;
use rand_distr::Distribution;
use rand_distr::Exp1;
use rand_distr::Poisson;

/// The random deviates needed to run a simulation.
///
/// Any [`rand::Rng`] provides these through the blanket
/// implementation below.  Tests may implement the trait
/// directly to script a sequence of draws.
pub trait CoalescentRng {
    /// Uniform on `[0, 1)`.
    fn uniform01(&mut self) -> f64;

    /// Uniform on `[a, b)`.
    fn uniform(&mut self, a: f64, b: f64) -> f64;

    /// Exponential with the given mean.
    /// An infinite mean gives an infinite deviate.
    fn exponential(&mut self, mean: f64) -> f64;

    /// Poisson with the given mean.
    /// A non-positive mean gives 0.
    fn poisson(&mut self, mean: f64) -> u64;
}

impl<R: Rng + ?Sized> CoalescentRng for R {
    fn uniform01(&mut self) -> f64 {
        self.gen::<f64>()
    }

    fn uniform(&mut self, a: f64, b: f64) -> f64 {
        a + (b - a) * self.gen::<f64>()
    }

    fn exponential(&mut self, mean: f64) -> f64 {
        if !mean.is_finite() {
            return f64::INFINITY;
        }
        let deviate: f64 = Exp1.sample(self);
        mean * deviate
    }

    fn poisson(&mut self, mean: f64) -> u64 {
        if mean.is_nan() || mean <= 0.0 {
            return 0;
        }
        match Poisson::new(mean) {
            Ok(distribution) => distribution.sample(self) as u64,
            Err(_) => 0,
        }
    }
}
