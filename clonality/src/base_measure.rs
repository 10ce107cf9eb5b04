//! Prior distributions over the cluster parameters and the global parameters.
use crate::errors::{Error, Result};
use crate::misc::log_gamma_pdf;
use rand::Rng;
use rand_distr::{Beta, Distribution, Gamma};
use serde::{Deserialize, Serialize};

/// Beta(a,b) prior over a cellular prevalence.
#[derive(Debug, Clone, Copy)]
pub struct BetaBaseMeasure {
    a: f64,
    b: f64,
    dist: Beta<f64>,
}

impl BetaBaseMeasure {
    pub fn new(a: f64, b: f64) -> Result<Self> {
        check_positive("base measure alpha", a)?;
        check_positive("base measure beta", b)?;
        let dist = Beta::new(a, b).map_err(crate::errors::sampling_error)?;
        Ok(Self { a, b, dist })
    }
    pub fn draw<R: Rng>(&self, rng: &mut R) -> f64 {
        self.dist.sample(rng)
    }
    /// Draw from the posterior after observing `success` variant reads and `failure` reference reads.
    pub fn draw_posterior<R: Rng>(&self, success: u64, failure: u64, rng: &mut R) -> Result<f64> {
        let (a, b) = (self.a + success as f64, self.b + failure as f64);
        let posterior = Beta::new(a, b).map_err(crate::errors::sampling_error)?;
        Ok(posterior.sample(rng))
    }
}

/// Base measure over the parameters of a cluster, one prevalence for each sample.
/// If linked, a draw is one prevalence shared by all the samples.
#[derive(Debug, Clone, Copy)]
pub struct MultiSampleBaseMeasure {
    prevalence: BetaBaseMeasure,
    sample_num: usize,
    linked: bool,
}

impl MultiSampleBaseMeasure {
    pub fn new(prevalence: BetaBaseMeasure, sample_num: usize, linked: bool) -> Result<Self> {
        if sample_num == 0 {
            return Err(crate::errors::invalid_configuration(
                "at least one sample is required",
            ));
        }
        Ok(Self {
            prevalence,
            sample_num,
            linked,
        })
    }
    pub fn sample_num(&self) -> usize {
        self.sample_num
    }
    pub fn is_linked(&self) -> bool {
        self.linked
    }
    pub fn prevalence(&self) -> &BetaBaseMeasure {
        &self.prevalence
    }
    pub fn draw<R: Rng>(&self, rng: &mut R) -> Vec<f64> {
        match self.linked {
            true => vec![self.prevalence.draw(rng); self.sample_num],
            false => (0..self.sample_num)
                .map(|_| self.prevalence.draw(rng))
                .collect(),
        }
    }
}

/// Gamma(shape, rate) prior.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GammaPrior {
    pub shape: f64,
    pub rate: f64,
}

impl GammaPrior {
    pub fn new(shape: f64, rate: f64) -> Result<Self> {
        check_positive("gamma prior shape", shape)?;
        check_positive("gamma prior rate", rate)?;
        Ok(Self { shape, rate })
    }
    pub fn log_p(&self, x: f64) -> f64 {
        log_gamma_pdf(x, self.shape, self.rate)
    }
    pub fn mean(&self) -> f64 {
        self.shape / self.rate
    }
    pub fn draw<R: Rng>(&self, rng: &mut R) -> Result<f64> {
        let dist = Gamma::new(self.shape, self.rate.recip()).map_err(crate::errors::sampling_error)?;
        Ok(dist.sample(rng))
    }
}

pub(crate) fn check_positive(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && 0f64 < value {
        Ok(())
    } else {
        Err(Error::InvalidParameter { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;
    #[test]
    fn invalid_parameters() {
        assert!(BetaBaseMeasure::new(0f64, 1f64).is_err());
        assert!(BetaBaseMeasure::new(1f64, f64::NAN).is_err());
        assert!(GammaPrior::new(-1f64, 1f64).is_err());
        let beta = BetaBaseMeasure::new(1f64, 1f64).unwrap();
        assert!(MultiSampleBaseMeasure::new(beta, 0, true).is_err());
    }
    #[test]
    fn linked_draw() {
        let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(4234);
        let beta = BetaBaseMeasure::new(1f64, 1f64).unwrap();
        let linked = MultiSampleBaseMeasure::new(beta, 3, true).unwrap();
        for _ in 0..100 {
            let params = linked.draw(&mut rng);
            assert_eq!(params.len(), 3);
            assert!(params.iter().all(|&x| x == params[0]));
            assert!((0f64..=1f64).contains(&params[0]));
        }
        let unlinked = MultiSampleBaseMeasure::new(beta, 3, false).unwrap();
        let params = unlinked.draw(&mut rng);
        assert!(params.iter().any(|&x| x != params[0]));
    }
    #[test]
    fn gamma_mean() {
        let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(9);
        let prior = GammaPrior::new(3f64, 2f64).unwrap();
        let n = 20_000;
        let mean = (0..n).map(|_| prior.draw(&mut rng).unwrap()).sum::<f64>() / n as f64;
        assert!((mean - prior.mean()).abs() < 0.05, "{}", mean);
    }
    #[test]
    fn posterior_concentrates() {
        let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(9);
        let beta = BetaBaseMeasure::new(1f64, 1f64).unwrap();
        let n = 1000;
        let mean = (0..n)
            .map(|_| beta.draw_posterior(300, 700, &mut rng).unwrap())
            .sum::<f64>()
            / n as f64;
        assert!((mean - 0.3).abs() < 0.01, "{}", mean);
    }
}
