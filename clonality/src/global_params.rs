//! Metropolis-Hastings updates of the global parameters,
//! the concentration of the Dirichlet process and the precision of the Beta-Binomial density.
use crate::base_measure::{check_positive, GammaPrior};
use crate::density::{DensityModel, MutationEvidence};
use crate::errors::Result;
use crate::misc::log_gamma_pdf;
use crate::partition::Partition;
use rand::Rng;
use rand_distr::{Distribution, Gamma};
use statrs::function::gamma::ln_gamma;

/// Gamma proposal centered at the current value. Larger precision, smaller steps.
#[derive(Debug, Clone, Copy)]
pub struct GammaProposal {
    precision: f64,
}

impl GammaProposal {
    pub fn new(precision: f64) -> Result<Self> {
        check_positive("proposal precision", precision)?;
        Ok(Self { precision })
    }
    pub fn propose<R: Rng>(&self, current: f64, rng: &mut R) -> Result<f64> {
        let scale = current / self.precision;
        let dist = Gamma::new(self.precision, scale).map_err(crate::errors::sampling_error)?;
        Ok(dist.sample(rng))
    }
    /// log q(to|from).
    pub fn log_q(&self, to: f64, from: f64) -> f64 {
        log_gamma_pdf(to, self.precision, self.precision / from)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MetropolisHastingsSampler {
    prior: GammaPrior,
    proposal: GammaProposal,
}

impl MetropolisHastingsSampler {
    pub fn new(prior: GammaPrior, proposal: GammaProposal) -> Self {
        Self { prior, proposal }
    }
    /// Log acceptance ratio of moving from `current` to `proposed`, given the log likelihoods of both.
    pub fn log_acceptance_ratio(&self, current: f64, proposed: f64, current_lk: f64, proposed_lk: f64) -> f64 {
        let prior = self.prior.log_p(proposed) - self.prior.log_p(current);
        let hastings = self.proposal.log_q(current, proposed) - self.proposal.log_q(proposed, current);
        prior + hastings + proposed_lk - current_lk
    }
    /// One Metropolis-Hastings step. `log_likelihood` is evaluated on the current and proposed values.
    pub fn update<R, F>(&self, current: f64, mut log_likelihood: F, rng: &mut R) -> Result<f64>
    where
        R: Rng,
        F: FnMut(f64) -> Result<f64>,
    {
        check_positive("current value", current)?;
        let proposed = self.proposal.propose(current, rng)?;
        // Underflow of the Gamma draw.
        if !(proposed.is_finite() && 0f64 < proposed) {
            return Ok(current);
        }
        let current_lk = log_likelihood(current)?;
        let proposed_lk = log_likelihood(proposed)?;
        let ratio = self.log_acceptance_ratio(current, proposed, current_lk, proposed_lk);
        if !ratio.is_nan() && rng.gen::<f64>().ln() < ratio {
            trace!("MH\t{:.4}->{:.4}\t{:.3}\tAccept", current, proposed, ratio);
            Ok(proposed)
        } else {
            trace!("MH\t{:.4}->{:.4}\t{:.3}\tReject", current, proposed, ratio);
            Ok(current)
        }
    }
}

/// Log probability of a partition with `cluster_num` clusters over `mutation_num` mutations
/// under the Chinese restaurant process, up to the terms free of `alpha`.
pub fn concentration_log_likelihood(alpha: f64, cluster_num: usize, mutation_num: usize) -> f64 {
    cluster_num as f64 * alpha.ln() + ln_gamma(alpha) - ln_gamma(alpha + mutation_num as f64)
}

/// Beta-Binomial log likelihood of every mutation under its cluster, with the given precision.
pub fn precision_log_likelihood(
    precision: f64,
    partition: &Partition,
    evidence: &[MutationEvidence],
) -> Result<f64> {
    let density = DensityModel::BetaBinomial { precision };
    evidence
        .iter()
        .enumerate()
        .map(|(i, mutation)| density.log_likelihood(mutation, partition.params_of(i)))
        .sum()
}
