use std::sync::Arc;

use aimtrack_core::{GrayImage, RgbImage, VisionGeometry};
use serde::Serialize;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::extractor::{Candidate, CandidateExtractor};
use crate::params::DetectorParams;
use crate::scorer::TargetScorer;
use crate::target::Target;
use crate::validation::{ScoreRule, ValidationRule};

/// Every evaluated target of one image plus the index of the best one.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Detection {
    pub targets: Vec<Target>,
    pub best: Option<usize>,
}

impl Detection {
    pub fn best_target(&self) -> Option<&Target> {
        self.best.and_then(|i| self.targets.get(i))
    }

    pub fn valid_count(&self) -> usize {
        self.targets.iter().filter(|t| t.valid).count()
    }
}

/// Index of the valid target with the greatest score.
///
/// Equal scores keep the first one encountered.
pub fn select_best(targets: &[Target]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, t) in targets.iter().enumerate() {
        let Some(score) = t.score.filter(|_| t.valid) else {
            continue;
        };
        if best.is_none_or(|(_, s)| score > s) {
            best = Some((i, score));
        }
    }
    best.map(|(i, _)| i)
}

/// Extraction plus scoring over one shared geometry backend.
#[derive(Debug)]
pub struct TargetDetector<G> {
    params: DetectorParams,
    extractor: CandidateExtractor<Arc<G>>,
    scorer: TargetScorer<Arc<G>>,
}

impl<G: VisionGeometry> TargetDetector<G> {
    pub fn new(geometry: G, params: DetectorParams) -> Self {
        Self::from_shared(Arc::new(geometry), params)
    }

    pub fn from_shared(geometry: Arc<G>, params: DetectorParams) -> Self {
        Self {
            extractor: CandidateExtractor::new(Arc::clone(&geometry), params.extraction.clone()),
            scorer: TargetScorer::new(geometry, params.target.clone()),
            params,
        }
    }

    pub fn with_validators(mut self, validators: Vec<ValidationRule>) -> Self {
        self.scorer = self.scorer.with_validators(validators);
        self
    }

    pub fn with_scorers(mut self, scorers: Vec<ScoreRule>) -> Self {
        self.scorer = self.scorer.with_scorers(scorers);
        self
    }

    #[inline]
    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    pub fn extractor(&self) -> &CandidateExtractor<Arc<G>> {
        &self.extractor
    }

    pub fn scorer(&self) -> &TargetScorer<Arc<G>> {
        &self.scorer
    }

    /// Evaluate every candidate in `image` and pick the best valid one.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self, image)))]
    pub fn detect(&self, image: &RgbImage, arm_angle: f64) -> Detection {
        let candidates = self.extractor.extract(image);
        let gray = (self.params.target.corner_refinement.is_some() && !candidates.is_empty())
            .then(|| GrayImage::from_rgb(image));
        self.evaluate_all(gray.as_ref(), &candidates, arm_angle)
    }

    /// Evaluate already extracted candidates. No source image is available,
    /// so corners are not refined.
    pub fn detect_candidates(&self, candidates: &[Candidate], arm_angle: f64) -> Detection {
        self.evaluate_all(None, candidates, arm_angle)
    }

    fn evaluate_all(
        &self,
        gray: Option<&GrayImage>,
        candidates: &[Candidate],
        arm_angle: f64,
    ) -> Detection {
        let targets: Vec<Target> = candidates
            .iter()
            .map(|c| self.scorer.evaluate_in(gray, c, arm_angle))
            .collect();
        let best = select_best(&targets);
        log::trace!(
            "{} candidates, {} valid",
            targets.len(),
            targets.iter().filter(|t| t.valid).count()
        );
        Detection { targets, best }
    }
}
