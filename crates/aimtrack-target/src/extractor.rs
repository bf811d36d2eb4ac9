use aimtrack_core::{GrayImage, Polygon, RgbImage, VisionGeometry};
use serde::Serialize;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::params::ExtractionParams;

/// Convex outline of one connected blob.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Candidate {
    pub points: Polygon,
}

impl Candidate {
    pub fn new(points: Polygon) -> Self {
        Self { points }
    }
}

/// Turns a camera image into raw target candidates.
#[derive(Clone, Debug)]
pub struct CandidateExtractor<G> {
    geometry: G,
    params: ExtractionParams,
}

impl<G: VisionGeometry> CandidateExtractor<G> {
    pub fn new(geometry: G, params: ExtractionParams) -> Self {
        Self { geometry, params }
    }

    #[inline]
    pub fn params(&self) -> &ExtractionParams {
        &self.params
    }

    /// Binary mask after thresholding and median filtering.
    pub fn mask(&self, image: &RgbImage) -> GrayImage {
        let mask = self.geometry.threshold(image, &self.params.hsv);
        self.geometry.median_filter(&mask, self.params.blur_size)
    }

    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
    pub fn extract(&self, image: &RgbImage) -> Vec<Candidate> {
        self.extract_from_mask(&self.mask(image))
    }

    /// Convex hull of every outer contour in `mask`.
    pub fn extract_from_mask(&self, mask: &GrayImage) -> Vec<Candidate> {
        self.geometry
            .find_contours(mask)
            .iter()
            .map(|contour| self.geometry.convex_hull(contour))
            .filter(|hull| !hull.is_empty())
            .map(Candidate::new)
            .collect()
    }
}
