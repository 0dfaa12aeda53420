//! Automatic selection of the minimum vertex coverage from the
//! disjoint-set size histogram.
//!
//! Coverage histograms of long-read runs are bimodal: a tall spike at
//! coverage 1–2 from sequencing error, then a broad peak around the
//! sequencing depth. The cutoff we want is the valley between the two.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PeakFinderError {
    #[error(
        "no significant peak in the size distribution: observed area fraction \
         {observed:.4}, minimum required {minimum:.4}"
    )]
    NoSignificantPeak { observed: f64, minimum: f64 },
    #[error("size distribution is empty")]
    EmptyHistogram,
}

/// Find the coverage cutoff for the given size histogram
/// (`histogram[size] = frequency`).
///
/// The dominant peak at or beyond `area_start_index` is located first; the
/// cutoff is the lowest-frequency bin between 1 and that peak. The peak is
/// accepted only if the area at and beyond the cutoff is at least
/// `min_area_fraction` of the total area, otherwise the caller is expected
/// to fall back to a default.
pub fn find_cutoff(
    histogram: &[u64],
    min_area_fraction: f64,
    area_start_index: usize,
) -> Result<u64, PeakFinderError> {
    let total_area: u64 = histogram.iter().sum();
    if total_area == 0 {
        return Err(PeakFinderError::EmptyHistogram);
    }

    // Dominant peak at or beyond the start index. Ties break low, which is
    // conservative.
    let mut peak = None;
    for (x, &frequency) in histogram.iter().enumerate().skip(area_start_index.max(1)) {
        if frequency == 0 {
            continue;
        }
        match peak {
            None => peak = Some((x, frequency)),
            Some((_, best)) if frequency > best => peak = Some((x, frequency)),
            _ => {}
        }
    }
    let (peak_x, _) = peak.ok_or(PeakFinderError::NoSignificantPeak {
        observed: 0.,
        minimum: min_area_fraction,
    })?;

    // Valley: lowest-frequency bin in (0, peak_x]. The first minimum wins
    // so the cutoff stays as low as the data allows.
    let mut cutoff = peak_x;
    let mut lowest = u64::MAX;
    for (x, &frequency) in histogram.iter().enumerate().take(peak_x + 1).skip(1) {
        if frequency < lowest {
            lowest = frequency;
            cutoff = x;
        }
    }

    let area_beyond: u64 = histogram[cutoff..].iter().sum();
    let observed = area_beyond as f64 / total_area as f64;
    if observed < min_area_fraction {
        return Err(PeakFinderError::NoSignificantPeak {
            observed,
            minimum: min_area_fraction,
        });
    }
    Ok(cutoff as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bimodal_histogram_cuts_at_the_valley() {
        // Error spike at 1-2, genomic peak at 10.
        let mut histogram = vec![0u64; 16];
        histogram[1] = 500;
        histogram[2] = 120;
        histogram[3] = 20;
        histogram[4] = 5;
        histogram[5] = 8;
        histogram[6] = 12;
        histogram[7] = 40;
        histogram[8] = 60;
        histogram[9] = 150;
        histogram[10] = 300;
        histogram[11] = 140;
        histogram[12] = 50;
        let cutoff = find_cutoff(&histogram, 0.08, 2).unwrap();
        assert_eq!(cutoff, 4);
    }

    #[test]
    fn flat_histogram_reports_observed_fraction() {
        // Monotone decreasing: no genomic peak, nearly all area below any
        // plausible cutoff.
        let histogram = vec![0u64, 10_000, 100, 3, 1, 1, 1];
        let err = find_cutoff(&histogram, 0.1, 2).unwrap_err();
        match err {
            PeakFinderError::NoSignificantPeak { observed, minimum } => {
                assert!(observed < minimum);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn empty_histogram_is_an_error() {
        assert!(matches!(
            find_cutoff(&[], 0.1, 2),
            Err(PeakFinderError::EmptyHistogram)
        ));
        assert!(matches!(
            find_cutoff(&[0, 0, 0], 0.1, 2),
            Err(PeakFinderError::EmptyHistogram)
        ));
    }
}
