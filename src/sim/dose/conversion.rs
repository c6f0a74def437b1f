use crate::error::DoseError;

use super::curves::ConversionCurve;

/// Inputs of one fluence-to-dose conversion.
///
/// Energies are in MeV, lengths in meters and volumes in m^3.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoseQuery<'a> {
    pub energy: f64,
    pub material: &'a str,
    pub step_length: f64,
    pub voxel_volume: f64,
}

impl<'a> DoseQuery<'a> {
    /// Builds a query, rejecting physically impossible inputs.
    pub fn new(
        energy: f64,
        material: &'a str,
        step_length: f64,
        voxel_volume: f64,
    ) -> Result<Self, DoseError> {
        if !energy.is_finite() || energy < 0.0 {
            return Err(DoseError::InvalidEnergy(energy));
        }
        if !step_length.is_finite() || step_length < 0.0 {
            return Err(DoseError::InvalidStepLength(step_length));
        }
        if !voxel_volume.is_finite() || voxel_volume <= 0.0 {
            return Err(DoseError::InvalidVoxelVolume(voxel_volume));
        }
        Ok(Self {
            energy,
            material,
            step_length,
            voxel_volume,
        })
    }

    /// Track-length estimate of the fluence in the voxel, in 1/m^2.
    pub fn fluence(&self) -> f64 {
        self.step_length / self.voxel_volume
    }
}

/// Converts a step into absorbed dose (Gy).
///
/// Implementations must be pure with respect to the query: caching tables
/// keyed by material is fine, state that changes results between calls is
/// not.
pub trait ConversionFactorProvider {
    /// Dose from the uncorrected conversion factor.
    fn dose(&self, query: &DoseQuery) -> Result<f64, DoseError>;

    /// Dose from the corrected conversion factor.
    fn corrected_dose(&self, query: &DoseQuery) -> Result<f64, DoseError>;

    /// Dose scored for secondary photons by the track-length estimator.
    fn corrected_dose_alternate_estimator(&self, query: &DoseQuery) -> Result<f64, DoseError>;

    /// Conversion-factor curve of a material, for export.
    fn conversion_curve(&self, material: &str) -> Result<ConversionCurve, DoseError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_validation() {
        assert!(DoseQuery::new(0.0, "Water", 0.0, 1e-6).is_ok());
        assert_eq!(
            DoseQuery::new(-1.0, "Water", 0.1, 1e-6),
            Err(DoseError::InvalidEnergy(-1.0))
        );
        assert_eq!(
            DoseQuery::new(1.0, "Water", -0.1, 1e-6),
            Err(DoseError::InvalidStepLength(-0.1))
        );
        assert_eq!(
            DoseQuery::new(1.0, "Water", 0.1, 0.0),
            Err(DoseError::InvalidVoxelVolume(0.0))
        );
        assert!(DoseQuery::new(f64::NAN, "Water", 0.1, 1e-6).is_err());
        assert_eq!(
            DoseQuery::new(f64::INFINITY, "Water", 0.1, 1e-6),
            Err(DoseError::InvalidEnergy(f64::INFINITY))
        );
        assert_eq!(
            DoseQuery::new(1.0, "Water", f64::INFINITY, 1e-6),
            Err(DoseError::InvalidStepLength(f64::INFINITY))
        );
        assert!(DoseQuery::new(1.0, "Water", f64::NAN, 1e-6).is_err());
    }

    #[test]
    fn test_fluence() {
        let q = DoseQuery::new(1.0, "Water", 0.02, 1e-6).unwrap();
        assert!((q.fluence() - 2e4).abs() < 1e-6);
    }
}
