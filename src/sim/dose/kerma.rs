//! Tabulated kerma factors.
//!
//! Dose is estimated with the track-length estimator: the fluence in a voxel
//! is the step length divided by the voxel volume, and
//!
//! ```text
//! D_neutron = K(E) * L / V                [Gy]
//! D_gamma   = E * (mu_en/rho)(E) * L / V  [Gy]
//! ```
//!
//! with `K` in Gy*m^2, `E` in MeV (converted to J for photons), `mu_en/rho`
//! in m^2/kg, `L` in m and `V` in m^3.
//!
//! Table edges: below the first tabulated energy the factor is 0 (no dose is
//! scored), above the last one the last tabulated factor is held.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::DoseError;

use super::conversion::{ConversionFactorProvider, DoseQuery};
use super::curves::ConversionCurve;

/// 1 MeV in joules.
pub const MEV_TO_JOULE: f64 = 1.602_176_634e-13;

/// Tabulated function of energy, interpolated log-log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabulatedCurve {
    /// Strictly increasing energies in MeV.
    pub energies: Vec<f64>,
    pub values: Vec<f64>,
}

impl TabulatedCurve {
    pub fn new(energies: Vec<f64>, values: Vec<f64>) -> Self {
        Self { energies, values }
    }

    fn validate(&self) -> Result<(), String> {
        if self.energies.is_empty() {
            return Err("curve has no points".to_string());
        }
        if self.energies.len() != self.values.len() {
            return Err(format!(
                "{} energies but {} values",
                self.energies.len(),
                self.values.len()
            ));
        }
        if self
            .energies
            .iter()
            .any(|e| !e.is_finite() || *e <= 0.0)
        {
            return Err("energies must be positive and finite".to_string());
        }
        if self.energies.windows(2).any(|w| w[1] <= w[0]) {
            return Err("energies must be strictly increasing".to_string());
        }
        if self.values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err("values must be non-negative and finite".to_string());
        }
        Ok(())
    }

    pub fn min_energy(&self) -> f64 {
        self.energies[0]
    }

    pub fn max_energy(&self) -> f64 {
        self.energies[self.energies.len() - 1]
    }

    /// Value at `energy`, following the table-edge policy of this module.
    pub fn evaluate(&self, energy: f64) -> f64 {
        let n = self.energies.len();
        if energy < self.min_energy() {
            return 0.0;
        }
        if energy >= self.max_energy() {
            return self.values[n - 1];
        }

        // First point strictly above `energy`; 1 <= hi <= n - 1 here.
        let hi = self.energies.partition_point(|&e| e <= energy);
        let lo = hi - 1;
        let (e0, e1) = (self.energies[lo], self.energies[hi]);
        let (v0, v1) = (self.values[lo], self.values[hi]);

        if v0 > 0.0 && v1 > 0.0 {
            let t = (energy / e0).ln() / (e1 / e0).ln();
            (v0.ln() + t * (v1 / v0).ln()).exp()
        } else {
            let t = (energy - e0) / (e1 - e0);
            v0 + t * (v1 - v0)
        }
    }
}

/// Conversion data of one material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialKerma {
    /// Neutron kerma factor, Gy*m^2.
    pub kerma: TabulatedCurve,
    /// Corrected neutron kerma factor, Gy*m^2.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_kerma: Option<TabulatedCurve>,
    /// Photon mass energy-absorption coefficient, m^2/kg.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photon_mu_en: Option<TabulatedCurve>,
}

impl MaterialKerma {
    pub fn new(kerma: TabulatedCurve) -> Self {
        Self {
            kerma,
            corrected_kerma: None,
            photon_mu_en: None,
        }
    }

    pub fn with_corrected_kerma(mut self, curve: TabulatedCurve) -> Self {
        self.corrected_kerma = Some(curve);
        self
    }

    pub fn with_photon_mu_en(mut self, curve: TabulatedCurve) -> Self {
        self.photon_mu_en = Some(curve);
        self
    }

    fn validate(&self, name: &str) -> Result<(), DoseError> {
        let curves = [
            Some(&self.kerma),
            self.corrected_kerma.as_ref(),
            self.photon_mu_en.as_ref(),
        ];
        for curve in curves.into_iter().flatten() {
            curve.validate().map_err(|reason| DoseError::InvalidTable {
                material: name.to_string(),
                reason,
            })?;
        }
        Ok(())
    }
}

/// Kerma factors per material name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KermaTable {
    materials: HashMap<String, MaterialKerma>,
}

impl KermaTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the data of one material.
    pub fn insert(&mut self, name: &str, data: MaterialKerma) -> Result<(), DoseError> {
        data.validate(name)?;
        self.materials.insert(name.to_string(), data);
        Ok(())
    }

    pub fn with_material(mut self, name: &str, data: MaterialKerma) -> Result<Self, DoseError> {
        self.insert(name, data)?;
        Ok(self)
    }

    /// Checks every material; needed after deserialization.
    pub fn validate(&self) -> Result<(), DoseError> {
        for (name, data) in &self.materials {
            data.validate(name)?;
        }
        Ok(())
    }

    pub fn get(&self, material: &str) -> Result<&MaterialKerma, DoseError> {
        self.materials
            .get(material)
            .ok_or_else(|| DoseError::UnknownMaterial(material.to_string()))
    }

    /// Material names in sorted order.
    pub fn material_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.materials.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

impl ConversionFactorProvider for KermaTable {
    fn dose(&self, query: &DoseQuery) -> Result<f64, DoseError> {
        let data = self.get(query.material)?;
        Ok(data.kerma.evaluate(query.energy) * query.fluence())
    }

    fn corrected_dose(&self, query: &DoseQuery) -> Result<f64, DoseError> {
        let data = self.get(query.material)?;
        let curve = data
            .corrected_kerma
            .as_ref()
            .ok_or_else(|| DoseError::MissingCurve {
                material: query.material.to_string(),
                curve: "corrected kerma",
            })?;
        Ok(curve.evaluate(query.energy) * query.fluence())
    }

    fn corrected_dose_alternate_estimator(&self, query: &DoseQuery) -> Result<f64, DoseError> {
        let data = self.get(query.material)?;
        let curve = data
            .photon_mu_en
            .as_ref()
            .ok_or_else(|| DoseError::MissingCurve {
                material: query.material.to_string(),
                curve: "photon energy-absorption",
            })?;
        let energy_j = query.energy * MEV_TO_JOULE;
        Ok(energy_j * curve.evaluate(query.energy) * query.fluence())
    }

    fn conversion_curve(&self, material: &str) -> Result<ConversionCurve, DoseError> {
        let data = self.get(material)?;
        Ok(ConversionCurve {
            material: material.to_string(),
            energies: data.kerma.energies.clone(),
            factors: data.kerma.values.clone(),
        })
    }
}
