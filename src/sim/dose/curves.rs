use serde::{Deserialize, Serialize};

use crate::error::DoseError;

/// Conversion factor of one material as a function of energy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionCurve {
    pub material: String,
    /// Energies in MeV.
    pub energies: Vec<f64>,
    /// Conversion factors in Gy*m^2.
    pub factors: Vec<f64>,
}

/// Captures the conversion curve of every distinct material seen in a run.
///
/// Each material is recorded once, on first encounter; insertion order is
/// kept so exports are deterministic.
#[derive(Debug, Clone, Default)]
pub struct ConversionCurveCollector {
    curves: Vec<(String, ConversionCurve)>,
}

impl ConversionCurveCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, material: &str) -> bool {
        self.curves.iter().any(|(name, _)| name == material)
    }

    /// Stores the curve from `supplier` if `material` was not seen before.
    ///
    /// The supplier is invoked at most once per material. Returns whether a
    /// new curve was recorded.
    pub fn record_if_new<F>(&mut self, material: &str, supplier: F) -> Result<bool, DoseError>
    where
        F: FnOnce() -> Result<ConversionCurve, DoseError>,
    {
        if self.contains(material) {
            return Ok(false);
        }
        let curve = supplier()?;
        log::debug!("recorded conversion curve for material '{material}'");
        self.curves.push((material.to_string(), curve));
        Ok(true)
    }

    /// Adds the curves of `other` for materials not recorded here yet.
    pub fn absorb(&mut self, other: &ConversionCurveCollector) {
        for (name, curve) in &other.curves {
            if !self.contains(name) {
                self.curves.push((name.clone(), curve.clone()));
            }
        }
    }

    pub fn materials(&self) -> impl Iterator<Item = &str> {
        self.curves.iter().map(|(name, _)| name.as_str())
    }

    pub fn curves(&self) -> impl Iterator<Item = &ConversionCurve> {
        self.curves.iter().map(|(_, curve)| curve)
    }

    pub fn get(&self, material: &str) -> Option<&ConversionCurve> {
        self.curves
            .iter()
            .find(|(name, _)| name == material)
            .map(|(_, curve)| curve)
    }

    pub fn len(&self) -> usize {
        self.curves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    pub fn clear(&mut self) {
        self.curves.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(material: &str) -> ConversionCurve {
        ConversionCurve {
            material: material.to_string(),
            energies: vec![1e-3, 1.0],
            factors: vec![1e-15, 2e-15],
        }
    }

    #[test]
    fn test_distinct_materials_recorded_once() {
        let mut c = ConversionCurveCollector::new();
        let names = ["Water", "Bone", "Air"];
        let mut calls = 0;
        for i in 0..100 {
            let name = names[(i * 7) % 3];
            c.record_if_new(name, || {
                calls += 1;
                Ok(curve(name))
            })
            .unwrap();
        }
        assert_eq!(c.len(), 3);
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let mut c = ConversionCurveCollector::new();
        for name in ["Bone", "Water", "Bone", "Air", "Water"] {
            c.record_if_new(name, || Ok(curve(name))).unwrap();
        }
        let order: Vec<&str> = c.materials().collect();
        assert_eq!(order, vec!["Bone", "Water", "Air"]);
        assert_eq!(c.get("Air").unwrap().material, "Air");
    }

    #[test]
    fn test_supplier_error_is_propagated_and_nothing_recorded() {
        let mut c = ConversionCurveCollector::new();
        let err = c
            .record_if_new("Unobtainium", || {
                Err(DoseError::UnknownMaterial("Unobtainium".to_string()))
            })
            .unwrap_err();
        assert_eq!(err, DoseError::UnknownMaterial("Unobtainium".to_string()));
        assert!(c.is_empty());
    }

    #[test]
    fn test_absorb_keeps_existing_entries() {
        let mut a = ConversionCurveCollector::new();
        a.record_if_new("Water", || Ok(curve("Water"))).unwrap();
        let mut b = ConversionCurveCollector::new();
        b.record_if_new("Air", || Ok(curve("Air"))).unwrap();
        b.record_if_new("Water", || Ok(curve("Water"))).unwrap();

        a.absorb(&b);
        let order: Vec<&str> = a.materials().collect();
        assert_eq!(order, vec!["Water", "Air"]);

        a.clear();
        assert!(a.is_empty());
    }
}
