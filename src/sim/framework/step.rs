use crate::Point;

/// Particle classification relevant to dose scoring.
///
/// Resolved once per step from the transport engine's particle name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParticleKind {
    Neutron,
    Gamma,
    /// Any other particle (electrons, protons, ions, ...).
    Other,
}

impl ParticleKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "neutron" => Self::Neutron,
            "gamma" => Self::Gamma,
            _ => Self::Other,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Neutron => "neutron",
            Self::Gamma => "gamma",
            Self::Other => "other",
        }
    }
}

/// What the transport engine should do with the track after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackStatus {
    #[default]
    Alive,
    /// Stop transporting the particle immediately.
    StopAndKill,
}

impl TrackStatus {
    /// Combines decisions of several observers; any kill wins.
    pub fn combine(self, other: Self) -> Self {
        match (self, other) {
            (Self::Alive, Self::Alive) => Self::Alive,
            _ => Self::StopAndKill,
        }
    }
}

/// One segment of particle travel with locally constant material and energy.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub particle: ParticleKind,
    /// Material at the pre-step point.
    pub material: String,
    /// Kinetic energy at the pre-step point in MeV.
    pub kinetic_energy: f64,
    /// Step length in meters.
    pub step_length: f64,
    pub pre_step_position: Point,
}

impl Step {
    pub fn new(
        particle: ParticleKind,
        material: &str,
        kinetic_energy: f64,
        step_length: f64,
        pre_step_position: Point,
    ) -> Self {
        Self {
            particle,
            material: material.to_string(),
            kinetic_energy,
            step_length,
            pre_step_position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_particle_mapping_is_total() {
        assert_eq!(ParticleKind::from_name("neutron"), ParticleKind::Neutron);
        assert_eq!(ParticleKind::from_name("gamma"), ParticleKind::Gamma);
        assert_eq!(ParticleKind::from_name("e-"), ParticleKind::Other);
        assert_eq!(ParticleKind::from_name(""), ParticleKind::Other);
        assert_eq!(ParticleKind::from_name("Neutron"), ParticleKind::Other);
    }

    #[test]
    fn test_track_status_combine() {
        use TrackStatus::*;
        assert_eq!(Alive.combine(Alive), Alive);
        assert_eq!(Alive.combine(StopAndKill), StopAndKill);
        assert_eq!(StopAndKill.combine(Alive), StopAndKill);
        assert_eq!(TrackStatus::default(), Alive);
    }
}
