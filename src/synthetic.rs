//! Random step source standing in for a transport engine.
//!
//! Tracks are straight random walks with a crude energy loss per step. The
//! point is to exercise the scoring interface with realistic call patterns
//! (many steps per event, repeated voxels, secondaries), not to model physics.

use rand::Rng;
use rand::rngs::StdRng;

use voxdose::{ParticleKind, Point, Step, VoxelGeometry, VoxelGrid};

/// Probability that a neutron step spawns a secondary gamma track.
const GAMMA_YIELD: f64 = 0.3;
/// Probability that a neutron step spawns a recoil proton track.
const PROTON_YIELD: f64 = 0.1;

pub struct SyntheticSource {
    grid: VoxelGrid,
    materials: Vec<String>,
    steps_per_track: usize,
    rng: StdRng,
}

impl SyntheticSource {
    pub fn new(grid: VoxelGrid, materials: Vec<String>, steps_per_track: usize, rng: StdRng) -> Self {
        Self {
            grid,
            materials,
            steps_per_track,
            rng,
        }
    }

    /// Tracks of one event, primary first. Each track is a list of steps.
    pub fn next_event(&mut self) -> Vec<Vec<Step>> {
        let mut tracks = Vec::new();
        let mut secondaries = Vec::new();

        let start = self.random_position();
        let energy = 10f64.powf(self.rng.gen_range(-2.0..1.0));
        let primary = self.walk("neutron", start, energy, self.steps_per_track);

        for step in &primary {
            if self.rng.gen_bool(GAMMA_YIELD) {
                let e = self.rng.gen_range(0.1..5.0);
                secondaries.push(self.walk("gamma", step.pre_step_position, e, 3));
            }
            if self.rng.gen_bool(PROTON_YIELD) {
                let e = step.kinetic_energy * self.rng.gen_range(0.0..1.0);
                secondaries.push(self.walk("proton", step.pre_step_position, e, 1));
            }
        }

        tracks.push(primary);
        tracks.extend(secondaries);
        tracks
    }

    /// Straight track of a particle named the way a transport engine names it.
    fn walk(&mut self, particle: &str, start: Point, energy: f64, max_steps: usize) -> Vec<Step> {
        let [dx, dy, dz] = random_unit_vector(&mut self.rng);
        let max_len = self.grid.voxel_size().into_iter().fold(f64::INFINITY, f64::min);

        let mut steps = Vec::with_capacity(max_steps);
        let mut position = start;
        let mut energy = energy;
        for _ in 0..max_steps {
            let Ok(index) = self.grid.resolve_voxel_index(position) else {
                break; // left the scored volume
            };
            let material = &self.materials[index % self.materials.len()];
            let length = self.rng.gen_range(0.0..max_len);
            let kind = ParticleKind::from_name(particle);
            steps.push(Step::new(kind, material, energy, length, position));

            position = position.offset(dx * length, dy * length, dz * length);
            energy *= self.rng.gen_range(0.7..1.0);
        }
        steps
    }

    fn random_position(&mut self) -> Point {
        let min = self.grid.min_corner();
        let half = self.grid.half_size();
        min.offset(
            self.rng.gen_range(0.0..2.0 * half[0]),
            self.rng.gen_range(0.0..2.0 * half[1]),
            self.rng.gen_range(0.0..2.0 * half[2]),
        )
    }
}

/// Generate a random unit vector uniformly distributed on the sphere.
fn random_unit_vector(rng: &mut impl Rng) -> [f64; 3] {
    loop {
        let x: f64 = rng.gen_range(-1.0..1.0);
        let y: f64 = rng.gen_range(-1.0..1.0);
        let z: f64 = rng.gen_range(-1.0..1.0);
        let len2 = x * x + y * y + z * z;
        if len2 > 1e-6 && len2 <= 1.0 {
            let len = len2.sqrt();
            return [x / len, y / len, z / len];
        }
    }
}
