//! Four-vector arithmetic for records carrying `pt`, `eta`, `phi` and `mass` fields.

use std::ops::Add;

use crate::types::Record;

/// Cartesian four-momentum.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LorentzVector {
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    pub energy: f64,
}

impl LorentzVector {
    pub fn new(px: f64, py: f64, pz: f64, energy: f64) -> Self {
        Self { px, py, pz, energy }
    }

    pub fn from_pt_eta_phi_mass(pt: f64, eta: f64, phi: f64, mass: f64) -> Self {
        let px = pt * phi.cos();
        let py = pt * phi.sin();
        let pz = pt * eta.sinh();
        let p2 = px * px + py * py + pz * pz;
        Self::new(px, py, pz, (p2 + mass * mass).sqrt())
    }

    /// Build from a record's `pt`/`eta`/`phi` fields; a missing `mass` is taken as zero.
    pub fn from_record(record: &Record) -> Option<Self> {
        let pt = record.get_f64("pt")?;
        let eta = record.get_f64("eta")?;
        let phi = record.get_f64("phi")?;
        let mass = record.get_f64("mass").unwrap_or(0.0);
        Some(Self::from_pt_eta_phi_mass(pt, eta, phi, mass))
    }

    pub fn pt(&self) -> f64 {
        self.px.hypot(self.py)
    }

    pub fn phi(&self) -> f64 {
        self.py.atan2(self.px)
    }

    pub fn eta(&self) -> f64 {
        let pt = self.pt();
        if pt == 0.0 {
            return 0.0;
        }
        (self.pz / pt).asinh()
    }

    /// Invariant mass. Slightly space-like vectors from rounding report `0`.
    pub fn mass(&self) -> f64 {
        let m2 = self.energy * self.energy
            - (self.px * self.px + self.py * self.py + self.pz * self.pz);
        if m2 > 0.0 { m2.sqrt() } else { 0.0 }
    }
}

impl Add for LorentzVector {
    type Output = LorentzVector;

    fn add(self, rhs: LorentzVector) -> LorentzVector {
        LorentzVector::new(
            self.px + rhs.px,
            self.py + rhs.py,
            self.pz + rhs.pz,
            self.energy + rhs.energy,
        )
    }
}
