use serde::{Deserialize, Serialize};

/// A single bulk-storage reservoir. Capacities are MWh, rates MW per hour,
/// efficiencies in (0, 1], parasitic self-discharge a fraction per hour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSystem {
    pub capacity: f64,
    pub initial_level: f64,
    pub recharge_max: f64,
    pub recharge_eff: f64,
    pub discharge_max: f64,
    pub discharge_eff: f64,
    pub parasitic_loss: f64,
}

impl StorageSystem {
    pub fn new(
        capacity: f64,
        initial_level: f64,
        recharge_max: f64,
        recharge_eff: f64,
        discharge_max: f64,
        discharge_eff: f64,
        parasitic_loss: f64,
    ) -> Self {
        Self {
            capacity: capacity.max(0.0),
            initial_level: initial_level.clamp(0.0, capacity.max(0.0)),
            recharge_max: recharge_max.max(0.0),
            recharge_eff: recharge_eff.clamp(f64::MIN_POSITIVE, 1.0),
            discharge_max: discharge_max.max(0.0),
            discharge_eff: discharge_eff.clamp(f64::MIN_POSITIVE, 1.0),
            parasitic_loss: parasitic_loss.clamp(0.0, 1.0 - f64::EPSILON),
        }
    }

    /// Absorb surplus into the reservoir. Returns the energy drawn from the
    /// surplus (before the efficiency haircut); `level` is raised by the
    /// amount that actually lands in the reservoir.
    pub fn charge(&self, level: &mut f64, surplus: f64) -> f64 {
        let headroom = (self.capacity - *level) / self.recharge_eff;
        let request = surplus.min(self.recharge_max).min(headroom).max(0.0);
        *level += request * self.recharge_eff;
        request
    }

    /// Serve a deficit from the reservoir. Returns the energy delivered to
    /// the bus; `level` is lowered by the amount withdrawn.
    pub fn discharge(&self, level: &mut f64, deficit: f64) -> f64 {
        let request = (deficit / self.discharge_eff)
            .min(self.discharge_max)
            .min(*level)
            .max(0.0);
        *level = (*level - request).max(0.0);
        request * self.discharge_eff
    }

    /// Hourly parasitic decay applied before charge/discharge.
    pub fn decay(&self, level: &mut f64) -> f64 {
        let lost = *level * self.parasitic_loss;
        *level -= lost;
        lost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reservoir() -> StorageSystem {
        StorageSystem::new(200.0, 0.0, 100.0, 0.9, 100.0, 0.9, 0.0)
    }

    #[test]
    fn charge_respects_rate_and_headroom() {
        let s = reservoir();
        let mut level = 0.0;
        let drawn = s.charge(&mut level, 50.0);
        assert_eq!(drawn, 50.0);
        assert!((level - 45.0).abs() < 1e-12);

        // Nearly full: headroom limits the request
        let mut level = 199.0;
        let drawn = s.charge(&mut level, 50.0);
        assert!((drawn - 1.0 / 0.9).abs() < 1e-12);
        assert!((level - 200.0).abs() < 1e-9);
    }

    #[test]
    fn discharge_respects_level() {
        let s = reservoir();
        let mut level = 45.0;
        let delivered = s.discharge(&mut level, 50.0);
        assert!((delivered - 40.5).abs() < 1e-12);
        assert_eq!(level, 0.0);
    }

    #[test]
    fn initial_level_is_clamped() {
        let s = StorageSystem::new(100.0, 250.0, 10.0, 0.9, 10.0, 0.9, 0.0);
        assert_eq!(s.initial_level, 100.0);
        let s = StorageSystem::new(100.0, -5.0, 10.0, 0.9, 10.0, 0.9, 0.0);
        assert_eq!(s.initial_level, 0.0);
    }

    #[test]
    fn parasitic_decay() {
        let s = StorageSystem::new(100.0, 0.0, 10.0, 0.9, 10.0, 0.9, 0.01);
        let mut level = 50.0;
        let lost = s.decay(&mut level);
        assert!((lost - 0.5).abs() < 1e-12);
        assert!((level - 49.5).abs() < 1e-12);
    }
}
