use std::time::{SystemTime, UNIX_EPOCH};

/// Seeded roll stream for combat. Every random draw a battle makes
/// (damage, evasion, crit, drops) comes from one of these, so a replay
/// of the same action sequence with the same seed reproduces results
/// bit for bit.
#[derive(Debug, Clone, Copy)]
pub struct RollStream {
    state: u64,
}

impl RollStream {
    pub fn from_time() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_nanos() as u64)
            .unwrap_or(0x9e3779b97f4a7c15);
        Self::from_seed(seed)
    }

    pub fn from_seed(seed: u64) -> Self {
        let seed = if seed == 0 { 0x9e3779b97f4a7c15 } else { seed };
        Self { state: seed }
    }

    fn next(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1);
        (self.state >> 32) as u32
    }

    pub fn roll_range(&mut self, min: u32, max: u32) -> u32 {
        let (min, max) = if min >= max { (min, min) } else { (min, max) };
        let span = u64::from(max - min) + 1;
        let value = u64::from(self.next()) % span;
        min + value as u32
    }

    pub fn roll_percent(&mut self, chance: u32) -> bool {
        if chance >= 100 {
            return true;
        }
        let bucket = self.next() % 100;
        bucket < chance
    }
}

impl Default for RollStream {
    fn default() -> Self {
        Self { state: 0x9e3779b97f4a7c15 }
    }
}
