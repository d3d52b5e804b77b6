use rand::Rng;

const BANNER: &str = "ALL CLEAR!";
const SPARKS: [char; 5] = ['*', '+', '.', 'o', '\''];
const DURATION_MS: u64 = 3000;
const STEP_SECS: f64 = 0.1;
const GRAVITY: f64 = 15.0;

/// One glyph of the all-clear animation
#[derive(Debug, Clone, PartialEq)]
pub struct Spark {
    pub x: f64,
    pub y: f64,
    pub vel_x: f64,
    pub vel_y: f64,
    pub symbol: char,
    pub color_index: usize,
    /// Letters of the banner fly to a fixed slot; the rest fall
    pub slot: Option<(f64, f64)>,
    age: f64,
    max_age: f64,
}

impl Spark {
    fn falling<R: Rng>(x: f64, y: f64, rng: &mut R) -> Self {
        Self {
            x,
            y,
            vel_x: rng.gen_range(-3.0..3.0),
            vel_y: rng.gen_range(-4.0..-1.0),
            symbol: SPARKS[rng.gen_range(0..SPARKS.len())],
            color_index: rng.gen_range(0..6),
            slot: None,
            age: 0.0,
            max_age: rng.gen_range(2.0..4.0),
        }
    }

    fn letter(from: (f64, f64), slot: (f64, f64), symbol: char, color_index: usize) -> Self {
        Self {
            x: from.0,
            y: from.1,
            vel_x: slot.0 - from.0,
            vel_y: slot.1 - from.1,
            symbol,
            color_index,
            slot: Some(slot),
            age: 0.0,
            max_age: f64::INFINITY,
        }
    }

    fn is_letter(&self) -> bool {
        self.slot.is_some()
    }

    /// Advances one step; false once the spark has burnt out
    fn step(&mut self, dt: f64) -> bool {
        match self.slot {
            Some((tx, ty)) => {
                if ((tx - self.x).powi(2) + (ty - self.y).powi(2)).sqrt() > 1.0 {
                    self.x += self.vel_x * dt;
                    self.y += self.vel_y * dt;
                    self.vel_x *= 0.95;
                    self.vel_y *= 0.95;
                } else {
                    self.x = tx;
                    self.y = ty;
                    self.vel_x = 0.0;
                    self.vel_y = 0.0;
                }
            }
            None => {
                self.x += self.vel_x * dt;
                self.y += self.vel_y * dt;
                self.vel_y += GRAVITY * dt;
            }
        }
        self.age += dt;
        self.age < self.max_age
    }
}

/// Particle burst spelling "ALL CLEAR!" over the results screen after a
/// word list is fully cleared. Advanced by host timestamps.
#[derive(Debug, Default)]
pub struct Celebration {
    pub sparks: Vec<Spark>,
    started_ms: u64,
    last_step_ms: u64,
    active: bool,
    width: f64,
    height: f64,
}

impl Celebration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn start(&mut self, width: u16, height: u16, now_ms: u64) {
        self.start_with(width, height, now_ms, &mut rand::thread_rng());
    }

    pub fn start_with<R: Rng>(&mut self, width: u16, height: u16, now_ms: u64, rng: &mut R) {
        self.sparks.clear();
        self.active = true;
        self.started_ms = now_ms;
        self.last_step_ms = now_ms;
        self.width = width as f64;
        self.height = height as f64;

        let center = (self.width / 2.0, self.height / 2.0);
        let spacing = 2.0;
        let left = center.0 - (BANNER.chars().count() as f64 - 1.0) * spacing / 2.0;

        for (i, ch) in BANNER.chars().enumerate().filter(|(_, c)| *c != ' ') {
            let slot = (left + i as f64 * spacing, center.1 - 2.0);
            let from = (
                center.0 + rng.gen_range(-10.0..10.0),
                center.1 + rng.gen_range(-5.0..5.0),
            );
            let color = rng.gen_range(0..6);
            self.sparks.push(Spark::letter(from, slot, ch, color));
        }

        for _ in 0..25 {
            let x = center.0 + rng.gen_range(-15.0..15.0);
            let y = center.1 + rng.gen_range(-8.0..8.0);
            self.sparks.push(Spark::falling(x, y, rng));
        }
    }

    pub fn stop(&mut self) {
        self.active = false;
        self.sparks.clear();
    }

    /// Catches the animation up to `now_ms` in fixed steps
    pub fn update(&mut self, now_ms: u64) {
        if !self.active {
            return;
        }
        if now_ms.saturating_sub(self.started_ms) >= DURATION_MS {
            self.stop();
            return;
        }

        let step_ms = (STEP_SECS * 1000.0) as u64;
        while now_ms.saturating_sub(self.last_step_ms) >= step_ms {
            self.last_step_ms += step_ms;
            let (width, height) = (self.width, self.height);
            self.sparks.retain_mut(|spark| {
                let alive = spark.step(STEP_SECS);
                let margin = 5.0;
                let gone = !spark.is_letter()
                    && (spark.y > height + margin || spark.x < -margin || spark.x > width + margin);
                alive && !gone
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn started(width: u16, height: u16) -> Celebration {
        let mut c = Celebration::new();
        c.start_with(width, height, 0, &mut StdRng::seed_from_u64(9));
        c
    }

    #[test]
    fn test_falling_spark_obeys_gravity() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut spark = Spark::falling(10.0, 10.0, &mut rng);
        let vel_y = spark.vel_y;
        assert!(spark.step(0.1));
        assert!(spark.vel_y > vel_y);
        assert_ne!(spark.y, 10.0);
    }

    #[test]
    fn test_letter_settles_on_its_slot() {
        let mut spark = Spark::letter((0.0, 0.0), (10.0, 5.0), 'A', 0);
        for _ in 0..10 {
            spark.step(0.1);
        }
        let distance = ((10.0 - spark.x).powi(2) + (5.0 - spark.y).powi(2)).sqrt();
        assert!(distance < 5.0);
    }

    #[test]
    fn test_start_spells_banner() {
        let c = started(80, 24);
        assert!(c.is_active());
        let letters: String = c
            .sparks
            .iter()
            .filter(|s| s.is_letter())
            .map(|s| s.symbol)
            .collect();
        assert_eq!(letters, "ALLCLEAR!");
        assert!(c.sparks.iter().any(|s| !s.is_letter()));
    }

    #[test]
    fn test_inactive_by_default() {
        let c = Celebration::new();
        assert!(!c.is_active());
        assert!(c.sparks.is_empty());
    }

    #[test]
    fn test_update_moves_sparks_then_expires() {
        let mut c = started(80, 24);
        let before: Vec<(f64, f64)> = c.sparks.iter().map(|s| (s.x, s.y)).collect();
        c.update(500);
        assert!(c.is_active());
        let moved = c
            .sparks
            .iter()
            .zip(&before)
            .filter(|(s, (x, y))| (s.x - x).abs() > 0.1 || (s.y - y).abs() > 0.1)
            .count();
        assert!(moved > 0);

        c.update(DURATION_MS);
        assert!(!c.is_active());
        assert!(c.sparks.is_empty());
    }

    #[test]
    fn test_offscreen_sparks_are_dropped() {
        let mut c = started(20, 10);
        let mut rng = StdRng::seed_from_u64(2);
        c.sparks.push(Spark::falling(100.0, 100.0, &mut rng));
        c.update(1000);
        for spark in c.sparks.iter().filter(|s| !s.is_letter()) {
            assert!(spark.y <= 15.0 && spark.x >= -5.0 && spark.x <= 25.0);
        }
    }
}
