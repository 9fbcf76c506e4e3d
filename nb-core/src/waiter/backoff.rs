use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Backoff {
    current: Duration,
    max: Duration,
    multiplier: f64,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Backoff {
        Backoff {
            current: initial.min(max),
            max,
            multiplier: multiplier.max(1.0),
        }
    }

    pub fn next_interval(&mut self) -> Duration {
        let interval = self.current;
        self.current = self.current.mul_f64(self.multiplier).min(self.max);
        interval
    }
}
