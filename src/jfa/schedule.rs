//! Flood pass step-size schedule.
//!
//! The first step is the smallest power of two that covers half the largest
//! texture dimension; each subsequent pass halves it until it reaches zero.
//! That yields exactly `ceil(log2(max(w, h)))` flood passes, which is the
//! JFA convergence bound: after that many passes every texel reachable from
//! a seed holds a valid candidate.

/// Iterator over the descending step sizes for a `w`×`h` state texture.
#[derive(Clone, Copy, Debug)]
pub struct StepSchedule {
    next: u32,
}

impl StepSchedule {
    pub fn new(width: u32, height: u32) -> Self {
        let max_dim = width.max(height);
        // next_power_of_two(ceil(max/2)); a 1x1 (or empty) texture needs no
        // flood passes at all.
        let first = if max_dim <= 1 {
            0
        } else {
            max_dim.div_ceil(2).next_power_of_two()
        };
        Self { next: first }
    }
}

impl Iterator for StepSchedule {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.next == 0 {
            return None;
        }
        let step = self.next;
        self.next /= 2;
        Some(step)
    }
}

/// Number of flood passes required for a `w`×`h` texture: `ceil(log2(max(w, h)))`.
pub fn pass_count(width: u32, height: u32) -> u32 {
    let max_dim = width.max(height);
    if max_dim <= 1 {
        0
    } else {
        (max_dim - 1).ilog2() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_step_covers_half_the_texture() {
        for &(w, h) in &[(512, 512), (512, 256), (100, 300), (5, 5), (2, 2)] {
            let first = StepSchedule::new(w, h).next().unwrap();
            assert!(first * 2 >= w.max(h), "step {first} too small for {w}x{h}");
            assert!(first.is_power_of_two());
        }
    }

    #[test]
    fn test_steps_halve_and_terminate() {
        let steps: Vec<u32> = StepSchedule::new(512, 512).collect();
        assert_eq!(steps, vec![256, 128, 64, 32, 16, 8, 4, 2, 1]);
    }

    #[test]
    fn test_schedule_length_matches_pass_count() {
        for w in 1..70u32 {
            for h in [1, 3, 16, 33, 64, 511, 512] {
                let n = StepSchedule::new(w, h).count() as u32;
                assert_eq!(n, pass_count(w, h), "disagreement at {w}x{h}");
            }
        }
    }

    #[test]
    fn test_pass_count_is_ceil_log2() {
        assert_eq!(pass_count(1, 1), 0);
        assert_eq!(pass_count(2, 2), 1);
        assert_eq!(pass_count(4, 4), 2);
        assert_eq!(pass_count(4, 5), 3);
        assert_eq!(pass_count(512, 512), 9);
        assert_eq!(pass_count(513, 1), 10);
    }
}
