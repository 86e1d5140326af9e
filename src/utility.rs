//! Small helpers shared across the attack.

/// Progress reporting for long loops, printed on stderr so results on
/// stdout stay clean. Emits a `processed: k/n` line roughly every tenth
/// of the work, plus a final line when dropped.
pub struct ProgressBar {
    done: usize,
    total: usize,
    quantum: usize,
    used: bool,
}

impl ProgressBar {
    /// Creates a bar for tracking `total` steps.
    pub fn new(total: usize) -> ProgressBar {
        ProgressBar {
            done: 0,
            total,
            quantum: total / 10 + 1,
            used: false,
        }
    }

    /// Advances by one step, printing when a new decile is reached.
    pub fn increment(&mut self) {
        if self.done % self.quantum == 0 {
            eprintln!("processed: {}/{}", self.done, self.total);
        }

        self.done += 1;
        self.used = true;
    }
}

impl Drop for ProgressBar {
    fn drop(&mut self) {
        if self.used {
            eprintln!("processed: {}/{}", self.done, self.total);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantum_never_zero() {
        let bar = ProgressBar::new(0);
        assert_eq!(bar.quantum, 1);

        let bar = ProgressBar::new(65536);
        assert_eq!(bar.quantum, 6554);
    }
}
