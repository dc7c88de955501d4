use std::fmt;

/// Generational identity of one load attempt.
///
/// `generation` changes whenever the consumer switches to another resource
/// key (or unmounts); `attempt` counts restarts within a generation. Two ids
/// are equal only if both halves match, so a completion signal carrying an
/// older id can never resolve a newer attempt.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadId {
    generation: u64,
    attempt: u32,
}

impl LoadId {
    pub fn new(generation: u64, attempt: u32) -> Self {
        Self {
            generation,
            attempt,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Identity of the restart that follows this attempt.
    pub fn next_attempt(self) -> Self {
        Self {
            generation: self.generation,
            attempt: self.attempt.saturating_add(1),
        }
    }
}

impl fmt::Display for LoadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}#{}", self.generation, self.attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::LoadId;

    #[test]
    fn restarts_get_fresh_identity() {
        let first = LoadId::new(3, 0);
        let second = first.next_attempt();
        assert_ne!(first, second);
        assert_eq!(second.generation(), 3);
        assert_eq!(second.attempt(), 1);
        assert!(first < second);
    }

    #[test]
    fn generations_never_collide() {
        assert_ne!(LoadId::new(1, 2), LoadId::new(2, 2));
    }
}
