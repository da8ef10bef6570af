/// Round-robin over a source's interchangeable server parts.
///
/// The position is process-local and never persisted. Consecutive calls walk
/// the whole list before repeating, so `mirror_count()` consecutive attempts at one
/// tile each hit a different mirror.
#[derive(Debug, Clone)]
pub struct MirrorRotator {
    mirrors: Vec<String>,
    position: usize,
}

impl MirrorRotator {
    /// An empty list behaves like a single empty server part, which suits
    /// URL templates without a `{server}` placeholder.
    pub fn new(mirrors: Vec<String>) -> Self {
        let mirrors = if mirrors.is_empty() {
            vec![String::new()]
        } else {
            mirrors
        };
        Self {
            mirrors,
            position: 0,
        }
    }

    pub fn mirror_count(&self) -> usize {
        self.mirrors.len()
    }

    /// Return the current mirror and advance, wrapping after the last one.
    pub fn next(&mut self) -> &str {
        let current = self.position;
        self.position = (self.position + 1) % self.mirrors.len();
        &self.mirrors[current]
    }
}
