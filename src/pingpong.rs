//! Read/write role tracking for double-buffered resources.

/// A pair of same-shaped resources where one is read and the other written.
///
/// Passes read [`read`](PingPong::read) and write [`write`](PingPong::write);
/// [`swap`](PingPong::swap) exchanges the roles without touching either
/// resource, so the next pass observes the generation just written.
#[derive(Debug)]
pub struct PingPong<T> {
    slots: [T; 2],
    /// Index of the slot currently playing the read role.
    read_slot: usize,
    swaps: u64,
}

impl<T> PingPong<T> {
    /// `first` starts as the read side, `second` as the write side.
    pub fn new(first: T, second: T) -> Self {
        Self {
            slots: [first, second],
            read_slot: 0,
            swaps: 0,
        }
    }

    #[inline]
    pub fn read(&self) -> &T {
        &self.slots[self.read_slot]
    }

    #[inline]
    pub fn write(&self) -> &T {
        &self.slots[1 - self.read_slot]
    }

    #[inline]
    pub fn read_mut(&mut self) -> &mut T {
        &mut self.slots[self.read_slot]
    }

    #[inline]
    pub fn write_mut(&mut self) -> &mut T {
        &mut self.slots[1 - self.read_slot]
    }

    /// Both sides at once, `(read, write)`.
    pub fn split(&self) -> (&T, &T) {
        (self.read(), self.write())
    }

    pub fn swap(&mut self) {
        self.read_slot = 1 - self.read_slot;
        self.swaps += 1;
    }

    /// Number of swaps since construction.
    #[inline]
    pub fn swaps(&self) -> u64 {
        self.swaps
    }

    /// Whether the slot constructed as `first` is currently the read side.
    #[inline]
    pub fn first_is_read(&self) -> bool {
        self.read_slot == 0
    }

    /// Consume the pair, returning `(first, second)` in construction order.
    pub fn into_inner(self) -> (T, T) {
        let [first, second] = self.slots;
        (first, second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_exchanges_roles() {
        let mut pair = PingPong::new("a", "b");
        assert_eq!(pair.split(), (&"a", &"b"));
        pair.swap();
        assert_eq!(pair.split(), (&"b", &"a"));
    }

    #[test]
    fn test_double_swap_is_identity() {
        let mut pair = PingPong::new(1, 2);
        pair.swap();
        pair.swap();
        assert_eq!(*pair.read(), 1);
        assert_eq!(*pair.write(), 2);
        assert_eq!(pair.swaps(), 2);
    }

    #[test]
    fn test_roles_follow_parity() {
        let mut pair = PingPong::new('r', 'w');
        for n in 1..=9u64 {
            pair.swap();
            assert_eq!(pair.first_is_read(), n % 2 == 0);
        }
    }

    #[test]
    fn test_mutation_targets_current_role() {
        let mut pair = PingPong::new(vec![0], vec![0]);
        pair.write_mut().push(1);
        pair.swap();
        assert_eq!(pair.read(), &vec![0, 1]);
        pair.read_mut().clear();
        let (first, second) = pair.into_inner();
        assert_eq!(first, vec![0]);
        assert!(second.is_empty());
    }
}
