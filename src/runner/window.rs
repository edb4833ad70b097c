/// Half-open range `[start, end)` of item indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub end: usize,
}

impl Window {
    /// The attempt window `[start, start + max)` clipped to `total` items.
    ///
    /// `None` for `max` means "until the end".
    pub fn clip(total: usize, start: usize, max: Option<usize>) -> Self {
        let end = match max {
            Some(max) => start.saturating_add(max).min(total),
            None => total,
        };
        Self {
            start: start.min(end),
            end,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Consecutive sub-windows of at most `size` items.
    pub fn batches(&self, size: usize) -> impl Iterator<Item = Window> {
        let size = size.max(1);
        let end = self.end;
        (self.start..end).step_by(size).map(move |start| Window {
            start,
            end: start.saturating_add(size).min(end),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_to_collection_length() {
        assert_eq!(Window::clip(5, 3, Some(10)), Window { start: 3, end: 5 });
        assert_eq!(Window::clip(5, 0, None), Window { start: 0, end: 5 });
        assert_eq!(Window::clip(100, 10, Some(20)), Window { start: 10, end: 30 });
    }

    #[test]
    fn test_start_past_end_is_empty() {
        let window = Window::clip(5, 9, Some(3));
        assert!(window.is_empty());
        assert_eq!(window.len(), 0);
        assert_eq!(window.batches(2).count(), 0);
    }

    #[test]
    fn test_batches_cover_window_in_order() {
        let batches: Vec<Window> = Window::clip(10, 1, Some(7)).batches(3).collect();
        assert_eq!(
            batches,
            vec![
                Window { start: 1, end: 4 },
                Window { start: 4, end: 7 },
                Window { start: 7, end: 8 },
            ]
        );
    }

    #[test]
    fn test_zero_batch_size_is_treated_as_one() {
        assert_eq!(Window::clip(3, 0, None).batches(0).count(), 3);
    }
}
