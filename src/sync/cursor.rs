//! Cursor advancement: where to fetch next and when a scan is finished.
//!
//! Pure functions only, so scans can be replayed from synthetic pages.

use crate::discourse::PostPage;

/// How the cursor moves between pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationStrategy {
    /// Walk forward `page_size` ids per page (steady-state runs).
    Additive,
    /// Walk backward from the oldest id seen (backfill from newest).
    ReverseScan,
}

/// Why a scan ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Too many consecutive pages carried no new data.
    EmptyStreak,
    /// A reverse scan reached ids the forward scan already covers.
    ReachedStoredBoundary,
    /// A reverse scan ran out of ids.
    ReachedStart,
}

/// Result of advancing past one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    pub next_cursor: i64,
    pub empty_streak: u32,
    pub stop: Option<StopReason>,
}

impl Advance {
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.stop.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorPolicy {
    pub strategy: PaginationStrategy,
    pub page_size: i64,
    pub empty_streak_threshold: u32,
    /// Last known stored boundary for reverse-scan convergence.
    pub stored_boundary: Option<i64>,
    /// Newest remote id on the forum, once the scan has looked it up.
    pub forum_head: Option<i64>,
}

impl CursorPolicy {
    #[must_use]
    pub fn additive(page_size: i64, empty_streak_threshold: u32) -> Self {
        Self {
            strategy: PaginationStrategy::Additive,
            page_size,
            empty_streak_threshold,
            stored_boundary: None,
            forum_head: None,
        }
    }

    #[must_use]
    pub fn reverse_scan(
        page_size: i64,
        empty_streak_threshold: u32,
        stored_boundary: Option<i64>,
    ) -> Self {
        Self {
            strategy: PaginationStrategy::ReverseScan,
            page_size,
            empty_streak_threshold,
            stored_boundary,
            forum_head: None,
        }
    }

    /// Whether [`Self::advance`] needs [`Self::forum_head`] to place the
    /// next window after `page`.
    ///
    /// True when an additive window came back with its top end empty: the
    /// scan is either past the newest post or crossing a gap, and only the
    /// forum head tells the two apart.
    #[must_use]
    pub fn needs_forum_head(&self, cursor: i64, page: &PostPage) -> bool {
        self.strategy == PaginationStrategy::Additive
            && self.forum_head.is_none()
            && page.max_id().is_some_and(|max_id| max_id + 1 < cursor)
    }

    /// Compute the cursor after `page`, fetched at `cursor`.
    ///
    /// `previous` is the page fetched in the prior iteration of the same scan.
    #[must_use]
    pub fn advance(
        &self,
        cursor: i64,
        page: &PostPage,
        previous: Option<&PostPage>,
        empty_streak: u32,
    ) -> Advance {
        match self.strategy {
            PaginationStrategy::Additive => self.advance_additive(cursor, page, previous, empty_streak),
            PaginationStrategy::ReverseScan => self.advance_reverse(cursor, page, empty_streak),
        }
    }

    fn advance_additive(
        &self,
        cursor: i64,
        page: &PostPage,
        previous: Option<&PostPage>,
        empty_streak: u32,
    ) -> Advance {
        // Discourse returns sparse windows, and past the newest post it keeps
        // returning the same latest page, so only a run of these ends the scan.
        let no_new_data = page.is_empty() || previous == Some(page);
        let empty_streak = if no_new_data {
            empty_streak.saturating_add(1)
        } else {
            0
        };

        let step = cursor.saturating_add(self.page_size);
        let next_cursor = match (page.max_id(), self.forum_head) {
            // The page holds the newest post: the next window starts right
            // above it so later posts are picked up by the next run.
            (Some(max_id), Some(head)) if max_id >= head => {
                step.min(max_id + 1 + self.page_size).max(cursor)
            }
            _ => step,
        };

        Advance {
            next_cursor,
            empty_streak,
            stop: (empty_streak >= self.empty_streak_threshold).then_some(StopReason::EmptyStreak),
        }
    }

    fn advance_reverse(&self, cursor: i64, page: &PostPage, empty_streak: u32) -> Advance {
        let Some(oldest) = page.min_id() else {
            let empty_streak = empty_streak.saturating_add(1);
            let next_cursor = cursor.saturating_sub(self.page_size);
            let stop = if empty_streak >= self.empty_streak_threshold {
                Some(StopReason::EmptyStreak)
            } else if next_cursor <= 0 {
                Some(StopReason::ReachedStart)
            } else {
                None
            };
            return Advance {
                next_cursor,
                empty_streak,
                stop,
            };
        };

        let next_cursor = oldest - 1;
        let stop = if self
            .stored_boundary
            .is_some_and(|boundary| oldest <= boundary - 1)
        {
            Some(StopReason::ReachedStoredBoundary)
        } else if next_cursor <= 0 {
            Some(StopReason::ReachedStart)
        } else {
            None
        };

        Advance {
            next_cursor,
            empty_streak: 0,
            stop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discourse::RawPost;

    fn post(id: i64) -> RawPost {
        RawPost {
            id,
            topic_id: 1,
            username: "marc".to_string(),
            raw: format!("post {id}"),
            created_at: "2024-03-01T12:00:00.000Z".to_string(),
            reads: 3,
        }
    }

    fn page(ids: impl IntoIterator<Item = i64>) -> PostPage {
        PostPage::new(ids.into_iter().map(post).collect())
    }

    #[test]
    fn test_additive_steps_by_page_size() {
        let policy = CursorPolicy::additive(30, 5);
        let first = page((36270..36300).rev());

        let advance = policy.advance(36300, &first, None, 0);
        assert_eq!(advance.next_cursor, 36330);
        assert_eq!(advance.empty_streak, 0);
        assert!(!advance.should_stop());
    }

    #[test]
    fn test_single_empty_page_does_not_stop() {
        let policy = CursorPolicy::additive(30, 5);
        let first = page((36270..36300).rev());
        let empty = PostPage::default();

        let advance = policy.advance(36330, &empty, Some(&first), 0);
        assert_eq!(advance.empty_streak, 1);
        assert!(!advance.should_stop());
    }

    #[test]
    fn test_streak_resets_on_new_data() {
        let policy = CursorPolicy::additive(30, 5);
        let empty = PostPage::default();
        let fresh = page([100, 99]);

        let advance = policy.advance(120, &fresh, Some(&empty), 4);
        assert_eq!(advance.empty_streak, 0);
        assert!(!advance.should_stop());
    }

    #[test]
    fn test_identical_pages_stop_at_threshold() {
        let policy = CursorPolicy::additive(30, 5);
        let empty = PostPage::default();

        let mut cursor = 1000;
        let mut streak = 0;
        let mut previous: Option<PostPage> = None;
        let mut iterations = 0;
        loop {
            iterations += 1;
            let advance = policy.advance(cursor, &empty, previous.as_ref(), streak);
            cursor = advance.next_cursor;
            streak = advance.empty_streak;
            previous = Some(empty.clone());
            if advance.should_stop() {
                assert_eq!(advance.stop, Some(StopReason::EmptyStreak));
                break;
            }
        }

        assert_eq!(iterations, 5);
        assert_eq!(cursor, 1000 + 5 * 30);
    }

    #[test]
    fn test_repeated_non_empty_page_counts_from_second_sighting() {
        let policy = CursorPolicy::additive(30, 2);
        let latest = page([500, 499, 498]);

        let first = policy.advance(510, &latest, None, 0);
        assert_eq!(first.empty_streak, 0);

        let second = policy.advance(first.next_cursor, &latest, Some(&latest), first.empty_streak);
        assert_eq!(second.empty_streak, 1);

        let third = policy.advance(second.next_cursor, &latest, Some(&latest), second.empty_streak);
        assert_eq!(third.stop, Some(StopReason::EmptyStreak));
    }

    #[test]
    fn test_additive_stops_one_window_above_forum_head() {
        let mut policy = CursorPolicy::additive(30, 5);
        let latest = page((71..=100).rev());

        assert!(policy.needs_forum_head(121, &latest));
        policy.forum_head = Some(100);
        assert!(!policy.needs_forum_head(121, &latest));

        let advance = policy.advance(121, &latest, None, 0);
        assert_eq!(advance.next_cursor, 131);

        // Past the head the cursor holds while the streak runs out
        let advance = policy.advance(131, &latest, Some(&latest), 0);
        assert_eq!(advance.next_cursor, 131);
        assert_eq!(advance.empty_streak, 1);
    }

    #[test]
    fn test_additive_crosses_gap_below_forum_head() {
        let mut policy = CursorPolicy::additive(30, 5);
        policy.forum_head = Some(500);
        let below_gap = page(170..200);

        let advance = policy.advance(300, &below_gap, None, 0);
        assert_eq!(advance.next_cursor, 330);
    }

    #[test]
    fn test_additive_never_moves_cursor_back() {
        let mut policy = CursorPolicy::additive(30, 5);
        policy.forum_head = Some(100);
        let latest = page((71..=100).rev());

        let advance = policy.advance(301, &latest, None, 0);
        assert_eq!(advance.next_cursor, 301);
    }

    #[test]
    fn test_forum_head_not_needed_for_full_or_empty_windows() {
        let policy = CursorPolicy::additive(30, 5);

        assert!(!policy.needs_forum_head(36300, &page((36270..36300).rev())));
        assert!(!policy.needs_forum_head(36330, &PostPage::default()));
        assert!(!CursorPolicy::reverse_scan(30, 10, None).needs_forum_head(500, &page([10])));
    }

    #[test]
    fn test_reverse_scan_steps_below_oldest() {
        let policy = CursorPolicy::reverse_scan(30, 10, None);
        let first = page((36270..36300).rev());

        let advance = policy.advance(36300, &first, None, 0);
        assert_eq!(advance.next_cursor, 36269);
        assert!(!advance.should_stop());
    }

    #[test]
    fn test_reverse_scan_empty_page_steps_one_window() {
        let policy = CursorPolicy::reverse_scan(30, 10, None);

        let advance = policy.advance(36269, &PostPage::default(), None, 0);
        assert_eq!(advance.next_cursor, 36239);
        assert_eq!(advance.empty_streak, 1);
        assert!(!advance.should_stop());

        let advance = policy.advance(36239, &PostPage::default(), None, 9);
        assert_eq!(advance.stop, Some(StopReason::EmptyStreak));
    }

    #[test]
    fn test_reverse_scan_converges_on_stored_boundary() {
        let policy = CursorPolicy::reverse_scan(30, 10, Some(1000));

        // Oldest id equal to the boundary is not yet below it
        let advance = policy.advance(1030, &page(1000..1030), None, 0);
        assert!(!advance.should_stop());

        let advance = policy.advance(1000, &page(990..1000), None, 0);
        assert_eq!(advance.stop, Some(StopReason::ReachedStoredBoundary));
    }

    #[test]
    fn test_reverse_scan_stops_at_first_post() {
        let policy = CursorPolicy::reverse_scan(30, 10, None);

        let advance = policy.advance(20, &page(1..20), None, 0);
        assert_eq!(advance.next_cursor, 0);
        assert_eq!(advance.stop, Some(StopReason::ReachedStart));

        let advance = policy.advance(25, &PostPage::default(), None, 0);
        assert_eq!(advance.stop, Some(StopReason::ReachedStart));
    }
}
