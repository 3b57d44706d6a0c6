use std::cmp::Reverse;

use agora_proto::CommentView;
use clap::ValueEnum;

/// Ordering applied to a flat comment list before the tree is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CommentSortType {
    #[default]
    Hot,
    Top,
    New,
    Old,
}

/// Stable: records that compare equal keep their relative order.
pub fn sort_comments(comments: &mut [CommentView], sort: CommentSortType) {
    match sort {
        CommentSortType::Hot => {
            comments.sort_by_key(|c| (Reverse(c.hot_rank), Reverse(c.published)))
        }
        CommentSortType::Top => comments.sort_by_key(|c| (Reverse(c.score), Reverse(c.published))),
        CommentSortType::New => comments.sort_by_key(|c| Reverse(c.published)),
        CommentSortType::Old => comments.sort_by_key(|c| c.published),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{at, comment};

    fn ids(comments: &[CommentView]) -> Vec<i32> {
        comments.iter().map(|c| c.id).collect()
    }

    fn sample() -> Vec<CommentView> {
        let mut a = comment(1, None);
        a.published = at(10);
        a.score = 3;
        a.hot_rank = 5;
        let mut b = comment(2, None);
        b.published = at(30);
        b.score = 3;
        b.hot_rank = 9;
        let mut c = comment(3, Some(1));
        c.published = at(20);
        c.score = 8;
        c.hot_rank = 5;
        vec![a, b, c]
    }

    #[test]
    fn orders_by_each_sort() {
        let cases = [
            (CommentSortType::Hot, vec![2, 3, 1]),
            (CommentSortType::Top, vec![3, 2, 1]),
            (CommentSortType::New, vec![2, 3, 1]),
            (CommentSortType::Old, vec![1, 3, 2]),
        ];
        for (sort, expected) in cases {
            let mut comments = sample();
            sort_comments(&mut comments, sort);
            assert_eq!(ids(&comments), expected, "{sort:?}");
        }
    }

    #[test]
    fn ties_keep_input_order() {
        let mut comments = vec![comment(5, None), comment(4, None), comment(6, None)];
        sort_comments(&mut comments, CommentSortType::New);
        assert_eq!(ids(&comments), vec![5, 4, 6]);
    }
}
