//! Single-record patches applied when a mutation is confirmed.

use agora_proto::{CommentView, PostView, UserMentionView};

use crate::vote::Votable;

/// Copies the editable fields and tallies of `edited` onto `local`, keeping
/// the local vote and read flag.
pub fn edit_comment(local: &mut CommentView, edited: &CommentView) {
    local.content.clone_from(&edited.content);
    local.updated = edited.updated;
    local.removed = edited.removed;
    local.deleted = edited.deleted;
    confirm_tallies(local, edited);
}

pub fn edit_mention(local: &mut UserMentionView, edited: &UserMentionView) {
    local.content.clone_from(&edited.content);
    local.updated = edited.updated;
    local.removed = edited.removed;
    local.deleted = edited.deleted;
    confirm_tallies(local, edited);
}

pub fn save_comment(local: &mut CommentView, saved: &CommentView) {
    local.saved = saved.saved;
}

/// Replaces `local` with the edited post. Viewer-specific fields are kept when
/// the edit was broadcast without them.
pub fn edit_post(local: &mut PostView, edited: &PostView) {
    let mut next = edited.clone();
    if next.user_id.is_none() {
        next.user_id = local.user_id;
        next.my_vote = local.my_vote;
        next.saved = local.saved;
        next.read = local.read;
        next.subscribed = local.subscribed;
    }
    *local = next;
}

pub fn ban_comments<'a>(
    comments: impl IntoIterator<Item = &'a mut CommentView>,
    user_id: i32,
    banned: bool,
) {
    for comment in comments {
        if comment.creator_id == user_id {
            comment.banned = banned;
        }
    }
}

pub fn ban_posts<'a>(posts: impl IntoIterator<Item = &'a mut PostView>, user_id: i32, banned: bool) {
    for post in posts {
        if post.creator_id == user_id {
            post.banned = banned;
        }
    }
}

fn confirm_tallies<V: Votable>(local: &mut V, confirmed: &V) {
    let next = local.vote_state().confirm(&confirmed.vote_state(), None);
    local.set_vote_state(next);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{comment, post};

    #[test]
    fn edit_keeps_local_vote_and_read_flag() {
        let mut local = comment(1, None);
        local.my_vote = Some(1);
        local.read = true;
        let mut edited = comment(1, None);
        edited.content = "fixed typo".into();
        edited.deleted = true;
        edited.upvotes = 4;
        edited.downvotes = 1;
        edited.score = 3;
        edited.my_vote = None;

        edit_comment(&mut local, &edited);
        assert_eq!(local.content, "fixed typo");
        assert!(local.deleted);
        assert!(local.read);
        assert_eq!(local.my_vote, Some(1));
        assert_eq!(local.score, 3);
    }

    #[test]
    fn broadcast_post_edit_keeps_viewer_fields() {
        let mut local = post(9);
        local.user_id = Some(7);
        local.my_vote = Some(-1);
        local.saved = Some(true);
        let mut edited = post(9);
        edited.name = "renamed".into();

        edit_post(&mut local, &edited);
        assert_eq!(local.name, "renamed");
        assert_eq!(local.my_vote, Some(-1));
        assert_eq!(local.saved, Some(true));
    }

    #[test]
    fn bans_only_the_named_creator() {
        let mut comments = vec![comment(1, None), comment(2, None)];
        comments[1].creator_id = 99;
        ban_comments(comments.iter_mut(), 99, true);
        assert!(!comments[0].banned);
        assert!(comments[1].banned);
    }
}
