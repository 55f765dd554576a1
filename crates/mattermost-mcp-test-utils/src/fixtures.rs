//! Pre-built Mattermost entities.

use mattermost_mcp_core::{Channel, ChannelType, Post, PostList, Team, User};

pub fn user(id: &str, username: &str) -> User {
    User {
        id: id.to_string(),
        username: username.to_string(),
        email: format!("{}@example.com", username),
        ..Default::default()
    }
}

pub fn bot(id: &str, username: &str) -> User {
    User {
        is_bot: true,
        ..user(id, username)
    }
}

pub fn post(id: &str, channel_id: &str, message: &str) -> Post {
    Post {
        id: id.to_string(),
        channel_id: channel_id.to_string(),
        user_id: "u1".to_string(),
        message: message.to_string(),
        create_at: 1_700_000_000_000,
        ..Default::default()
    }
}

/// A post list in the given order.
pub fn post_list(posts: Vec<Post>) -> PostList {
    let mut list = PostList::default();
    for post in posts {
        list.order.push(post.id.clone());
        list.posts.insert(post.id.clone(), post);
    }
    list
}

pub fn channel(id: &str, team_id: &str, name: &str) -> Channel {
    Channel {
        id: id.to_string(),
        team_id: team_id.to_string(),
        name: name.to_string(),
        display_name: name.to_string(),
        channel_type: ChannelType::Open,
        ..Default::default()
    }
}

pub fn team(id: &str, name: &str) -> Team {
    Team {
        id: id.to_string(),
        name: name.to_string(),
        display_name: name.to_string(),
        team_type: "O".to_string(),
        ..Default::default()
    }
}
